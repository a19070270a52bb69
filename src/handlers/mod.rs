// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth, per-route access rules)
pub mod protected;
pub mod public;
