pub mod backup;
pub mod database;
pub mod token;
