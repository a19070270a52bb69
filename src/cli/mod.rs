pub mod commands;
pub mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::Permission;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "forrisco-admin")]
#[command(about = "ForRisco admin CLI - migrations, tokens and company backups")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Issue a JWT for an existing user")]
    Token {
        #[arg(long, help = "User id")]
        user: i64,
        #[arg(
            long = "permission",
            value_parser = utils::parse_permission,
            help = "Extra permission, e.g. MANAGE_UNIT (repeatable)"
        )]
        permissions: Vec<Permission>,
    },

    #[command(about = "Export every plan of a company")]
    Export {
        #[arg(long, help = "Company id")]
        company: i64,
        #[arg(long, short, help = "Output file (defaults to the generated file name)")]
        output: Option<PathBuf>,
    },

    #[command(about = "Replace a company's plans with a previously exported file")]
    Restore {
        #[arg(long, help = "Company id")]
        company: i64,
        #[arg(help = "Export file")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Migrate => commands::database::migrate(&config, output_format).await,
        Commands::Token { user, permissions } => {
            commands::token::issue(&config, user, permissions, output_format).await
        }
        Commands::Export { company, output } => {
            commands::backup::export(&config, company, output, output_format).await
        }
        Commands::Restore { company, file } => {
            commands::backup::restore(&config, company, &file, output_format).await
        }
    }
}
