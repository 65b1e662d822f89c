mod citations;
mod collect;
mod score;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::citations::CitationsCommands;
use crate::score::ScoreCommands;

#[derive(Debug, Parser)]
#[command(name = "aivis")]
#[command(about = "Answer-engine visibility: collection and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run queries through the configured collectors
    Collect {
        /// JSON file holding an array of query execution requests
        #[arg(long)]
        input: PathBuf,

        /// Requests dispatched concurrently per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Call providers but keep results in memory instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Scoring pipeline
    Score {
        #[command(subcommand)]
        command: ScoreCommands,
    },
    /// Citation domain categories
    Citations {
        #[command(subcommand)]
        command: CitationsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = aivis_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("aivis ready; run `aivis --help` for commands");
        return Ok(());
    };

    match command {
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    aivis_db::ping(&pool).await?;
                    println!("database connection ok");
                }
                DbCommands::Migrate => {
                    let applied = aivis_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
        Commands::Collect {
            input,
            batch_size,
            dry_run,
        } => collect::run_collect(&config, &input, batch_size, dry_run).await?,
        Commands::Score { command } => {
            let pool = connect(&config).await?;
            score::run(&pool, &config, command).await?;
        }
        Commands::Citations { command } => {
            let pool = connect(&config).await?;
            citations::run(&pool, command).await?;
        }
    }

    Ok(())
}

async fn connect(config: &aivis_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = aivis_db::PoolConfig::from_app_config(config);
    let pool = aivis_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}
