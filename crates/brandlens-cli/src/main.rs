mod commands;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "brandlens-cli")]
#[command(about = "BrandLens command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask the search model whether a brand shows up for a query (nothing is stored)
    Check {
        brand: String,
        query: String,
        /// Print the full outcome as JSON, including the raw response
        #[arg(long)]
        json: bool,
    },
    /// Suggest starter queries to track for a brand
    Suggest {
        brand: String,
        /// Industry or category used to phrase the queries
        #[arg(long, default_value = "")]
        industry: String,
        #[arg(long, default_value = "5")]
        count: usize,
    },
    /// Extract contacts from pages (nothing is stored)
    Contacts {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Check every due tracker once and wait for webhook deliveries
    Poll,
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
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
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("brandlens-cli: run with --help to list commands");
        return Ok(());
    };

    let config = brandlens_core::load_app_config()?;
    match command {
        Commands::Check { brand, query, json } => {
            commands::run_check(&config, &brand, &query, json).await?;
        }
        Commands::Suggest {
            brand,
            industry,
            count,
        } => commands::run_suggest(&config, &brand, &industry, count).await?,
        Commands::Contacts { urls, json } => commands::run_contacts(&config, &urls, json).await?,
        Commands::Poll => {
            let pool = commands::connect(&config).await?;
            commands::run_poll(pool, &config).await?;
        }
        Commands::Db { command } => {
            let pool = commands::connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    brandlens_db::health_check(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = brandlens_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
    }

    Ok(())
}
