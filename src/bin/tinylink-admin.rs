use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tinylink::api::handlers::format_timestamp;
use tinylink::config::Config;
use tinylink::shortener::{ServiceError, Shortener};
use tinylink::storage;

#[derive(Parser)]
#[command(name = "tinylink-admin")]
#[command(about = "tinylink database management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema if it does not exist
    Init,
    /// List short links, newest first
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show statistics for a short code
    Stats { short_code: String },
    /// Show recent click events for a short code
    Clicks {
        short_code: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Delete a short link and its click history
    Delete {
        /// Record id (see `list`)
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Ensures the schema exists before any command runs
    let storage = storage::connect(&config.database).await?;
    let shortener = Shortener::new(storage, &config.short_code);

    match cli.command {
        Commands::Init => {
            println!("✓ Database schema is ready ({})", config.database.url);
        }
        Commands::List { limit } => {
            let urls = shortener.list(limit.max(1), None).await?;
            if urls.is_empty() {
                println!("No short links found.");
            } else {
                println!(
                    "{:<8} {:<12} {:<8} {:<20} {}",
                    "ID", "Code", "Clicks", "Created", "URL"
                );
                println!("{}", "-".repeat(80));
                for url in urls {
                    println!(
                        "{:<8} {:<12} {:<8} {:<20} {}",
                        url.id,
                        url.short_code,
                        url.clicks,
                        format_timestamp(url.created_at),
                        url.original_url
                    );
                }
            }
        }
        Commands::Stats { short_code } => match shortener.get_stats(&short_code).await {
            Ok(stats) => {
                println!("Short code:   {}", stats.short_code);
                println!("Original URL: {}", stats.original_url);
                println!("Clicks:       {}", stats.clicks);
                println!("Created:      {}", format_timestamp(stats.created_at));
                println!(
                    "Last click:   {}",
                    stats
                        .last_click_at
                        .map(format_timestamp)
                        .unwrap_or_else(|| "never".to_string())
                );
            }
            Err(ServiceError::NotFound) => println!("⚠ Short code '{}' not found", short_code),
            Err(err) => return Err(err).context("failed to load stats"),
        },
        Commands::Clicks { short_code, limit } => {
            match shortener.list_clicks(&short_code, limit.max(1)).await {
                Ok((_, clicks)) if clicks.is_empty() => {
                    println!("No click events recorded for '{}'.", short_code);
                }
                Ok((_, clicks)) => {
                    println!("{:<20} {:<40} {}", "Clicked", "IP", "User agent");
                    println!("{}", "-".repeat(80));
                    for click in clicks {
                        println!(
                            "{:<20} {:<40} {}",
                            format_timestamp(click.clicked_at),
                            click.ip.as_deref().unwrap_or("N/A"),
                            click.user_agent.as_deref().unwrap_or("N/A")
                        );
                    }
                }
                Err(ServiceError::NotFound) => {
                    println!("⚠ Short code '{}' not found", short_code)
                }
                Err(err) => return Err(err).context("failed to load clicks"),
            }
        }
        Commands::Delete { id } => match shortener.delete(id).await {
            Ok(()) => println!("✓ Deleted short link {} and its click history", id),
            Err(ServiceError::NotFound) => println!("⚠ No short link with id {}", id),
            Err(err) => return Err(err).context("failed to delete short link"),
        },
    }

    Ok(())
}
