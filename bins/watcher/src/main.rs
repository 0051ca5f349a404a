use anyhow::Result;
use clap::{Parser, Subcommand};
use moonwatch_bot::format::render_alert;
use moonwatch_bot::LiveBot;
use moonwatch_core::config::AppConfig;
use moonwatch_core::utils::{now_ms, parse_address};
use moonwatch_market::DexScreenerClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "moonwatch", version, about = "Token launch watcher with Telegram alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(short, long, default_value = "config/moonwatch.toml")]
        config: String,
    },
    /// Fetch one market snapshot and print the alert it would produce.
    Check {
        #[arg(short, long, default_value = "config/moonwatch.toml")]
        config: String,
        #[arg(long)]
        token: String,
    },
    PrintConfig {
        #[arg(short, long, default_value = "config/moonwatch.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let mut bot = LiveBot::new(cfg).await?;
            bot.run().await?;
        }
        Commands::Check { config, token } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let address = parse_address(&token)?;
            let client = DexScreenerClient::new(&cfg.market)?;
            match client.fetch_snapshot(address).await? {
                Some(snapshot) => {
                    println!("{}", render_alert(&address, &snapshot, now_ms()));
                    if let Some(created) = snapshot.pair_created_at_ms {
                        println!("\npair created at {created} ms");
                    }
                }
                None => println!("No priced pair for {address} yet"),
            }
        }
        Commands::PrintConfig { config } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let json = serde_json::to_string_pretty(&cfg)?;
            println!("{json}");
        }
    }

    info!("done");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        Err(_) => EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
