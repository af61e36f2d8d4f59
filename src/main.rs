use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use speedwatch::access::{AccessPolicy, Role};
use speedwatch::config::{AppConfig, LoggingConfig};
use speedwatch::throughput::runner::RunOutcome;

#[derive(Parser)]
#[command(
    name = "speedwatch",
    about = "Role-aware network speed testing with history and diagnostics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (otherwise SPEEDWATCH_CONFIG, then /etc/speedwatch)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a single speed test and print the result
    SpeedTest {
        /// Role the run is recorded under
        #[arg(long, default_value = "home_user")]
        role: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List roles and their capabilities
    Roles {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting speedwatch daemon");
            speedwatch::serve(config).await?;
        }
        Commands::SpeedTest { role, json } => {
            let role: Role = role.parse()?;
            let service = speedwatch::build_service(&config)?;
            service.request_run(role).await?;

            match service.wait_for_run().await {
                Some(RunOutcome::Completed(result)) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        println!("\nSpeed test ({})", result.server_label);
                        println!("{:<10} | {:>10}", "Metric", "Value");
                        println!("{:-<10}-|-{:->10}", "", "");
                        println!("{:<10} | {:>6.2} Mbps", "Download", result.download_mbps);
                        println!("{:<10} | {:>6.2} Mbps", "Upload", result.upload_mbps);
                        println!("{:<10} | {:>6.2} ms", "Ping", result.ping_ms);
                    }
                }
                Some(RunOutcome::Failed(message)) => {
                    anyhow::bail!("speed test failed: {}", message);
                }
                Some(RunOutcome::Aborted) | None => {
                    anyhow::bail!("speed test aborted: {:?}", service.run_state().last_error);
                }
            }
        }
        Commands::Roles { json } => {
            let profiles = AccessPolicy::new().profiles();
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else {
                println!("{:<12} | {:<22} | Capabilities", "Role", "Name");
                println!("{:-<12}-|-{:-<22}-|-{:-<40}", "", "", "");
                for p in &profiles {
                    let caps: Vec<&str> = p.capabilities.iter().map(|c| c.as_str()).collect();
                    println!("{:<12} | {:<22} | {}", p.role, p.name, caps.join(", "));
                }
            }
        }
    }

    Ok(())
}
