use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wifi_phy_cca::logging::{log_replay_outcome, log_replay_start};
use wifi_phy_cca::{init_logger, PhyConfig, Scenario};

#[derive(Parser)]
#[command(name = "wifi-phy-cca")]
#[command(about = "Replay Wi-Fi PHY scenarios and inspect CCA / channel-bonding decisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON scenario and print the report
    Run {
        scenario: PathBuf,
        /// Pretty-print the JSON report
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the effective configuration (defaults when no file is given)
    ShowConfig { config: Option<PathBuf> },
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario, pretty } => {
            let loaded = Scenario::from_file(&scenario)
                .with_context(|| format!("loading scenario {}", scenario.display()))?;
            log_replay_start(loaded.steps.len(), &scenario);
            let report = loaded.run()?;
            log_replay_outcome(&report);
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
        Commands::ShowConfig { config } => {
            let config = match config {
                Some(path) => PhyConfig::from_file(&path)
                    .with_context(|| format!("loading configuration {}", path.display()))?,
                None => PhyConfig::default(),
            };
            println!("{}", config.to_json_pretty()?);
        }
    }

    Ok(())
}
