//! nordswitch binary
//!
//! Rewrites the local IPsec configuration to the least-loaded NordVPN
//! server and re-establishes the tunnel.

use clap::Parser;
use log::error;
use nordswitch::{ConnAction, Result, Settings, Switcher};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "nordswitch")]
#[command(about = "Reconnect a strongSwan IPsec tunnel to the least-loaded NordVPN server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Settings file (TOML); flags below override its values
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// URL of the server load statistics feed
    #[arg(long, value_name = "URL")]
    stats_url: Option<String>,

    /// Seconds to wait between bring-up retries (and after a restart)
    #[arg(long, value_name = "SECS")]
    retry_timeout: Option<u64>,

    /// Keep the selected server out of the configuration file
    #[arg(long)]
    no_save: bool,

    /// Skip the daemon reload after the rewrite
    #[arg(long)]
    no_reload: bool,

    /// Restart the daemon after the rewrite
    #[arg(long)]
    restart: bool,

    /// Connection action: up, down or nothing
    #[arg(long)]
    conn: Option<ConnAction>,

    /// Path of the IPsec configuration file
    #[arg(long, value_name = "PATH")]
    ipsec_conf: Option<PathBuf>,

    /// Echo daemon output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Resolve the final settings: file (when given), then flag overrides
    fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if let Some(url) = self.stats_url {
            settings.stats_url = url;
        }
        if let Some(secs) = self.retry_timeout {
            settings.retry_timeout = secs;
        }
        if self.no_save {
            settings.save_to_conf = false;
        }
        if self.no_reload {
            settings.reload = false;
        }
        if self.restart {
            settings.restart = true;
        }
        if let Some(conn) = self.conn {
            settings.conn = conn;
        }
        if let Some(path) = self.ipsec_conf {
            settings.ipsec_conf = path;
        }
        if self.verbose {
            settings.verbose = true;
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(verbose: bool) {
    env_logger::Builder::from_default_env()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    let switcher = match Switcher::new(settings) {
        Ok(switcher) => switcher,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    if let Err(err) = switcher.run().await {
        error!("{err}");
        process::exit(1);
    }
}
