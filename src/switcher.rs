//! Orchestration of a full reconnect run
//!
//! Sequences teardown, server reselection, the configuration rewrite and the
//! final bring-up. Every error outside the bring-up retry loop is fatal to
//! the run.

use crate::conf::IpsecConf;
use crate::config::{ConnAction, Settings};
use crate::daemon::IpsecDaemon;
use crate::error::{Result, SwitchError};
use crate::stats::{self, StatsFeed};

/// Drives one reconnect run from settings to an established tunnel
#[derive(Debug)]
pub struct Switcher {
    settings: Settings,
    daemon: IpsecDaemon,
    feed: StatsFeed,
}

impl Switcher {
    /// Build a switcher from validated settings
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let daemon = IpsecDaemon::new(settings.daemon_command.as_str(), settings.verbose);
        let feed = StatsFeed::new(settings.stats_url.as_str())?;
        Ok(Switcher {
            settings,
            daemon,
            feed,
        })
    }

    /// Execute one full run
    pub async fn run(&self) -> Result<()> {
        let mut conf = IpsecConf::load(&self.settings.ipsec_conf)?;
        let name = conf.connection_name().ok_or_else(|| {
            SwitchError::Config(format!(
                "No connection name found in {}",
                self.settings.ipsec_conf.display()
            ))
        })?;
        log::info!("Managed connection: {name}");

        match self.settings.conn {
            ConnAction::Down => {
                // Explicit teardown request, so a daemon failure is fatal
                self.daemon.down(&name).await?;
                log::info!("Connection {name} torn down");
                return Ok(());
            }
            ConnAction::Up => {
                // The tunnel may simply not be up; not worth aborting over
                if let Err(err) = self.daemon.down(&name).await {
                    log::warn!("Teardown before reselect failed: {err}");
                }
            }
            ConnAction::Nothing => {}
        }

        let report = self.feed.fetch().await?;
        let selection = stats::fastest(&report).ok_or(SwitchError::NoServer)?;
        log::info!(
            "The fastest server is {} at {}% load",
            selection.server,
            selection.percent
        );

        if let Some(old) = conf.current_endpoint() {
            log::info!("Previous server: {old}");
        }

        let replaced = conf.rewrite_endpoint(&selection.server);
        if replaced == 0 {
            log::warn!(
                "No endpoint line found in {}; nothing was rewritten",
                self.settings.ipsec_conf.display()
            );
        }

        if self.settings.save_to_conf {
            conf.persist(&self.settings.ipsec_conf)?;
            log::info!("Server is now {}", selection.server);
        }

        if self.settings.reload {
            self.daemon.reload().await?;
        }

        if self.settings.restart {
            self.daemon.restart().await?;
            // Give the daemon a moment to come back before the first attempt
            tokio::time::sleep(self.settings.retry_delay()).await;
        }

        if self.settings.conn == ConnAction::Up {
            let attempts = self
                .daemon
                .bring_up(&name, self.settings.retry_delay())
                .await;
            log::info!("Connection {name} up after {attempts} attempt(s)");
        }

        Ok(())
    }
}
