use clap::Args;
use eyre::WrapErr;
use mev_monitor_rs::{config::from_toml_file, Config};
use tracing::info;

/// Sources of the monitor's configuration.
///
/// Values given on the command line (or through the environment) take precedence over the
/// TOML file, which in turn takes precedence over the defaults.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Path to a TOML file with the monitor configuration
    #[clap(long = "config", env = "MEV_MONITOR_CONFIG")]
    pub config_file: Option<String>,
    /// URL of the beacon node API
    #[clap(long, env = "BEACON_CLIENT")]
    pub beacon_client: Option<String>,
    /// Comma-separated relay URLs to poll
    #[clap(long, env = "RELAYS", value_delimiter = ',')]
    pub relays: Option<Vec<String>>,
    /// Comma-separated relay URLs to report missing submissions for
    #[clap(long, env = "RELAYS_OF_INTEREST", value_delimiter = ',')]
    pub relays_of_interest: Option<Vec<String>>,
}

impl ConfigArgs {
    pub fn resolve(self) -> eyre::Result<Config> {
        let mut config = match &self.config_file {
            Some(path) => from_toml_file::<_, Config>(path).wrap_err("could not load config")?,
            None => Config::default(),
        };
        if let Some(beacon_node_url) = self.beacon_client {
            config.beacon_node_url = beacon_node_url;
        }
        if let Some(relays) = self.relays {
            config.relays = relays;
        }
        if let Some(relays_of_interest) = self.relays_of_interest {
            config.relays_of_interest = relays_of_interest;
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
#[clap(about = "🔬 (debug) utility to verify configuration")]
pub struct Command {
    #[clap(flatten)]
    args: ConfigArgs,
}

impl Command {
    pub async fn execute(self) -> eyre::Result<()> {
        let config = self.args.resolve()?;
        info!("{config:#?}");

        Ok(())
    }
}
