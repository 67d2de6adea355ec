use crate::cmd::config::ConfigArgs;
use clap::Args;
use mev_monitor_rs::Service;
use tracing::info;

#[derive(Debug, Args)]
#[clap(about = "📡 report relays of interest that missed a registered proposer's block")]
pub struct Command {
    #[clap(flatten)]
    args: ConfigArgs,
}

impl Command {
    pub async fn execute(self) -> eyre::Result<()> {
        let config = self.args.resolve()?;

        let beacon_node_url = &config.beacon_node_url;
        info!("monitoring relays with beacon node at {beacon_node_url}");

        Ok(Service::from(config).spawn()?.await??)
    }
}
