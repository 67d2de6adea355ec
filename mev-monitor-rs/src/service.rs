use crate::{
    auditor::audit_submissions,
    beacon::{BeaconDataProvider, BeaconNode},
    error::Error,
    events::{subscribe, EventStream, SlotEvent},
    registration::{registered_relays, resolve_public_key},
    relay::{http_client, parse_relay_endpoints, BlindedBlockDataProvider, Relay, RelayCatalog},
    report::{detect_gaps, ReportSink, StdoutSink},
    slot_tracker::SlotTracker,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin, task::Poll, time::Duration};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, trace, warn};
use url::Url;

pub const DEFAULT_BEACON_NODE_URL: &str = "http://localhost:5052";

pub const DEFAULT_RELAYS: &[&str] = &[
    "https://boost-relay.flashbots.net",
    "https://bloxroute.regulated.blxrbdn.com",
    "https://bloxroute.max-profit.blxrbdn.com",
    "https://relay.ultrasound.money",
    "https://agnostic-relay.net",
    "https://builder-relay-mainnet.blocknative.com",
    "https://aestus.live",
];

pub const DEFAULT_RELAYS_OF_INTEREST: &[&str] =
    &["https://bloxroute.regulated.blxrbdn.com", "https://bloxroute.max-profit.blxrbdn.com"];

// Relay data APIs do not always expose a submission right after the registration check.
const DEFAULT_SETTLE_DELAY_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CYCLE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub beacon_node_url: String,
    /// Relays polled for registrations and submissions
    pub relays: Vec<String>,
    /// Relays a gap is reported for
    pub relays_of_interest: Vec<String>,
    pub settle_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub cycle_timeout_ms: u64,
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            beacon_node_url: DEFAULT_BEACON_NODE_URL.to_string(),
            relays: DEFAULT_RELAYS.iter().map(|relay| relay.to_string()).collect(),
            relays_of_interest: DEFAULT_RELAYS_OF_INTEREST
                .iter()
                .map(|relay| relay.to_string())
                .collect(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cycle_timeout_ms: DEFAULT_CYCLE_TIMEOUT_MS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub settle_delay: Duration,
    pub cycle_timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            cycle_timeout: Duration::from_millis(config.cycle_timeout_ms),
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        }
    }
}

/// Audits the relays of interest once per slot transition.
///
/// The monitor is the single owner of the [`SlotTracker`]; events are
/// processed one at a time and each one runs to completion before the next is taken.
pub struct Monitor<B, R, S> {
    beacon_node: B,
    catalog: RelayCatalog<R>,
    sink: S,
    settings: Settings,
    tracker: SlotTracker,
}

impl<B, R, S> Monitor<B, R, S>
where
    B: BeaconDataProvider,
    R: BlindedBlockDataProvider,
    S: ReportSink,
{
    pub fn new(beacon_node: B, catalog: RelayCatalog<R>, sink: S, settings: Settings) -> Self {
        Self { beacon_node, catalog, sink, settings, tracker: Default::default() }
    }

    pub fn tracker(&self) -> &SlotTracker {
        &self.tracker
    }

    pub async fn on_raw_event(&mut self, data: &str) {
        match SlotEvent::from_raw(data) {
            Ok(event) => self.on_slot_event(event).await,
            Err(err) => warn!(%err, data, "could not process beacon event"),
        }
    }

    pub async fn on_slot_event(&mut self, event: SlotEvent) {
        if self.tracker.is_duplicate(&event) {
            trace!(slot = event.proposal_slot, "ignoring duplicate payload attributes");
            return
        }

        if let Some(previous) = self.tracker.previous() {
            let cycle = self.audit(previous, &event);
            if tokio::time::timeout(self.settings.cycle_timeout, cycle).await.is_err() {
                warn!(
                    slot = previous.proposal_slot,
                    timeout = ?self.settings.cycle_timeout,
                    "abandoning audit that did not finish in time"
                );
            }
        } else {
            debug!(%event, "no previous proposer to audit");
        }

        self.tracker.advance(event);
    }

    /// Audits the proposer of `previous` against the block that `current` builds on.
    async fn audit(&self, previous: &SlotEvent, current: &SlotEvent) {
        let slot = previous.proposal_slot;
        let index = previous.proposer_index.as_str();
        let block_hash = current.parent_block_hash.as_str();

        let public_key = match resolve_public_key(&self.beacon_node, index).await {
            Ok(Some(public_key)) => public_key,
            Ok(None) => {
                warn!(slot, index, "could not find public key for proposer");
                return
            }
            Err(err) => {
                warn!(%err, slot, index, "could not get public key for proposer");
                return
            }
        };

        let limit = self.settings.max_concurrent_requests;
        let registrations = registered_relays(&public_key, &self.catalog, limit).await;

        tokio::time::sleep(self.settings.settle_delay).await;

        let submissions = audit_submissions(block_hash, &self.catalog, limit).await;

        debug!(
            slot,
            block_hash,
            proposer = %public_key,
            registered = ?registrations.registered().collect::<Vec<_>>(),
            "audited proposer"
        );

        if let Some(report) =
            detect_gaps(slot, block_hash, &registrations, &self.catalog, &submissions)
        {
            let missing = report.missing_relays().collect::<Vec<_>>();
            let unreachable = report
                .missing
                .iter()
                .filter(|missing| missing.query_failed)
                .map(|missing| missing.relay.as_str())
                .collect::<Vec<_>>();
            warn!(
                slot,
                block_hash,
                builder = report.builder_public_key.as_deref().unwrap_or_default(),
                ?missing,
                ?unreachable,
                "bids not received by relays of interest"
            );
            self.sink.emit(&report);
        }
    }

    /// Processes `events` until the stream ends.
    ///
    /// An error before the first event means the subscription could not be established and
    /// is returned; later transport errors are logged.
    pub async fn run<E>(mut self, mut events: E) -> Result<(), Error>
    where
        E: Stream<Item = Result<String, Error>> + Unpin,
    {
        let mut established = false;
        while let Some(event) = events.next().await {
            match event {
                Ok(data) => {
                    established = true;
                    self.on_raw_event(&data).await;
                }
                Err(err) if !established => return Err(err),
                Err(err) => warn!(%err, "error getting beacon node event"),
            }
        }
        Err(Error::SubscriptionClosed)
    }
}

pub struct Service {
    config: Config,
}

impl Service {
    pub fn from(config: Config) -> Self {
        Self { config }
    }

    fn build(&self) -> Result<(Monitor<BeaconNode, Relay, StdoutSink>, Url), Error> {
        let config = &self.config;
        let endpoint: Url = config.beacon_node_url.parse()?;
        let client = http_client(Duration::from_millis(config.request_timeout_ms))?;

        let relays = parse_relay_endpoints(&config.relays)
            .into_iter()
            .map(|endpoint| Relay::new(client.clone(), endpoint))
            .collect::<Vec<_>>();
        if relays.is_empty() {
            return Err(Error::Config("no valid relays provided".to_string()))
        }
        let catalog = RelayCatalog::new(relays, &config.relays_of_interest);

        let count = catalog.len();
        let relays = catalog.iter().map(|relay| relay.to_string()).collect::<Vec<_>>();
        info!(count, ?relays, of_interest = ?config.relays_of_interest, "configured with relay(s)");

        let beacon_node = BeaconNode::new(client, endpoint.clone());
        let monitor = Monitor::new(beacon_node, catalog, StdoutSink, Settings::from(config));
        Ok((monitor, endpoint))
    }

    /// Subscribes to the beacon node and spawns the [`Monitor`] task.
    pub fn spawn(self) -> Result<ServiceHandle, Error> {
        let (monitor, endpoint) = self.build()?;
        let events: EventStream = subscribe(&endpoint)?;
        let monitor = tokio::spawn(async move { monitor.run(events).await });
        Ok(ServiceHandle { monitor })
    }
}

/// Contains the handle to the spawned [`Monitor`] task
///
/// This struct is created by the [`Service::spawn`] function
#[pin_project::pin_project]
pub struct ServiceHandle {
    #[pin]
    monitor: JoinHandle<Result<(), Error>>,
}

impl Future for ServiceHandle {
    type Output = Result<Result<(), Error>, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        self.project().monitor.poll(cx)
    }
}
