mod auditor;
pub mod beacon;
pub mod config;
mod error;
pub mod events;
mod registration;
pub mod relay;
pub mod report;
pub mod serde;
mod service;
mod slot_tracker;
#[cfg(test)]
mod test_utils;
pub mod types;

pub use auditor::audit_submissions;
pub use beacon::{BeaconDataProvider, BeaconNode};
pub use error::{Error, RelayQueryError, ResolutionError};
pub use events::{subscribe, EventStream, SlotEvent};
pub use registration::{registered_relays, resolve_public_key};
pub use relay::{BlindedBlockDataProvider, Relay, RelayCatalog, RelayEndpoint};
pub use report::{detect_gaps, GapReport, ReportSink, StdoutSink};
pub use service::{Config, Monitor, Service, ServiceHandle, Settings};
pub use slot_tracker::SlotTracker;
