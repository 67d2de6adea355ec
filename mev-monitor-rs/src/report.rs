use crate::{
    relay::{BlindedBlockDataProvider, RelayCatalog},
    types::{RegistrationSet, Slot, SubmissionIndex},
};
use std::fmt;
use url::Url;

/// A relay of interest the proposer was registered with but that has no submission on record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRelay {
    pub relay: String,
    /// Data API query used to audit the relay.
    pub url: Url,
    /// The relay could not be queried, so the gap may be a false positive.
    pub query_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapReport {
    pub slot: Slot,
    pub block_hash: String,
    pub builder_public_key: Option<String>,
    pub missing: Vec<MissingRelay>,
}

impl GapReport {
    pub fn missing_relays(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(|missing| missing.relay.as_str())
    }
}

impl fmt::Display for GapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bids not received for slot {}", self.slot)?;
        writeln!(f, "BlockHash: {}", self.block_hash)?;
        writeln!(f, "Builder pubkey: {}", self.builder_public_key.as_deref().unwrap_or_default())?;
        writeln!(f, "Relays not received: ")?;
        for missing in &self.missing {
            writeln!(f, "{}", missing.relay)?;
            writeln!(f, "{}", missing.url)?;
        }
        writeln!(f)
    }
}

/// Computes `(registered ∩ of interest) \ submitted` for the audited slot.
///
/// Returns `None` when the proposer is not registered at any relay of interest or when
/// every such relay has a submission on record.
pub fn detect_gaps<R: BlindedBlockDataProvider>(
    slot: Slot,
    block_hash: &str,
    registrations: &RegistrationSet,
    catalog: &RelayCatalog<R>,
    submissions: &SubmissionIndex,
) -> Option<GapReport> {
    let missing = registrations
        .registered()
        .filter(|relay| catalog.is_of_interest(relay))
        .filter(|relay| !submissions.submitted(relay))
        .filter_map(|relay| {
            let endpoint = catalog.get(relay)?.endpoint();
            Some(MissingRelay {
                relay: relay.to_string(),
                url: endpoint.block_submissions_url(block_hash),
                query_failed: submissions.query_failed(relay),
            })
        })
        .collect::<Vec<_>>();

    if missing.is_empty() {
        return None
    }

    Some(GapReport {
        slot,
        block_hash: block_hash.to_string(),
        builder_public_key: submissions.builder_public_key.clone(),
        missing,
    })
}

/// Destination for gap reports.
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &GapReport);
}

/// Writes reports to standard output, each followed by a blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn emit(&self, report: &GapReport) {
        println!("{report}");
    }
}
