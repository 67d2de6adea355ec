use crate::error::RelayQueryError;
use serde::Deserialize;

pub type Slot = u64;

/// Outcome of querying a single relay.
#[derive(Debug)]
pub enum RelayOutcome {
    Confirmed,
    NotFound,
    QueryFailed(RelayQueryError),
}

impl RelayOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::QueryFailed(..))
    }
}

/// Entry of the relay data API `builder_blocks_received` listing.
///
/// Only `builder_pubkey` is guaranteed across relay implementations.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SubmissionTrace {
    #[serde(default, with = "crate::serde::as_str")]
    pub slot: Slot,
    #[serde(default)]
    pub parent_hash: String,
    #[serde(default)]
    pub block_hash: String,
    #[serde(rename = "builder_pubkey")]
    pub builder_public_key: String,
    #[serde(default, rename = "proposer_pubkey")]
    pub proposer_public_key: String,
    #[serde(default)]
    pub value: String,
}

/// Per-relay registration status of one validator, in catalog order.
#[derive(Debug, Default)]
pub struct RegistrationSet {
    pub(crate) outcomes: Vec<(String, RelayOutcome)>,
}

impl RegistrationSet {
    /// Relays where the validator is currently registered.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_confirmed())
            .map(|(relay, _)| relay.as_str())
    }

    pub fn is_registered(&self, relay: &str) -> bool {
        self.registered().any(|r| r == relay)
    }

    pub fn outcomes(&self) -> &[(String, RelayOutcome)] {
        &self.outcomes
    }
}

/// Per-relay submission evidence for one block hash, in catalog order.
#[derive(Debug, Default)]
pub struct SubmissionIndex {
    pub(crate) outcomes: Vec<(String, RelayOutcome)>,
    /// Builder seen by the last relay (in catalog order) that had records.
    pub builder_public_key: Option<String>,
}

impl SubmissionIndex {
    pub fn submitted(&self, relay: &str) -> bool {
        self.outcome(relay).map(RelayOutcome::is_confirmed).unwrap_or(false)
    }

    pub fn query_failed(&self, relay: &str) -> bool {
        self.outcome(relay).map(RelayOutcome::is_failure).unwrap_or(false)
    }

    pub fn outcome(&self, relay: &str) -> Option<&RelayOutcome> {
        self.outcomes.iter().find(|(r, _)| r == relay).map(|(_, outcome)| outcome)
    }

    pub fn outcomes(&self) -> &[(String, RelayOutcome)] {
        &self.outcomes
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorsResponse {
    pub data: Vec<ValidatorSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorSummary {
    pub validator: Validator,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Validator {
    #[serde(rename = "pubkey")]
    pub public_key: String,
}
