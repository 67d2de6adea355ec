//! In-memory stand-ins for the beacon node, the relays and the report sink.

use crate::{
    beacon::BeaconDataProvider,
    error::{RelayQueryError, ResolutionError},
    relay::{BlindedBlockDataProvider, RelayEndpoint},
    report::{GapReport, ReportSink},
    types::SubmissionTrace,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::{collections::HashMap, sync::Arc, time::Duration};

pub const R1: &str = "https://relay-1.example.com";
pub const R2: &str = "https://relay-2.example.com";
pub const R3: &str = "https://relay-3.example.com";

pub fn public_key_for(index: &str) -> String {
    format!("0xpubkey{index}")
}

#[derive(Default)]
pub struct FakeBeacon {
    pub unknown: Vec<String>,
    /// Lookups of these indices do not answer for a minute.
    pub slow: Vec<String>,
    pub failing: bool,
    pub lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl BeaconDataProvider for FakeBeacon {
    async fn get_public_key(&self, index: &str) -> Result<Option<String>, ResolutionError> {
        self.lookups.lock().push(index.to_string());
        if self.slow.iter().any(|i| i == index) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.failing {
            return Err(ResolutionError::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR))
        }
        if self.unknown.iter().any(|i| i == index) {
            return Ok(None)
        }
        Ok(Some(public_key_for(index)))
    }
}

pub struct FakeRelay {
    endpoint: RelayEndpoint,
    registered: Mutex<Vec<String>>,
    submissions: Mutex<HashMap<String, Vec<SubmissionTrace>>>,
    registration_down: bool,
    data_down: bool,
    pub registration_queries: Mutex<Vec<String>>,
    pub submission_queries: Mutex<Vec<String>>,
}

impl FakeRelay {
    pub fn new(url: &str) -> Self {
        Self {
            endpoint: RelayEndpoint::try_from(url).unwrap(),
            registered: Default::default(),
            submissions: Default::default(),
            registration_down: false,
            data_down: false,
            registration_queries: Default::default(),
            submission_queries: Default::default(),
        }
    }

    pub fn unreachable(url: &str) -> Self {
        Self { registration_down: true, data_down: true, ..Self::new(url) }
    }

    pub fn with_registration(self, public_key: &str) -> Self {
        self.registered.lock().push(public_key.to_string());
        self
    }

    pub fn with_submission(self, block_hash: &str, builder_public_key: &str) -> Self {
        let trace = SubmissionTrace {
            block_hash: block_hash.to_string(),
            builder_public_key: builder_public_key.to_string(),
            ..Default::default()
        };
        self.submissions.lock().entry(block_hash.to_string()).or_default().push(trace);
        self
    }

    pub fn with_data_api_down(mut self) -> Self {
        self.data_down = true;
        self
    }
}

#[async_trait]
impl BlindedBlockDataProvider for FakeRelay {
    fn endpoint(&self) -> &RelayEndpoint {
        &self.endpoint
    }

    async fn fetch_validator_registration(
        &self,
        public_key: &str,
    ) -> Result<bool, RelayQueryError> {
        self.registration_queries.lock().push(public_key.to_string());
        if self.registration_down {
            return Err(RelayQueryError::UnexpectedStatus(StatusCode::SERVICE_UNAVAILABLE))
        }
        Ok(self.registered.lock().iter().any(|key| key == public_key))
    }

    async fn get_block_submissions(
        &self,
        block_hash: &str,
    ) -> Result<Vec<SubmissionTrace>, RelayQueryError> {
        self.submission_queries.lock().push(block_hash.to_string());
        if self.data_down {
            return Err(RelayQueryError::UnexpectedStatus(StatusCode::GATEWAY_TIMEOUT))
        }
        Ok(self.submissions.lock().get(block_hash).cloned().unwrap_or_default())
    }
}

/// Captures every emitted report, rendered as text.
#[derive(Clone, Default)]
pub struct CollectingSink {
    pub reports: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ReportSink for CollectingSink {
    fn emit(&self, report: &GapReport) {
        self.reports.lock().push(report.to_string());
    }
}
