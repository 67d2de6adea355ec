use crate::{error::ResolutionError, relay::endpoint_url, types::ValidatorsResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

const VALIDATORS_PATH: &[&str] = &["eth", "v1", "beacon", "states", "head", "validators"];

#[async_trait]
pub trait BeaconDataProvider: Send + Sync {
    /// Public key of the validator at `index`, `None` if the beacon node does not know it.
    async fn get_public_key(&self, index: &str) -> Result<Option<String>, ResolutionError>;
}

/// A `Client` for the subset of the beacon node APIs the monitor consumes.
#[derive(Clone, Debug)]
pub struct BeaconNode {
    client: Client,
    endpoint: Url,
}

impl BeaconNode {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn validator_url(&self, index: &str) -> Result<Url, ResolutionError> {
        let mut url = endpoint_url(&self.endpoint, VALIDATORS_PATH)?;
        url.query_pairs_mut().append_pair("id", index);
        Ok(url)
    }
}

#[async_trait]
impl BeaconDataProvider for BeaconNode {
    async fn get_public_key(&self, index: &str) -> Result<Option<String>, ResolutionError> {
        let url = self.validator_url(index)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolutionError::UnexpectedStatus(status))
        }
        let response: ValidatorsResponse = response.json().await?;
        Ok(response.data.into_iter().next().map(|summary| summary.validator.public_key))
    }
}
