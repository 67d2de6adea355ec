use crate::{error::Error, error::RelayQueryError, types::SubmissionTrace};
use async_trait::async_trait;
use futures::{future::BoxFuture, stream, FutureExt, StreamExt};
use rand::seq::SliceRandom;
use reqwest::{header, Client, StatusCode};
use std::{collections::HashSet, fmt, time::Duration};
use url::Url;

const VALIDATOR_REGISTRATION_PATH: &[&str] = &["relay", "v1", "data", "validator_registration"];
const BUILDER_BLOCKS_RECEIVED_PATH: &[&str] =
    &["relay", "v1", "data", "bidtraces", "builder_blocks_received"];

// Some relays filter the data API by client; look like a browser.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/118.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.0; rv:109.0) Gecko/20100101 Firefox/118.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/118.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36 Edg/118.0.2088.46",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::thread_rng()).copied().unwrap_or(USER_AGENTS[0])
}

/// Location of a relay's data API.
///
/// The identifier is the configured URL without a trailing slash and is what the relays
/// of interest are matched against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayEndpoint {
    id: String,
    url: Url,
}

impl RelayEndpoint {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn validator_registration_url(&self, public_key: &str) -> Url {
        self.data_api_url(VALIDATOR_REGISTRATION_PATH, "pubkey", public_key)
    }

    pub fn block_submissions_url(&self, block_hash: &str) -> Url {
        self.data_api_url(BUILDER_BLOCKS_RECEIVED_PATH, "block_hash", block_hash)
    }

    fn data_api_url(&self, path: &[&str], key: &str, value: &str) -> Url {
        // `try_from` only admits URLs that can be a base
        let mut url = endpoint_url(&self.url, path).unwrap_or_else(|_| self.url.clone());
        url.query_pairs_mut().append_pair(key, value);
        url
    }
}

impl TryFrom<&str> for RelayEndpoint {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let id = normalize_relay_id(value);
        let url = Url::parse(&id).map_err(|err| Error::InvalidRelayUrl(value.to_string(), err))?;
        if url.cannot_be_a_base() {
            let err = url::ParseError::RelativeUrlWithCannotBeABaseBase;
            return Err(Error::InvalidRelayUrl(value.to_string(), err))
        }
        Ok(Self { id, url })
    }
}

impl fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Appends `segments` to the path of `base`, keeping any path prefix it already has.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, url::ParseError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub fn normalize_relay_id(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

/// Parses every non-empty entry, logging and skipping the invalid ones.
pub fn parse_relay_endpoints<T: AsRef<str>>(values: &[T]) -> Vec<RelayEndpoint> {
    let mut relays: Vec<RelayEndpoint> = vec![];
    for value in values {
        let value = value.as_ref();
        if value.trim().is_empty() {
            continue
        }
        match RelayEndpoint::try_from(value) {
            Ok(relay) => {
                if relays.iter().any(|r| r.id == relay.id) {
                    tracing::warn!(relay = %relay, "ignoring duplicate relay in config");
                } else {
                    relays.push(relay)
                }
            }
            Err(err) => tracing::warn!(%err, "error parsing relay from config"),
        }
    }
    if relays.is_empty() {
        tracing::error!("no relays could be loaded from the configuration; please fix and restart");
    }
    relays
}

/// Queries against a relay's data API.
#[async_trait]
pub trait BlindedBlockDataProvider: Send + Sync {
    fn endpoint(&self) -> &RelayEndpoint;

    /// `Ok(true)` iff the relay holds a registration for `public_key`.
    async fn fetch_validator_registration(&self, public_key: &str)
        -> Result<bool, RelayQueryError>;

    async fn get_block_submissions(
        &self,
        block_hash: &str,
    ) -> Result<Vec<SubmissionTrace>, RelayQueryError>;
}

/// A `Relay` data API client over HTTP.
#[derive(Clone, Debug)]
pub struct Relay {
    client: Client,
    endpoint: RelayEndpoint,
}

impl Relay {
    pub fn new(client: Client, endpoint: RelayEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}

#[async_trait]
impl BlindedBlockDataProvider for Relay {
    fn endpoint(&self) -> &RelayEndpoint {
        &self.endpoint
    }

    async fn fetch_validator_registration(
        &self,
        public_key: &str,
    ) -> Result<bool, RelayQueryError> {
        let url = self.endpoint.validator_registration_url(public_key);
        let user_agent = random_user_agent();
        let response = self.client.get(url).header(header::USER_AGENT, user_agent).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                Err(RelayQueryError::UnexpectedStatus(status))
            }
            status if status.is_client_error() => Ok(false),
            status => Err(RelayQueryError::UnexpectedStatus(status)),
        }
    }

    async fn get_block_submissions(
        &self,
        block_hash: &str,
    ) -> Result<Vec<SubmissionTrace>, RelayQueryError> {
        let url = self.endpoint.block_submissions_url(block_hash);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayQueryError::UnexpectedStatus(status))
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| RelayQueryError::Decode(err.to_string()))
    }
}

/// Builds the HTTP client shared by every relay and the beacon node.
pub fn http_client(request_timeout: Duration) -> Result<Client, Error> {
    Client::builder().timeout(request_timeout).build().map_err(From::from)
}

/// The relays to poll and the subset monitored for missed submissions.
#[derive(Debug)]
pub struct RelayCatalog<R> {
    relays: Vec<R>,
    of_interest: HashSet<String>,
}

impl<R: BlindedBlockDataProvider> RelayCatalog<R> {
    pub fn new<I, S>(relays: Vec<R>, of_interest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let of_interest = of_interest
            .into_iter()
            .map(|relay| normalize_relay_id(relay.as_ref()))
            .filter(|relay| !relay.is_empty())
            .collect::<HashSet<_>>();
        for relay in &of_interest {
            if !relays.iter().any(|r| r.endpoint().id() == relay.as_str()) {
                tracing::warn!(%relay, "relay of interest is not in the set of polled relays");
            }
        }
        Self { relays, of_interest }
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.relays.iter()
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.relays.iter().find(|r| r.endpoint().id() == id)
    }

    pub fn is_of_interest(&self, id: &str) -> bool {
        self.of_interest.contains(id)
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Runs `query` against every relay with at most `limit` queries in flight.
    ///
    /// Results are returned in catalog order.
    pub async fn query_all<'a, F, T>(&'a self, limit: usize, query: F) -> Vec<(&'a R, T)>
    where
        F: Fn(&'a R) -> BoxFuture<'a, T>,
        T: Send + 'a,
    {
        // futures are lazy, so building them up front does not start any request
        let requests = self
            .relays
            .iter()
            .map(|relay| {
                let response = query(relay);
                async move { (relay, response.await) }.boxed()
            })
            .collect::<Vec<_>>();
        stream::iter(requests).buffered(limit.max(1)).collect::<Vec<_>>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://bloxroute.max-profit.blxrbdn.com";

    #[test]
    fn test_parse_relay_endpoint() {
        let endpoint = RelayEndpoint::try_from(" https://bloxroute.max-profit.blxrbdn.com/ ").unwrap();
        assert_eq!(endpoint.id(), URL);
        assert_eq!(endpoint.to_string(), URL);
    }

    #[test]
    fn test_data_api_urls() {
        let endpoint = RelayEndpoint::try_from(URL).unwrap();
        assert_eq!(
            endpoint.block_submissions_url("0xabc").as_str(),
            "https://bloxroute.max-profit.blxrbdn.com/relay/v1/data/bidtraces/builder_blocks_received?block_hash=0xabc"
        );
        assert_eq!(
            endpoint.validator_registration_url("0xdef").as_str(),
            "https://bloxroute.max-profit.blxrbdn.com/relay/v1/data/validator_registration?pubkey=0xdef"
        );
    }

    #[test]
    fn test_data_api_urls_keep_path_prefix() {
        let endpoint = RelayEndpoint::try_from("https://gateway.example.com/mainnet/relay-a/").unwrap();
        assert_eq!(endpoint.id(), "https://gateway.example.com/mainnet/relay-a");
        assert_eq!(
            endpoint.block_submissions_url("0xabc").as_str(),
            "https://gateway.example.com/mainnet/relay-a/relay/v1/data/bidtraces/builder_blocks_received?block_hash=0xabc"
        );
        assert_eq!(
            endpoint.validator_registration_url("0xdef").as_str(),
            "https://gateway.example.com/mainnet/relay-a/relay/v1/data/validator_registration?pubkey=0xdef"
        );
    }

    #[test]
    fn test_relay_endpoint_must_be_a_base() {
        assert!(matches!(
            RelayEndpoint::try_from("mailto:relay@example.com"),
            Err(Error::InvalidRelayUrl(..))
        ));
    }

    #[test]
    fn test_relay_endpoints_skip_invalid() {
        let endpoints = vec![URL, "", "not a url", "https://relay.ultrasound.money", URL];
        let relays = parse_relay_endpoints(&endpoints);
        assert_eq!(relays.len(), 2);
        assert_eq!(relays[0].id(), URL);
        assert_eq!(relays[1].id(), "https://relay.ultrasound.money");
    }

    #[test]
    fn test_empty_relay_endpoints() {
        let endpoints: Vec<String> = vec![];
        assert!(parse_relay_endpoints(&endpoints).is_empty());
    }

    #[test]
    fn test_random_user_agent() {
        let user_agent = random_user_agent();
        assert!(USER_AGENTS.contains(&user_agent));
    }

    #[test]
    fn test_catalog_matches_normalized_interest() {
        let client = Client::new();
        let relays = parse_relay_endpoints(&[URL, "https://relay.ultrasound.money"])
            .into_iter()
            .map(|endpoint| Relay::new(client.clone(), endpoint))
            .collect::<Vec<_>>();
        let catalog = RelayCatalog::new(relays, [format!("{URL}/")]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.is_of_interest(URL));
        assert!(!catalog.is_of_interest("https://relay.ultrasound.money"));
        assert!(catalog.get("https://relay.ultrasound.money").is_some());
    }
}
