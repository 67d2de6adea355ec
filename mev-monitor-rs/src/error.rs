use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not decode payload attributes event: {0}")]
    MalformedEvent(#[source] serde_json::Error),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("could not subscribe to beacon node events: {0}")]
    Subscription(String),
    #[error("beacon node event stream closed")]
    SubscriptionClosed,
    #[error("invalid relay URL `{0}`: {1}")]
    InvalidRelayUrl(String, #[source] url::ParseError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to map a validator index to its public key.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("beacon node responded with status {0}")]
    UnexpectedStatus(StatusCode),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Failure of a single relay data API query.
///
/// These never abort an evaluation cycle; they are recorded as
/// [`RelayOutcome::QueryFailed`](crate::types::RelayOutcome::QueryFailed).
#[derive(Debug, Error)]
pub enum RelayQueryError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("relay responded with status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("could not decode relay response: {0}")]
    Decode(String),
}
