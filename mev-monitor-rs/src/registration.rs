use crate::{
    beacon::BeaconDataProvider,
    error::ResolutionError,
    relay::{BlindedBlockDataProvider, RelayCatalog},
    types::{RegistrationSet, RelayOutcome},
};
use tracing::{debug, warn};

/// Looks up the public key of the validator at `index`.
pub async fn resolve_public_key<B: BeaconDataProvider + ?Sized>(
    beacon_node: &B,
    index: &str,
) -> Result<Option<String>, ResolutionError> {
    let public_key = beacon_node.get_public_key(index).await?;
    if public_key.is_none() {
        debug!(index, "beacon node returned no validator for index");
    }
    Ok(public_key)
}

/// Checks every relay in the `catalog` for a registration of `public_key`.
///
/// A relay that cannot be queried is recorded as a failure and otherwise treated as if the
/// validator was not registered there.
pub async fn registered_relays<R: BlindedBlockDataProvider>(
    public_key: &str,
    catalog: &RelayCatalog<R>,
    max_concurrent_requests: usize,
) -> RegistrationSet {
    let responses = catalog
        .query_all(max_concurrent_requests, |relay| {
            relay.fetch_validator_registration(public_key)
        })
        .await;

    let outcomes = responses
        .into_iter()
        .map(|(relay, response)| {
            let relay = relay.endpoint();
            let outcome = match response {
                Ok(true) => RelayOutcome::Confirmed,
                Ok(false) => RelayOutcome::NotFound,
                Err(err) => {
                    warn!(%relay, %err, "could not get registration from relay");
                    RelayOutcome::QueryFailed(err)
                }
            };
            (relay.id().to_string(), outcome)
        })
        .collect();

    RegistrationSet { outcomes }
}
