use crate::{
    relay::{BlindedBlockDataProvider, RelayCatalog},
    types::{RelayOutcome, SubmissionIndex},
};
use tracing::{trace, warn};

/// Collects bid submission evidence for `block_hash` from every relay in the `catalog`.
///
/// The builder public key is taken from the first trace of the last relay, in catalog
/// order, that returned any trace; callers should treat it as "some builder observed".
pub async fn audit_submissions<R: BlindedBlockDataProvider>(
    block_hash: &str,
    catalog: &RelayCatalog<R>,
    max_concurrent_requests: usize,
) -> SubmissionIndex {
    let responses = catalog
        .query_all(max_concurrent_requests, |relay| relay.get_block_submissions(block_hash))
        .await;

    let mut index = SubmissionIndex::default();
    for (relay, response) in responses {
        let relay = relay.endpoint();
        let outcome = match response {
            Ok(traces) => match traces.first() {
                Some(trace) => {
                    trace!(%relay, count = traces.len(), builder = %trace.builder_public_key, "found submissions");
                    index.builder_public_key = Some(trace.builder_public_key.clone());
                    RelayOutcome::Confirmed
                }
                None => RelayOutcome::NotFound,
            },
            Err(err) => {
                warn!(%relay, %err, block_hash, "could not get bidtrace data from relay");
                RelayOutcome::QueryFailed(err)
            }
        };
        index.outcomes.push((relay.id().to_string(), outcome));
    }
    index
}
