use crate::{error::Error, relay::endpoint_url, types::Slot};
use eventsource_client as es;
use futures::{future, Stream, StreamExt};
use serde::Deserialize;
use std::{fmt, pin::Pin, time::Duration};
use url::Url;

const EVENTS_PATH: &[&str] = &["eth", "v1", "events"];
const PAYLOAD_ATTRIBUTES_TOPIC: &str = "payload_attributes";

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(60);

/// Raw `data` payloads of the beacon node's `payload_attributes` events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

#[derive(Debug, Deserialize)]
struct PayloadAttributesEvent {
    data: PayloadAttributesData,
}

#[derive(Debug, Deserialize)]
struct PayloadAttributesData {
    #[serde(with = "crate::serde::as_str")]
    proposal_slot: Slot,
    parent_block_hash: String,
    #[serde(with = "crate::serde::as_string")]
    proposer_index: String,
}

/// A slot transition announced by the beacon node.
///
/// `parent_block_hash` is the execution block hash of the current head, i.e. the block
/// proposed in the slot before `proposal_slot`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotEvent {
    pub proposal_slot: Slot,
    pub parent_block_hash: String,
    pub proposer_index: String,
}

impl SlotEvent {
    pub fn from_raw(data: &str) -> Result<Self, Error> {
        let event: PayloadAttributesEvent =
            serde_json::from_str(data).map_err(Error::MalformedEvent)?;
        let PayloadAttributesData { proposal_slot, parent_block_hash, proposer_index } = event.data;
        Ok(Self { proposal_slot, parent_block_hash, proposer_index })
    }

    pub fn is_same_slot(&self, other: &SlotEvent) -> bool {
        self.proposal_slot == other.proposal_slot
    }
}

impl fmt::Display for SlotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.proposal_slot;
        let parent_block_hash = &self.parent_block_hash;
        let proposer_index = &self.proposer_index;
        write!(f, "slot {slot}, parent block hash {parent_block_hash} and proposer {proposer_index}")
    }
}

pub fn events_url(beacon_node: &Url) -> Result<Url, Error> {
    let mut url = endpoint_url(beacon_node, EVENTS_PATH)?;
    url.query_pairs_mut().append_pair("topics", PAYLOAD_ATTRIBUTES_TOPIC);
    Ok(url)
}

/// Subscribes to `payload_attributes` events on the beacon node at `beacon_node`.
///
/// The underlying client reconnects after the subscription was established once, including
/// when the beacon node closes the connection; an error before that surfaces as the first
/// item of the stream.
pub fn subscribe(beacon_node: &Url) -> Result<EventStream, Error> {
    let url = events_url(beacon_node)?;
    tracing::info!(%url, "subscribing to beacon node events");

    let client = es::ClientBuilder::for_url(url.as_str())
        .map_err(|err| Error::Subscription(format!("{err:?}")))?
        .header("Accept", "text/event-stream")
        .map_err(|err| Error::Subscription(format!("{err:?}")))?
        .reconnect(
            es::ReconnectOptions::reconnect(true)
                .retry_initial(false)
                .delay(RECONNECT_DELAY)
                .backoff_factor(2)
                .delay_max(RECONNECT_DELAY_MAX)
                .build(),
        )
        .build();

    // the client reconnects on its own once the beacon node closes the connection
    let stream = es::Client::stream(&client).filter_map(|result| {
        let item = match result {
            Ok(es::SSE::Event(event)) => Some(Ok(event.data)),
            Ok(_) => None,
            Err(es::Error::Eof) => {
                tracing::debug!("beacon node closed the event stream, reconnecting");
                None
            }
            Err(err) => Some(Err(Error::Subscription(format!("{err:?}")))),
        };
        future::ready(item)
    });

    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "version": "capella",
        "data": {
            "proposer_index": "123",
            "proposal_slot": "10",
            "parent_block_number": "9",
            "parent_block_root": "0x9a2fefd2fdb57f74993c7780ea5b9030d2897b615b89f808011ca5aebed54eaf",
            "parent_block_hash": "0x9a2fefd2fdb57f74993c7780ea5b9030d2897b615b89f808011ca5aebed54eaf",
            "payload_attributes": {
                "timestamp": "123456",
                "prev_randao": "0x9a2fefd2fdb57f74993c7780ea5b9030d2897b615b89f808011ca5aebed54eaf",
                "suggested_fee_recipient": "0x0000000000000000000000000000000000000000",
                "withdrawals": []
            }
        }
    }"#;

    #[test]
    fn test_parse_beacon_event() {
        let event = SlotEvent::from_raw(EVENT).unwrap();
        assert_eq!(event.proposal_slot, 10);
        assert_eq!(event.proposer_index, "123");
        assert_eq!(
            event.parent_block_hash,
            "0x9a2fefd2fdb57f74993c7780ea5b9030d2897b615b89f808011ca5aebed54eaf"
        );
    }

    #[test]
    fn test_parse_unquoted_fields() {
        let raw = r#"{"data":{"proposal_slot":11,"parent_block_hash":"0x01","proposer_index":5}}"#;
        let event = SlotEvent::from_raw(raw).unwrap();
        assert_eq!(event.proposal_slot, 11);
        assert_eq!(event.proposer_index, "5");
    }

    #[test]
    fn test_malformed_events() {
        for raw in [
            "",
            "not json",
            "{}",
            r#"{"data":{}}"#,
            r#"{"data":{"proposal_slot":"x","parent_block_hash":"0x01","proposer_index":"1"}}"#,
            r#"{"data":{"proposal_slot":"1","proposer_index":"1"}}"#,
        ] {
            assert!(matches!(SlotEvent::from_raw(raw), Err(Error::MalformedEvent(..))), "{raw}");
        }
    }

    #[test]
    fn test_events_url() {
        let beacon_node = Url::parse("http://localhost:5052").unwrap();
        let url = events_url(&beacon_node).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5052/eth/v1/events?topics=payload_attributes");

        let beacon_node = Url::parse("https://node.example.com/beacon/").unwrap();
        let url = events_url(&beacon_node).unwrap();
        assert_eq!(
            url.as_str(),
            "https://node.example.com/beacon/eth/v1/events?topics=payload_attributes"
        );
    }
}
