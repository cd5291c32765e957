//! NATS subject subscriber as an upstream [`EventSource`].
//!
//! Each NATS message carries one JSON-encoded [`StreamMessage`] in its
//! payload. Ordering and duplicate detection are left to the ingestor:
//! redelivery of anything still inside the reorg window is ignored, while
//! redelivery from pruned history halts ingestion.

use futures::StreamExt as _;
use tracing::info;
use vault_ingest::{EventSource, SourceError};
use vault_types::StreamMessage;

/// Upstream source reading stream messages from a NATS subject.
pub struct NatsSource {
    subject: String,
    subscriber: async_nats::Subscriber,
}

impl NatsSource {
    /// Connect to a NATS server and subscribe to `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] if the connection or
    /// subscription fails.
    pub async fn connect(url: &str, subject: &str) -> Result<Self, SourceError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| SourceError::Transport {
                message: format!("failed to connect to NATS at {url}: {e}"),
            })?;
        let subscriber = client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| SourceError::Transport {
                message: format!("failed to subscribe to {subject}: {e}"),
            })?;
        info!(%url, %subject, "subscribed to upstream event subject");
        Ok(Self {
            subject: subject.to_owned(),
            subscriber,
        })
    }
}

/// Decode one NATS payload.
pub fn decode_payload(subject: &str, payload: &[u8]) -> Result<StreamMessage, SourceError> {
    serde_json::from_slice(payload).map_err(|source| SourceError::Decode {
        location: format!("nats subject {subject}"),
        source,
    })
}

impl EventSource for NatsSource {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, SourceError> {
        match self.subscriber.next().await {
            Some(message) => decode_payload(&self.subject, &message.payload).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reorg_payload() {
        let msg = decode_payload("vault.events", br#"{"kind":"reorg","from_height":42}"#).unwrap();
        assert_eq!(msg, StreamMessage::Reorg { from_height: 42 });
    }

    #[test]
    fn bad_payload_names_subject() {
        let err = decode_payload("vault.events", b"not json").unwrap_err();
        assert!(err.to_string().contains("vault.events"));
    }
}
