//! The most recent failure per encoder, for the "encoder has error" feedback.

use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderError {
    pub encoder_id: String,
    pub message: String,
}

/// At most one entry per encoder; recording again overwrites the message.
#[derive(Debug, Default)]
pub struct EncoderErrors {
    entries: Mutex<BTreeMap<String, String>>,
}

impl EncoderErrors {
    pub async fn record(&self, encoder_id: &str, message: impl Into<String>) {
        self.entries
            .lock()
            .await
            .insert(encoder_id.to_string(), message.into());
    }

    /// Returns whether there was an entry to clear.
    pub async fn clear(&self, encoder_id: &str) -> bool {
        self.entries.lock().await.remove(encoder_id).is_some()
    }

    pub async fn get(&self, encoder_id: &str) -> Option<String> {
        self.entries.lock().await.get(encoder_id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<EncoderError> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(encoder_id, message)| EncoderError {
                encoder_id: encoder_id.clone(),
                message: message.clone(),
            })
            .collect()
    }
}
