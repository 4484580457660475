//! Notification channel description.

use serde::{Deserialize, Serialize};

/// Out-of-band channel that fans events out to a recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub topic: String,
    pub display_name: String,
    pub recipients: Vec<String>,
}

impl NotificationChannel {
    pub fn new(topic: impl Into<String>, recipients: Vec<String>) -> Self {
        let topic = topic.into();
        Self {
            display_name: topic.clone(),
            topic,
            recipients,
        }
    }
}
