use serde::{Deserialize, Serialize};

/// Event published on the `com.example.event` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub producer_id: String,
    pub id: String,
    #[serde(default)]
    pub other_ids: Vec<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
}

impl PubSubEvent {
    pub fn new(producer_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: "com.example.event".to_string(),
            producer_id: producer_id.into(),
            id: id.into(),
            other_ids: Vec::new(),
            time: None,
            run: None,
        }
    }
}
