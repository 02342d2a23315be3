use serde::{Deserialize, Serialize};

use crate::{
    event::{FileHeaderEvent, FILE_HEADER_KIND},
    reference::StreamReference,
};

/// A NIP-01 filter, limited to the fields a segment subscription uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,
    #[serde(rename = "#a", default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(rename = "#e", default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SubscriptionFilter {
    /// File headers referencing `reference`, newest first, at most `limit` per update.
    ///
    /// A zero limit is raised to one.
    pub fn for_stream(reference: &StreamReference, limit: usize) -> Self {
        let mut filter = Self {
            kinds: vec![FILE_HEADER_KIND],
            limit: Some(limit.max(1)),
            ..Default::default()
        };
        match reference {
            StreamReference::Address { .. } => filter.addresses.push(reference.to_string()),
            StreamReference::Event { id } => filter.events.push(id.clone()),
        }
        filter
    }

    pub fn matches(&self, event: &FileHeaderEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.addresses.is_empty()
            && !event.tag_values("a").any(|a| self.addresses.iter().any(|x| x == a))
        {
            return false;
        }
        if !self.events.is_empty()
            && !event.tag_values("e").any(|e| self.events.iter().any(|x| x == e))
        {
            return false;
        }
        true
    }

    /// The `["REQ", <id>, <filter>]` frame a relay expects.
    pub fn to_request(&self, subscription_id: &str) -> serde_json::Result<String> {
        serde_json::to_string(&("REQ", subscription_id, self))
    }
}
