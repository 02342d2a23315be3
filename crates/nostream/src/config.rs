use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Upper bound of events requested per subscription update.
    pub batch_limit: usize,
    /// Stream this rendition instead of the first one seen.
    pub variant: Option<String>,
    /// Give up on a segment after this many failed fetches. Unset retries forever.
    pub max_attempts: Option<u32>,
    /// Check the SHA-256 of every payload against its `x` tag.
    pub verify_hash: bool,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            variant: None,
            max_attempts: None,
            verify_hash: false,
            user_agent: None,
            timeout_secs: None,
        }
    }
}
