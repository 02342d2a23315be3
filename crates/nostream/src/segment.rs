use url::Url;

use crate::{
    error::{NostreamError, NostreamResult},
    event::{FileHeaderEvent, FILE_HEADER_KIND},
};

/// One media segment announced by a file header event.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub created_at: u64,
    /// Lowercase hex digest from the `x` tag, the index key.
    pub content_hash: String,
    pub url: Url,
    pub duration_hint: Option<f32>,
    /// Rendition label from the `d` tag, empty when absent.
    pub variant: String,
    pub loaded: bool,
    /// Failed transient fetches so far.
    pub attempts: u32,
}

impl MediaSegment {
    pub fn new(created_at: u64, content_hash: impl Into<String>, url: Url) -> Self {
        Self {
            created_at,
            content_hash: content_hash.into().to_ascii_lowercase(),
            url,
            duration_hint: None,
            variant: String::new(),
            loaded: false,
            attempts: 0,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn from_event(event: &FileHeaderEvent) -> NostreamResult<Self> {
        if event.kind != FILE_HEADER_KIND {
            return Err(NostreamError::InvalidEvent(format!(
                "unexpected kind {}",
                event.kind
            )));
        }

        let url = event
            .tag_value("url")
            .ok_or_else(|| NostreamError::InvalidEvent("missing url tag".to_string()))?;
        let url = Url::parse(url)?;

        let hash = event
            .tag_value("x")
            .ok_or_else(|| NostreamError::InvalidEvent("missing x tag".to_string()))?;
        if hash.is_empty() {
            return Err(NostreamError::InvalidEvent("empty x tag".to_string()));
        }
        hex::decode(hash)?;

        let mut segment = Self::new(event.created_at, hash, url)
            .with_variant(event.tag_value("d").unwrap_or_default());
        segment.duration_hint = event
            .tag_value("duration")
            .and_then(|d| d.parse::<f32>().ok());
        Ok(segment)
    }
}

impl TryFrom<&FileHeaderEvent> for MediaSegment {
    type Error = NostreamError;

    fn try_from(event: &FileHeaderEvent) -> Result<Self, Self::Error> {
        Self::from_event(event)
    }
}
