use std::collections::HashMap;

use crate::segment::MediaSegment;

/// Segments seen for one opened stream, keyed by content hash.
#[derive(Debug, Default)]
pub struct SegmentIndex {
    segments: HashMap<String, MediaSegment>,
    variant: Option<String>,
}

impl SegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that only ever streams `variant`.
    pub fn with_variant(variant: impl Into<String>) -> Self {
        Self {
            segments: HashMap::new(),
            variant: Some(variant.into()),
        }
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, content_hash: &str) -> Option<&MediaSegment> {
        self.segments.get(content_hash)
    }

    /// Insert a segment unless its hash is already known.
    ///
    /// Returns whether the segment was new. The first segment ever merged
    /// fixes the streaming variant if none was configured.
    pub fn merge(&mut self, segment: MediaSegment) -> bool {
        if self.segments.contains_key(&segment.content_hash) {
            tracing::trace!("Duplicate segment {} ignored.", segment.content_hash);
            return false;
        }

        if self.variant.is_none() {
            tracing::info!("Streaming variant {:?}.", segment.variant);
            self.variant = Some(segment.variant.clone());
        }
        self.segments.insert(segment.content_hash.clone(), segment);
        true
    }

    /// Merge a batch, returning how many segments were new.
    pub fn merge_all(&mut self, segments: impl IntoIterator<Item = MediaSegment>) -> usize {
        segments
            .into_iter()
            .map(|segment| self.merge(segment))
            .filter(|added| *added)
            .count()
    }

    /// Unloaded segments of the streaming variant, oldest first.
    pub fn pending(&self) -> Vec<MediaSegment> {
        let Some(variant) = self.variant.as_deref() else {
            return Vec::new();
        };

        let mut pending: Vec<_> = self
            .segments
            .values()
            .filter(|s| !s.loaded && s.variant == variant)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });
        pending
    }

    pub fn mark_loaded(&mut self, content_hash: &str) {
        if let Some(segment) = self.segments.get_mut(content_hash) {
            segment.loaded = true;
        }
    }

    /// Count a failed attempt, returning the new total.
    pub fn record_failure(&mut self, content_hash: &str) -> u32 {
        match self.segments.get_mut(content_hash) {
            Some(segment) => {
                segment.attempts += 1;
                segment.attempts
            }
            None => 0,
        }
    }
}
