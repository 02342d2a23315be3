use tokio_util::sync::CancellationToken;

use crate::{
    error::NostreamError, fetch::SegmentFetcher, segment::MediaSegment, sink::LoaderSink,
};

/// Position of a loader in its output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCursor {
    /// Bytes delivered so far, the offset of the next chunk.
    pub byte_offset: u64,
    /// Newest `created_at` delivered so far.
    pub newest_created_at: Option<u64>,
}

/// Outcome of one drain pass, applied back to the index by the caller.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub cursor: StreamCursor,
    /// Delivered or permanently unavailable.
    pub loaded: Vec<String>,
    /// Transient failures, still pending.
    pub failed: Vec<String>,
    pub delivered: usize,
    pub unavailable: usize,
    /// The pass stopped early because the loader was aborted.
    pub cancelled: bool,
}

/// Fetch `pending` one after another and hand every payload to `sink`.
///
/// `pending` must already be ordered by `created_at`; offsets handed to the
/// sink follow that order. Cancellation is checked between segments only, a
/// fetch in flight always runs to completion.
pub async fn drain_pass<F, S>(
    pending: Vec<MediaSegment>,
    fetcher: &F,
    sink: &S,
    cursor: StreamCursor,
    cancel: &CancellationToken,
) -> DrainReport
where
    F: SegmentFetcher,
    S: LoaderSink,
{
    let mut report = DrainReport {
        cursor,
        ..Default::default()
    };

    for segment in pending {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let hash = segment.content_hash.clone();
        match fetcher.fetch(&segment).await {
            Ok(chunk) => {
                if let Some(newest) = report.cursor.newest_created_at {
                    if segment.created_at < newest {
                        tracing::warn!(
                            "Segment {hash} is older than already delivered data ({} < {newest}), stream may be corrupted.",
                            segment.created_at
                        );
                    }
                }

                let length = chunk.len() as u64;
                let offset = report.cursor.byte_offset;
                tracing::debug!("Segment {hash} loaded, bytes {offset}..{}", offset + length);
                sink.on_data_arrival(chunk, offset, length);

                report.cursor.byte_offset += length;
                report.cursor.newest_created_at = Some(
                    report
                        .cursor
                        .newest_created_at
                        .map_or(segment.created_at, |n| n.max(segment.created_at)),
                );
                report.delivered += 1;
                report.loaded.push(hash);
            }
            Err(NostreamError::SegmentUnavailable(url)) => {
                tracing::warn!("Segment {hash} not found at {url}, skipping.");
                report.unavailable += 1;
                report.loaded.push(hash);
            }
            Err(e) if !e.is_transient() => {
                tracing::warn!("Segment {hash} can not be loaded, skipping. {e}");
                report.unavailable += 1;
                report.loaded.push(hash);
            }
            Err(e) => {
                tracing::warn!("Failed to load segment {hash}, retry later. {e}");
                report.failed.push(hash);
            }
        }
    }

    report
}
