use std::{fmt, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::LoaderConfig,
    drain::{drain_pass, DrainReport, StreamCursor},
    error::{NostreamError, NostreamResult},
    event::FileHeaderEvent,
    fetch::{HttpSegmentFetcher, SegmentFetcher},
    filter::SubscriptionFilter,
    index::SegmentIndex,
    reference::StreamReference,
    segment::MediaSegment,
    sink::{LoaderErrorInfo, LoaderErrorKind, LoaderSink},
    subscription::{SegmentSubscriber, SubscriptionReceiver},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStatus {
    /// Not opened yet, or every known segment has been drained.
    Idle,
    /// Subscribed, no update received yet.
    Connecting,
    /// A drain pass is running.
    Buffering,
    /// Aborted, or the subscription ended and everything was drained.
    Complete,
    Error,
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Buffering => "buffering",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Feeds a media player from the file header events of one stream.
///
/// ```text
///  subscription ──batch──► index ──pending, oldest first──► drain pass ──► sink
///        ▲                   ▲                                   │
///        └── abort()         └──────── loaded / failed ──────────┘
/// ```
///
/// One driver task owns the index and runs at most one drain pass at a
/// time. Updates arriving during a pass are merged right away and picked up
/// by the following pass.
pub struct SegmentLoader<Sub, F, S>
where
    Sub: SegmentSubscriber,
    F: SegmentFetcher,
    S: LoaderSink,
{
    subscriber: Sub,
    fetcher: Arc<F>,
    sink: Arc<S>,
    config: LoaderConfig,

    status: Arc<watch::Sender<LoaderStatus>>,
    cancel: CancellationToken,
    opened: bool,
    driver: Option<JoinHandle<()>>,
}

impl<Sub, S> SegmentLoader<Sub, HttpSegmentFetcher, S>
where
    Sub: SegmentSubscriber,
    S: LoaderSink,
{
    /// A loader fetching segments over HTTP as described by `config`.
    pub fn http(subscriber: Sub, sink: S, config: LoaderConfig) -> NostreamResult<Self> {
        let fetcher = HttpSegmentFetcher::from_config(&config)?;
        Ok(Self::new(subscriber, fetcher, sink, config))
    }
}

impl<Sub, F, S> SegmentLoader<Sub, F, S>
where
    Sub: SegmentSubscriber,
    F: SegmentFetcher,
    S: LoaderSink,
{
    pub fn new(subscriber: Sub, fetcher: F, sink: S, config: LoaderConfig) -> Self {
        let (status, _) = watch::channel(LoaderStatus::Idle);
        Self {
            subscriber,
            fetcher: Arc::new(fetcher),
            sink: Arc::new(sink),
            config,
            status: Arc::new(status),
            cancel: CancellationToken::new(),
            opened: false,
            driver: None,
        }
    }

    pub fn status(&self) -> LoaderStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LoaderStatus> {
        self.status.subscribe()
    }

    /// Start streaming `source`.
    ///
    /// Returns once the subscription is issued, fetching happens in the
    /// background. Must be called from within a tokio runtime.
    pub fn open(&mut self, source: &str) -> NostreamResult<()> {
        if self.opened || self.cancel.is_cancelled() {
            return Err(NostreamError::Configuration(
                "loader can only be opened once".to_string(),
            ));
        }

        let reference: StreamReference = source.parse()?;
        let filter = SubscriptionFilter::for_stream(&reference, self.config.batch_limit);
        let receiver = self.subscriber.subscribe(filter)?;
        tracing::info!("Subscribed to file headers of {reference}.");

        let index = match &self.config.variant {
            Some(variant) => SegmentIndex::with_variant(variant.clone()),
            None => SegmentIndex::new(),
        };
        self.status.send_replace(LoaderStatus::Connecting);
        self.opened = true;

        let driver = Driver {
            index,
            cursor: StreamCursor::default(),
            fetcher: self.fetcher.clone(),
            sink: self.sink.clone(),
            status: self.status.clone(),
            cancel: self.cancel.clone(),
            max_attempts: self.config.max_attempts,
        };
        self.driver = Some(tokio::spawn(driver.run(receiver)));
        Ok(())
    }

    /// Stop requesting segments. A fetch already in flight may still be delivered.
    pub fn abort(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::info!("Aborting loader.");
        self.cancel.cancel();
        if !self.opened {
            self.status.send_replace(LoaderStatus::Complete);
        }
    }

    /// Wait until the loader has stopped, either by `abort`, by the end of
    /// the subscription or by an error.
    pub async fn finished(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.await {
                tracing::error!("Loader task failed: {e}");
                self.status.send_replace(LoaderStatus::Error);
            }
            self.driver = None;
        }
    }
}

impl<Sub, F, S> Drop for SegmentLoader<Sub, F, S>
where
    Sub: SegmentSubscriber,
    F: SegmentFetcher,
    S: LoaderSink,
{
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Driver<F, S> {
    index: SegmentIndex,
    cursor: StreamCursor,
    fetcher: Arc<F>,
    sink: Arc<S>,
    status: Arc<watch::Sender<LoaderStatus>>,
    cancel: CancellationToken,
    max_attempts: Option<u32>,
}

impl<F, S> Driver<F, S>
where
    F: SegmentFetcher,
    S: LoaderSink,
{
    fn set_status(&self, status: LoaderStatus) {
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            if changed {
                tracing::debug!("Loader status {current} -> {status}.");
                *current = status;
            }
            changed
        });
    }

    async fn run(mut self, receiver: SubscriptionReceiver) {
        let cancel = self.cancel.clone();
        let mut receiver = Some(receiver);
        let mut pass: Option<BoxFuture<'static, DrainReport>> = None;
        // a batch arrived since the current pass took its snapshot
        let mut rerun = false;
        let mut updated = false;
        let mut fatal: Option<String> = None;

        loop {
            if pass.is_none() && rerun && !cancel.is_cancelled() {
                rerun = false;
                pass = self.start_pass();
            }
            if pass.is_none() {
                if receiver.is_none() {
                    break;
                }
                if updated {
                    self.set_status(LoaderStatus::Idle);
                }
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if receiver.is_some() => {
                    // dropping the receiver cancels the subscription
                    receiver = None;
                    rerun = false;
                }
                report = async {
                    match pass.as_mut() {
                        Some(pass) => pass.await,
                        None => std::future::pending().await,
                    }
                }, if pass.is_some() => {
                    pass = None;
                    self.apply(report);
                }
                update = async {
                    match receiver.as_mut() {
                        Some(receiver) => receiver.recv().await,
                        None => std::future::pending().await,
                    }
                }, if receiver.is_some() => match update {
                    Some(Ok(events)) => {
                        if events.is_empty() {
                            continue;
                        }
                        updated = true;
                        rerun = true;
                        self.merge(&events);
                    }
                    Some(Err(e)) => {
                        tracing::error!("Subscription failed: {e}");
                        fatal = Some(e.to_string());
                        receiver = None;
                        rerun = false;
                        cancel.cancel();
                    }
                    None => {
                        tracing::info!("Subscription closed.");
                        receiver = None;
                    }
                },
            }
        }

        if let Some(msg) = fatal {
            self.set_status(LoaderStatus::Error);
            self.sink
                .on_error(LoaderErrorKind::Subscription, LoaderErrorInfo::new(msg));
        } else if cancel.is_cancelled() {
            self.set_status(LoaderStatus::Complete);
        } else if self.index.is_empty() {
            tracing::error!("Subscription ended before any segment was announced.");
            self.set_status(LoaderStatus::Error);
            self.sink.on_error(
                LoaderErrorKind::EarlyEof,
                LoaderErrorInfo::new("no segment was announced"),
            );
        } else {
            tracing::info!(
                "Stream complete, {} bytes delivered.",
                self.cursor.byte_offset
            );
            self.set_status(LoaderStatus::Complete);
            self.sink.on_complete(self.cursor.byte_offset);
        }
    }

    fn merge(&mut self, events: &[FileHeaderEvent]) {
        let segments = events
            .iter()
            .filter_map(|event| match MediaSegment::from_event(event) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    tracing::warn!("Ignoring file header {}: {e}", event.id);
                    None
                }
            })
            .collect::<Vec<_>>();
        let added = self.index.merge_all(segments);
        tracing::debug!(
            "{added} new segment(s) from {} event(s), {} known.",
            events.len(),
            self.index.len()
        );
    }

    fn start_pass(&mut self) -> Option<BoxFuture<'static, DrainReport>> {
        let pending = self.index.pending();
        if pending.is_empty() {
            return None;
        }

        tracing::info!("{} segment(s) pending, start draining.", pending.len());
        self.set_status(LoaderStatus::Buffering);

        let fetcher = self.fetcher.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        let cursor = self.cursor;
        Some(
            async move { drain_pass(pending, &*fetcher, &*sink, cursor, &cancel).await }
                .boxed(),
        )
    }

    fn apply(&mut self, report: DrainReport) {
        self.cursor = report.cursor;
        for hash in &report.loaded {
            self.index.mark_loaded(hash);
        }
        for hash in &report.failed {
            let attempts = self.index.record_failure(hash);
            if let Some(max_attempts) = self.max_attempts {
                if attempts >= max_attempts {
                    tracing::error!(
                        "Segment {hash} failed {attempts} time(s), max attempts exceed, drop."
                    );
                    self.index.mark_loaded(hash);
                }
            }
        }

        tracing::info!(
            "Drain pass finished: {} delivered, {} unavailable, {} failed.",
            report.delivered,
            report.unavailable,
            report.failed.len()
        );
    }
}
