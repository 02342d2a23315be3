use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};

use crate::{
    config::DEFAULT_BATCH_LIMIT,
    error::{NostreamError, NostreamResult},
    event::FileHeaderEvent,
    filter::SubscriptionFilter,
};

pub type SubscriptionSender = mpsc::UnboundedSender<NostreamResult<Vec<FileHeaderEvent>>>;
pub type SubscriptionReceiver = mpsc::UnboundedReceiver<NostreamResult<Vec<FileHeaderEvent>>>;

/// A persistent query for file header events.
///
/// Every item of the returned channel is one update from the relay side.
/// Dropping the receiver cancels the subscription; the channel closing
/// means no more updates will follow.
pub trait SegmentSubscriber: Send + Sync + 'static {
    fn subscribe(&self, filter: SubscriptionFilter) -> NostreamResult<SubscriptionReceiver>;
}

impl<S> SegmentSubscriber for Arc<S>
where
    S: SegmentSubscriber,
{
    fn subscribe(&self, filter: SubscriptionFilter) -> NostreamResult<SubscriptionReceiver> {
        self.as_ref().subscribe(filter)
    }
}

/// Subscription fed by hand through the paired [`SubscriptionSender`].
///
/// Events are passed through untouched, filtering is left to whoever sends them.
pub struct ChannelSubscriber {
    receiver: Mutex<Option<SubscriptionReceiver>>,
    filter: Mutex<Option<SubscriptionFilter>>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, SubscriptionSender) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Self {
            receiver: Mutex::new(Some(receiver)),
            filter: Mutex::new(None),
        };
        (subscriber, sender)
    }

    /// The filter the subscription was opened with.
    pub fn filter(&self) -> Option<SubscriptionFilter> {
        self.filter.lock().ok().and_then(|f| f.clone())
    }
}

impl SegmentSubscriber for ChannelSubscriber {
    fn subscribe(&self, filter: SubscriptionFilter) -> NostreamResult<SubscriptionReceiver> {
        let receiver = self
            .receiver
            .lock()
            .ok()
            .and_then(|mut r| r.take())
            .ok_or_else(|| NostreamError::Subscription("already subscribed".to_string()))?;
        if let Ok(mut f) = self.filter.lock() {
            *f = Some(filter);
        }
        Ok(receiver)
    }
}

/// Subscription over relay output, one JSON document per line.
///
/// A line is either a bare event or a relay frame such as
/// `["EVENT", <sub>, <event>]` or `["EOSE", <sub>]`. Events that do not
/// match the filter are dropped.
pub struct JsonLinesSubscriber<R> {
    reader: Mutex<Option<R>>,
}

impl<R> JsonLinesSubscriber<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

impl<R> SegmentSubscriber for JsonLinesSubscriber<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn subscribe(&self, filter: SubscriptionFilter) -> NostreamResult<SubscriptionReceiver> {
        let reader = self
            .reader
            .lock()
            .ok()
            .and_then(|mut r| r.take())
            .ok_or_else(|| NostreamError::Subscription("already subscribed".to_string()))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(pump_lines(BufReader::new(reader), filter, sender));
        Ok(receiver)
    }
}

#[derive(Debug)]
enum RelayLine {
    Event(FileHeaderEvent),
    EndOfStoredEvents,
    Other,
}

fn parse_line(line: &str) -> NostreamResult<RelayLine> {
    let value: Value = serde_json::from_str(line)?;
    match value {
        Value::Object(_) => Ok(RelayLine::Event(serde_json::from_value(value)?)),
        Value::Array(frame) => {
            let label = frame.first().and_then(Value::as_str).map(str::to_owned);
            match label.as_deref() {
                Some("EVENT") => {
                    let event = frame.into_iter().nth(2).ok_or_else(|| {
                        NostreamError::InvalidEvent("EVENT frame without event".to_string())
                    })?;
                    Ok(RelayLine::Event(serde_json::from_value(event)?))
                }
                Some("EOSE") => Ok(RelayLine::EndOfStoredEvents),
                _ => Ok(RelayLine::Other),
            }
        }
        _ => Err(NostreamError::InvalidEvent(format!(
            "unexpected line {line:?}"
        ))),
    }
}

async fn pump_lines<R>(
    mut reader: BufReader<R>,
    filter: SubscriptionFilter,
    sender: SubscriptionSender,
) where
    R: AsyncRead + Unpin,
{
    let limit = filter.limit.unwrap_or(DEFAULT_BATCH_LIMIT).max(1);
    let mut batch = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                if flush(&mut batch, &sender) {
                    _ = sender.send(Err(e.into()));
                }
                return;
            }
        }

        let trimmed = match std::str::from_utf8(&line) {
            Ok(text) => text.trim(),
            Err(e) => {
                tracing::warn!("Skipping line that is not UTF-8: {e}");
                ""
            }
        };
        if !trimmed.is_empty() {
            match parse_line(trimmed) {
                Ok(RelayLine::Event(event)) if filter.matches(&event) => batch.push(event),
                Ok(RelayLine::Event(event)) => {
                    tracing::trace!("Event {} does not match the filter.", event.id);
                }
                Ok(RelayLine::EndOfStoredEvents) => {
                    if !flush(&mut batch, &sender) {
                        return;
                    }
                }
                Ok(RelayLine::Other) => {}
                Err(e) => tracing::warn!("Skipping malformed line: {e}"),
            }
        }

        if (batch.len() >= limit || reader.buffer().is_empty()) && !flush(&mut batch, &sender) {
            return;
        }
    }

    flush(&mut batch, &sender);
}

/// Send the pending batch, returns false once nobody listens anymore.
fn flush(batch: &mut Vec<FileHeaderEvent>, sender: &SubscriptionSender) -> bool {
    if batch.is_empty() {
        return true;
    }
    if sender.send(Ok(std::mem::take(batch))).is_err() {
        tracing::debug!("Subscription dropped, stop reading.");
        return false;
    }
    true
}
