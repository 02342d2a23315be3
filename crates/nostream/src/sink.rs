use std::{fmt, sync::Arc};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Why a loader stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderErrorKind {
    /// The file header subscription failed.
    Subscription,
    /// The subscription ended before any segment was announced.
    EarlyEof,
}

impl fmt::Display for LoaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscription => f.write_str("subscription"),
            Self::EarlyEof => f.write_str("early eof"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderErrorInfo {
    pub msg: String,
}

impl LoaderErrorInfo {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// The loader callbacks a media player consumes.
pub trait LoaderSink: Send + Sync + 'static {
    /// `chunk` covers `[byte_offset, byte_offset + byte_length)` of the stream.
    fn on_data_arrival(&self, chunk: Bytes, byte_offset: u64, byte_length: u64);

    /// The subscription ended and every pending segment was drained.
    fn on_complete(&self, _total_bytes: u64) {}

    fn on_error(&self, _kind: LoaderErrorKind, _info: LoaderErrorInfo) {}
}

impl<S> LoaderSink for Arc<S>
where
    S: LoaderSink,
{
    fn on_data_arrival(&self, chunk: Bytes, byte_offset: u64, byte_length: u64) {
        self.as_ref().on_data_arrival(chunk, byte_offset, byte_length)
    }

    fn on_complete(&self, total_bytes: u64) {
        self.as_ref().on_complete(total_bytes)
    }

    fn on_error(&self, kind: LoaderErrorKind, info: LoaderErrorInfo) {
        self.as_ref().on_error(kind, info)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Data {
        chunk: Bytes,
        byte_offset: u64,
        byte_length: u64,
    },
    Complete {
        total_bytes: u64,
    },
    Error {
        kind: LoaderErrorKind,
        info: LoaderErrorInfo,
    },
}

/// Forwards every callback into a channel.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: SinkEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Sink receiver dropped, discarding loader event.");
        }
    }
}

impl LoaderSink for ChannelSink {
    fn on_data_arrival(&self, chunk: Bytes, byte_offset: u64, byte_length: u64) {
        self.send(SinkEvent::Data {
            chunk,
            byte_offset,
            byte_length,
        });
    }

    fn on_complete(&self, total_bytes: u64) {
        self.send(SinkEvent::Complete { total_bytes });
    }

    fn on_error(&self, kind: LoaderErrorKind, info: LoaderErrorInfo) {
        self.send(SinkEvent::Error { kind, info });
    }
}
