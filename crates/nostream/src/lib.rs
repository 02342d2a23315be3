//! Plays a Nostr live stream published as NIP-94 file header events.
//!
//! A [`SegmentLoader`] subscribes to the file headers referencing a stream,
//! keeps an index of the announced segments and fetches them one by one,
//! oldest first, handing every payload to a [`LoaderSink`] with its position
//! in one contiguous byte stream.
//!
//! ```text
//! ┌──────────────────────┐                ┌────────────────────┐
//! │                      │    update 1    │                    │
//! │                      ├────────────────►                    ├───┐
//! │                      │                │                    │   │ drain pass
//! │  SegmentSubscriber   │    update 2    │   SegmentLoader    ◄───┘
//! │                      ├────────────────►                    │
//! │      [MPSC]          │                │   [SegmentIndex]   ├──────► LoaderSink
//! │                      │      ...       │                    │
//! │                      ├────────────────►                    │
//! └──────────────────────┘                └────────────────────┘
//! ```

pub mod config;
pub mod drain;
pub mod error;
pub mod event;
pub mod fetch;
pub mod filter;
pub mod index;
pub mod loader;
pub mod reference;
pub mod segment;
pub mod sink;
pub mod subscription;
mod util;

pub use bytes::Bytes;
pub use config::LoaderConfig;
pub use error::{NostreamError, NostreamResult};
pub use event::{FileHeaderEvent, FILE_HEADER_KIND};
pub use fetch::{HttpSegmentFetcher, SegmentFetcher};
pub use filter::SubscriptionFilter;
pub use index::SegmentIndex;
pub use loader::{LoaderStatus, SegmentLoader};
pub use reference::StreamReference;
pub use segment::MediaSegment;
pub use sink::{ChannelSink, LoaderErrorInfo, LoaderErrorKind, LoaderSink, SinkEvent};
pub use subscription::{
    ChannelSubscriber, JsonLinesSubscriber, SegmentSubscriber, SubscriptionReceiver,
    SubscriptionSender,
};
pub use util::http::HttpClient;
