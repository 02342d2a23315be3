use std::{future::Future, sync::Arc};

use bytes::Bytes;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};

use crate::{
    config::LoaderConfig,
    error::{NostreamError, NostreamResult},
    segment::MediaSegment,
    util::http::HttpClient,
};

/// Retrieves the payload of one segment.
///
/// A segment that is gone for good must be reported as
/// [`NostreamError::SegmentUnavailable`], every other error is retried on a
/// later drain pass.
pub trait SegmentFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        segment: &MediaSegment,
    ) -> impl Future<Output = NostreamResult<Bytes>> + Send;
}

impl<F> SegmentFetcher for Arc<F>
where
    F: SegmentFetcher,
{
    fn fetch(
        &self,
        segment: &MediaSegment,
    ) -> impl Future<Output = NostreamResult<Bytes>> + Send {
        self.as_ref().fetch(segment)
    }
}

#[derive(Clone, Default)]
pub struct HttpSegmentFetcher {
    client: HttpClient,
    verify_hash: bool,
}

impl HttpSegmentFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            verify_hash: false,
        }
    }

    pub fn from_config(config: &LoaderConfig) -> NostreamResult<Self> {
        Ok(Self::new(HttpClient::from_config(config)?).with_verify_hash(config.verify_hash))
    }

    pub fn with_verify_hash(mut self, verify_hash: bool) -> Self {
        self.verify_hash = verify_hash;
        self
    }
}

impl SegmentFetcher for HttpSegmentFetcher {
    fn fetch(
        &self,
        segment: &MediaSegment,
    ) -> impl Future<Output = NostreamResult<Bytes>> + Send {
        let client = self.client.clone();
        let url = segment.url.clone();
        let expected = self.verify_hash.then(|| segment.content_hash.clone());
        async move {
            let response = client.get(url.clone()).send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(NostreamError::SegmentUnavailable(url));
            }
            if !status.is_success() {
                if let Ok(body) = response.text().await {
                    tracing::debug!("Error body: {body}");
                }
                return Err(NostreamError::HttpError(status));
            }

            let bytes = response.bytes().await?;
            if let Some(expected) = expected {
                verify_content_hash(&bytes, &expected)?;
            }
            Ok(bytes)
        }
    }
}

pub fn verify_content_hash(data: &[u8], expected: &str) -> NostreamResult<()> {
    let actual = hex::encode(Sha256::digest(data));
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(NostreamError::HashMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
