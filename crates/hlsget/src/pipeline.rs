use std::{num::NonZeroU32, sync::Arc};

use bytes::Bytes;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    decrypt::{CounterIv, EncryptionContext, IvSource},
    error::{HlsError, HlsResult},
    playlist::{MediaSegment, Playlist},
    util::http::HttpClient,
};

/// One downloaded segment, emitted in playlist order. `current` is
/// 1-indexed; `total` is known upfront.
#[derive(Debug, Clone)]
pub struct SegmentProgress {
    pub bytes: Bytes,
    pub current: usize,
    pub total: usize,
}

/// Sequentially fetches, decrypts and emits the segments of a media
/// playlist. Lazy, finite and non-restartable: each call to
/// [`next_segment`](SegmentPipeline::next_segment) handles exactly one
/// segment, and no two segments are ever in flight at once.
pub struct SegmentPipeline {
    client: HttpClient,
    playlist_url: Url,
    segments: Vec<MediaSegment>,
    encryption: Option<EncryptionContext>,
    iv_source: Arc<dyn IvSource>,
    media_sequence: u64,
    max_attempts: Option<NonZeroU32>,
    cancel: CancellationToken,
    next: usize,
}

impl SegmentPipeline {
    pub fn new(
        client: HttpClient,
        playlist_url: Url,
        playlist: Playlist,
        encryption: Option<EncryptionContext>,
    ) -> Self {
        let media_sequence = playlist.media_sequence();
        Self {
            client,
            playlist_url,
            segments: playlist.segments,
            encryption,
            iv_source: Arc::new(CounterIv),
            media_sequence,
            max_attempts: None,
            cancel: CancellationToken::new(),
            next: 0,
        }
    }

    pub fn with_iv_source(mut self, iv_source: Arc<dyn IvSource>) -> Self {
        self.iv_source = iv_source;
        self
    }

    /// Bounds the per-segment retry loop. `None` retries forever, the
    /// default: a segment is never skipped or emitted partially.
    pub fn with_max_attempts(mut self, max_attempts: Option<NonZeroU32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn total(&self) -> usize {
        self.segments.len()
    }

    /// Fetches, decrypts and returns the next segment, or `None` once the
    /// playlist is exhausted.
    pub async fn next_segment(&mut self) -> HlsResult<Option<SegmentProgress>> {
        let index = self.next;
        let Some(segment) = self.segments.get(index) else {
            return Ok(None);
        };

        let url = self.playlist_url.join(&segment.url)?;
        let bytes = self.fetch_with_retry(&url).await?;
        let bytes = match &self.encryption {
            Some(context) => Bytes::from(context.decrypt(
                &bytes,
                self.iv_source.as_ref(),
                self.media_sequence + index as u64,
            )?),
            None => bytes,
        };

        self.next += 1;
        Ok(Some(SegmentProgress {
            bytes,
            current: index + 1,
            total: self.segments.len(),
        }))
    }

    async fn fetch_with_retry(&self, url: &Url) -> HlsResult<Bytes> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.client.fetch_bytes(url.clone(), &self.cancel).await {
                Ok(bytes) => return Ok(bytes),
                Err(HlsError::Canceled) => return Err(HlsError::Canceled),
                Err(error) => {
                    if let Some(max_attempts) = self.max_attempts {
                        if attempts >= max_attempts.get() {
                            log::error!(
                                "Segment fetch failed after {attempts} attempts: {error}"
                            );
                            return Err(HlsError::RetriesExhausted { attempts });
                        }
                    }
                    log::warn!("Segment fetch failed due to {error:?}, retrying.");
                }
            }
        }
    }
}
