use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{error::HlsResult, pipeline::SegmentPipeline};

/// Invoked once per segment with `(current, total)`.
pub type ProgressObserver = Box<dyn FnMut(usize, usize) + Send>;

/// Drains a [`SegmentPipeline`] into a writer it exclusively owns,
/// appending segments strictly in playlist order and flushing after each
/// one.
pub struct SequentialDownloader<W> {
    pipeline: SegmentPipeline,
    writer: W,
    on_progress: Option<ProgressObserver>,
}

impl<W> SequentialDownloader<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(pipeline: SegmentPipeline, writer: W) -> Self {
        Self {
            pipeline,
            writer,
            on_progress: None,
        }
    }

    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Runs the download to completion and returns the number of bytes
    /// written.
    pub async fn download(mut self) -> HlsResult<u64> {
        let mut written = 0;
        while let Some(progress) = self.pipeline.next_segment().await? {
            self.writer.write_all(&progress.bytes).await?;
            self.writer.flush().await?;
            written += progress.bytes.len() as u64;

            if let Some(on_progress) = self.on_progress.as_mut() {
                on_progress(progress.current, progress.total);
            }
        }
        self.writer.shutdown().await?;
        Ok(written)
    }
}
