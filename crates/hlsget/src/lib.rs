pub mod decrypt;
pub mod directive;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod playlist;
pub mod resolve;
pub mod util;

pub use decrypt::{resolve_key, CounterIv, EncryptionContext, IvSource, MediaSequenceIv};
pub use download::SequentialDownloader;
pub use error::{HlsError, HlsResult};
pub use pipeline::{SegmentPipeline, SegmentProgress};
pub use playlist::Playlist;
pub use resolve::resolve;
pub use util::http::HttpClient;
