use aes::cipher::block_padding::UnpadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HlsError {
    #[error("Unexpected redeclaration in existing declaration at line {0}")]
    UnexpectedRedeclaration(usize),

    #[error("Unexpected declaration after ENDLIST at line {0}")]
    DeclarationAfterEndList(usize),

    #[error("Invalid segment duration {value:?} at line {line}")]
    InvalidDuration { line: usize, value: String },

    #[error("Truncated declaration at end of playlist")]
    TruncatedDeclaration,

    #[error("Playlist has neither streams nor segments")]
    NoSegments,

    #[error("Unsupported encryption method: {0}")]
    UnsupportedEncryption(String),

    #[error("Invalid AES-128 key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("Segment fetch failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Download canceled")]
    Canceled,

    #[error("Pkcs7 unpad error")]
    UnpadError(#[from] UnpadError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}

pub type HlsResult<T> = Result<T, HlsError>;
