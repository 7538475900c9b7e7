use std::sync::Mutex;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{HlsError, HlsResult},
    playlist::Playlist,
    util::http::HttpClient,
};

const AES_128: &str = "AES-128";
const METHOD_NONE: &str = "NONE";

/// Supplies the IV for segments whose key declaration carries none.
pub trait IvSource: Send + Sync {
    /// Returns 16 IV bytes for the segment with the given media sequence
    /// number.
    fn next_iv(&self, media_sequence: u64) -> [u8; 16];
}

static FALLBACK_IV_COUNTER: Mutex<u128> = Mutex::new(1);

/// A process-wide, monotonically incrementing 128-bit big-endian counter,
/// never reset per key, segment, or run. Matches the historical behavior
/// this tool replaces; the linear IV sequence is predictable, so prefer
/// [`MediaSequenceIv`] for streams that follow RFC 8216 IV derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterIv;

impl IvSource for CounterIv {
    fn next_iv(&self, _media_sequence: u64) -> [u8; 16] {
        let mut counter = FALLBACK_IV_COUNTER.lock().unwrap();
        let iv = counter.to_be_bytes();
        *counter += 1;
        iv
    }
}

/// The RFC 8216 fallback: the segment's media sequence number as a
/// big-endian 128-bit value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaSequenceIv;

impl IvSource for MediaSequenceIv {
    fn next_iv(&self, media_sequence: u64) -> [u8; 16] {
        (media_sequence as u128).to_be_bytes()
    }
}

/// Key material for one download run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionContext {
    pub key: [u8; 16],
    /// IV from the key declaration. `None` defers to the run's
    /// [`IvSource`] at decryption time.
    pub iv: Option<[u8; 16]>,
}

impl EncryptionContext {
    pub fn decrypt(
        &self,
        data: &[u8],
        iv_source: &dyn IvSource,
        media_sequence: u64,
    ) -> HlsResult<Vec<u8>> {
        let iv = self
            .iv
            .unwrap_or_else(|| iv_source.next_iv(media_sequence));
        let decryptor = cbc::Decryptor::<aes::Aes128>::new(&self.key.into(), &iv.into());
        Ok(decryptor.decrypt_padded_vec_mut::<Pkcs7>(data)?)
    }
}

/// Resolves the playlist's key declaration into usable key material.
///
/// Returns `None` for unencrypted playlists (`METHOD=NONE` or no key
/// declaration at all). The key URI resolves against the media playlist
/// URL and is fetched with a single GET; anything other than AES-128 is
/// fatal since no segment could be decrypted without it.
pub async fn resolve_key(
    client: &HttpClient,
    playlist: &Playlist,
    base_url: &Url,
    cancel: &CancellationToken,
) -> HlsResult<Option<EncryptionContext>> {
    let Some(key) = &playlist.key else {
        return Ok(None);
    };
    if key.method == METHOD_NONE {
        return Ok(None);
    }
    if key.method != AES_128 {
        return Err(HlsError::UnsupportedEncryption(key.method.clone()));
    }

    let url = base_url.join(&key.uri)?;
    log::debug!("Fetching AES-128 key from {url}");
    let bytes = client.fetch_bytes(url, cancel).await?;
    let key_bytes: [u8; 16] = bytes
        .as_ref()
        .try_into()
        .map_err(|_| HlsError::InvalidKeyLength(bytes.len()))?;

    Ok(Some(EncryptionContext {
        key: key_bytes,
        iv: key.iv.as_deref().and_then(parse_iv),
    }))
}

/// Decodes the literal IV text of a key declaration: `0x`-prefixed hex, a
/// bare hex number, or a raw 16-byte literal. Anything else counts as
/// absent and defers to the IV source.
fn parse_iv(iv: &str) -> Option<[u8; 16]> {
    let hex = iv.strip_prefix("0x").or_else(|| iv.strip_prefix("0X"));
    if let Ok(value) = u128::from_str_radix(hex.unwrap_or(iv), 16) {
        return Some(value.to_be_bytes());
    }
    iv.as_bytes().try_into().ok()
}
