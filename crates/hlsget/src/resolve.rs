use std::collections::HashMap;

use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{HlsError, HlsResult},
    playlist::Playlist,
    util::http::HttpClient,
};

/// One leaf media playlist discovered while walking a master playlist.
/// `quality` is the vertical component of the variant's `RESOLUTION`
/// attribute, kept as the literal string `"0"` when absent or malformed.
#[derive(Debug)]
struct VariantCandidate {
    quality: String,
    url: Url,
    playlist: Playlist,
}

/// Fetches and parses a single playlist. Non-2xx responses fail with
/// `HttpStatus`; no retry happens at this layer.
pub async fn fetch_playlist(
    client: &HttpClient,
    url: &Url,
    cancel: &CancellationToken,
) -> HlsResult<Playlist> {
    let bytes = client.fetch_bytes(url.clone(), cancel).await?;
    Playlist::parse(&String::from_utf8_lossy(&bytes))
}

/// Resolves a root playlist URL down to a single media playlist.
///
/// A master playlist is walked recursively: every `.m3u8`-class variant is
/// fetched, nested masters recurse, and the leaves form the candidate set
/// for quality selection. The chosen media playlist is returned together
/// with its own URL so that segment URLs resolve against the right base.
pub async fn resolve(
    client: &HttpClient,
    root_url: Url,
    preferred_quality: u32,
    cancel: &CancellationToken,
) -> HlsResult<(Url, Playlist)> {
    let playlist = fetch_playlist(client, &root_url, cancel).await?;

    if !playlist.is_master() {
        if playlist.is_empty() {
            return Err(HlsError::NoSegments);
        }
        return Ok((root_url, playlist));
    }

    log::info!("Master playlist input detected. Selecting a quality stream.");
    let mut candidates = Vec::new();
    collect_variants(client, &root_url, &playlist, &mut candidates, cancel).await?;

    match select_candidate(candidates, preferred_quality) {
        Some(candidate) => {
            log::info!(
                "Selected stream: {url}; Quality: {quality}",
                url = candidate.url,
                quality = candidate.quality
            );
            if candidate.playlist.is_empty() {
                return Err(HlsError::NoSegments);
            }
            Ok((candidate.url, candidate.playlist))
        }
        None => {
            // No variant led anywhere; fall back to the root itself.
            log::warn!("No stream candidates found. Falling back to the root playlist; Quality: unknown");
            if playlist.segments.is_empty() {
                return Err(HlsError::NoSegments);
            }
            Ok((root_url, playlist))
        }
    }
}

#[async_recursion::async_recursion]
async fn collect_variants(
    client: &HttpClient,
    playlist_url: &Url,
    playlist: &Playlist,
    candidates: &mut Vec<VariantCandidate>,
    cancel: &CancellationToken,
) -> HlsResult<()> {
    for stream in &playlist.streams {
        // Relative variants resolve against the playlist that declared
        // them, not against the root.
        let url = playlist_url.join(&stream.url)?;
        if !is_playlist_url(&url) {
            continue;
        }

        let child = fetch_playlist(client, &url, cancel).await?;
        if child.is_master() {
            collect_variants(client, &url, &child, candidates, cancel).await?;
        } else {
            candidates.push(VariantCandidate {
                quality: resolution_quality(&stream.attributes),
                url,
                playlist: child,
            });
        }
    }
    Ok(())
}

/// Picks the highest-quality candidate at or below the preferred ceiling;
/// ties break toward the earliest candidate. With no survivor the first
/// candidate wins unconditionally.
fn select_candidate(
    candidates: Vec<VariantCandidate>,
    preferred_quality: u32,
) -> Option<VariantCandidate> {
    let mut best: Option<(usize, u32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let Ok(quality) = candidate.quality.parse::<u32>() else {
            continue;
        };
        if quality > preferred_quality {
            continue;
        }
        if best.map_or(true, |(_, best_quality)| quality > best_quality) {
            best = Some((index, quality));
        }
    }

    let index = best.map(|(index, _)| index).unwrap_or(0);
    candidates.into_iter().nth(index)
}

fn resolution_quality(attributes: &HashMap<String, String>) -> String {
    attributes
        .get("RESOLUTION")
        .and_then(|resolution| resolution.split_once('x'))
        .map(|(_, vertical)| vertical)
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or("0")
        .to_string()
}

fn is_playlist_url(url: &Url) -> bool {
    let extension = url
        .path_segments()
        .and_then(|segments| segments.last())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension);
    matches!(extension, Some("m3u8") | Some("m3u"))
}
