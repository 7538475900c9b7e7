use std::collections::HashMap;

use crate::{
    directive::{unquote, AttributeValue, Directive},
    error::{HlsError, HlsResult},
};

/// A metadata value at one key: a single scalar, or every occurrence of a
/// repeated key in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    One(String),
    Many(Vec<String>),
}

pub type MetaMap = HashMap<String, MetaValue>;

/// Merges `value` into `map` under `key` with list promotion: a repeated
/// key turns the existing scalar into a list and appends, so no occurrence
/// is ever lost.
fn merge_meta(map: &mut MetaMap, key: String, value: MetaValue) {
    match map.remove(&key) {
        None => {
            map.insert(key, value);
        }
        Some(existing) => {
            let mut values = match existing {
                MetaValue::One(v) => vec![v],
                MetaValue::Many(v) => v,
            };
            match value {
                MetaValue::One(v) => values.push(v),
                MetaValue::Many(v) => values.extend(v),
            }
            map.insert(key, MetaValue::Many(values));
        }
    }
}

/// One variant entry of a master playlist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantStream {
    pub attributes: HashMap<String, String>,
    pub url: String,
    pub metadata: MetaMap,
}

/// One media segment of a media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub duration: f64,
    pub title: Option<String>,
    pub url: String,
    pub metadata: MetaMap,
}

/// The `#EXT-X-KEY` declaration as written in the playlist. `iv` keeps the
/// literal directive text; decoding happens at key resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistKey {
    pub method: String,
    pub uri: String,
    pub iv: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub streams: Vec<VariantStream>,
    pub segments: Vec<MediaSegment>,
    pub key: Option<PlaylistKey>,
    pub is_live: bool,
    pub metadata: MetaMap,
}

enum OpenDeclaration {
    Stream(VariantStream),
    Segment {
        duration: f64,
        title: Option<String>,
        metadata: MetaMap,
    },
}

impl Playlist {
    /// Builds a playlist from raw M3U8 text.
    ///
    /// The builder is a small state machine: a `STREAM-INF` or `INF`
    /// directive opens a declaration, the next URL line closes it. Opening
    /// a declaration while another is open, declaring anything after
    /// `ENDLIST`, a non-numeric `EXTINF` duration, or input ending with an
    /// open declaration are all protocol violations.
    pub fn parse(text: &str) -> HlsResult<Playlist> {
        let mut playlist = Playlist {
            is_live: true,
            ..Playlist::default()
        };
        let mut open: Option<OpenDeclaration> = None;
        let mut end_of_media = false;

        for (n, line) in text.lines().enumerate() {
            let n = n + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(directive) = Directive::parse(line) else {
                // A URL line closes the open declaration. With nothing
                // open it is ignored.
                match open.take() {
                    Some(OpenDeclaration::Stream(mut stream)) => {
                        stream.url = line.to_string();
                        playlist.streams.push(stream);
                    }
                    Some(OpenDeclaration::Segment {
                        duration,
                        title,
                        metadata,
                    }) => {
                        playlist.segments.push(MediaSegment {
                            duration,
                            title,
                            url: line.to_string(),
                            metadata,
                        });
                    }
                    None => {}
                }
                continue;
            };

            match directive {
                Directive::StreamInf(attributes) => {
                    check_can_declare(&open, end_of_media, n)?;
                    open = Some(OpenDeclaration::Stream(VariantStream {
                        attributes,
                        ..VariantStream::default()
                    }));
                }
                Directive::Inf(data) => {
                    check_can_declare(&open, end_of_media, n)?;
                    let (duration, title) = match data.split_once(',') {
                        Some((duration, title)) => (duration, title),
                        None => (data.as_str(), ""),
                    };
                    let duration = duration.trim().parse::<f64>().map_err(|_| {
                        HlsError::InvalidDuration {
                            line: n,
                            value: duration.to_string(),
                        }
                    })?;
                    let title = (!title.is_empty()).then(|| title.to_string());
                    open = Some(OpenDeclaration::Segment {
                        duration,
                        title,
                        metadata: MetaMap::new(),
                    });
                }
                Directive::Key(attributes) => {
                    // HLS places the key declaration at playlist level;
                    // the last one seen wins.
                    playlist.key = Some(PlaylistKey {
                        method: attributes
                            .get("METHOD")
                            .map(|m| unquote(m).to_string())
                            .unwrap_or_else(|| "NONE".to_string()),
                        uri: attributes
                            .get("URI")
                            .map(|u| unquote(u).to_string())
                            .unwrap_or_default(),
                        iv: attributes.get("IV").cloned(),
                    });
                }
                Directive::ValueOnly(name) => {
                    if name == "endlist" {
                        end_of_media = true;
                        playlist.is_live = false;
                    }
                }
                Directive::Attribute { name, value } => {
                    if name == "playlist_type" {
                        playlist.is_live = false;
                    }
                    let target = match open.as_mut() {
                        Some(OpenDeclaration::Stream(stream)) => &mut stream.metadata,
                        Some(OpenDeclaration::Segment { metadata, .. }) => metadata,
                        None => &mut playlist.metadata,
                    };
                    match value {
                        AttributeValue::Raw(data) => {
                            merge_meta(target, name, MetaValue::One(data));
                        }
                        AttributeValue::Pairs(pairs) => {
                            for (key, value) in pairs {
                                merge_meta(target, key, MetaValue::One(value));
                            }
                        }
                    }
                }
            }
        }

        if open.is_some() {
            return Err(HlsError::TruncatedDeclaration);
        }

        Ok(playlist)
    }

    /// A playlist carrying variant streams is a master playlist; its
    /// segment list is never consulted.
    pub fn is_master(&self) -> bool {
        !self.streams.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.segments.is_empty()
    }

    /// `#EXT-X-MEDIA-SEQUENCE` of the first segment, 0 when absent.
    pub fn media_sequence(&self) -> u64 {
        match self.metadata.get("media_sequence") {
            Some(MetaValue::One(v)) => v.parse().unwrap_or(0),
            Some(MetaValue::Many(v)) => v.first().and_then(|v| v.parse().ok()).unwrap_or(0),
            None => 0,
        }
    }
}

fn check_can_declare(
    open: &Option<OpenDeclaration>,
    end_of_media: bool,
    line: usize,
) -> HlsResult<()> {
    if open.is_some() {
        return Err(HlsError::UnexpectedRedeclaration(line));
    }
    if end_of_media {
        return Err(HlsError::DeclarationAfterEndList(line));
    }
    Ok(())
}
