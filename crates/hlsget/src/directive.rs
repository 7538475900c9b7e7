use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

static DIRECTIVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#EXT(?P<name>[^:]+)(?::(?P<data>.*))?$").unwrap());

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+?)=(.+?)(?:,|$)").unwrap());

/// One parsed playlist line. Each declaration shape gets its own variant,
/// so downstream code matches on the discriminant instead of probing an
/// attribute map for well-known keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `#EXT-X-STREAM-INF:<attrs>`, a variant stream declaration.
    StreamInf(HashMap<String, String>),
    /// `#EXTINF:<duration>,<title>`, a segment declaration. The payload is
    /// kept raw; the playlist builder splits and validates it.
    Inf(String),
    /// `#EXT-X-KEY:<attrs>`, an encryption declaration.
    Key(HashMap<String, String>),
    /// A tag with no `:` suffix, e.g. `#EXT-X-ENDLIST`.
    ValueOnly(String),
    /// Any other tag. Carries either parsed `KEY=VALUE` pairs or the raw
    /// scalar after the `:`.
    Attribute { name: String, value: AttributeValue },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Pairs(HashMap<String, String>),
    Raw(String),
}

impl Directive {
    /// Parses a single playlist line.
    ///
    /// Returns `None` for any line that is not an `#EXT` tag; the caller
    /// treats such lines as URL/content lines terminating an open
    /// declaration. Parsing is lenient and never fails: malformed tag data
    /// degrades to a raw scalar.
    pub fn parse(line: &str) -> Option<Directive> {
        let captures = DIRECTIVE_REGEX.captures(line)?;

        let mut name = captures.name("name")?.as_str();
        if let Some(stripped) = name.strip_prefix("-X-") {
            name = stripped;
        }
        let name = name.to_lowercase().replace('-', "_");

        let Some(data) = captures.name("data") else {
            return Some(Directive::ValueOnly(name));
        };
        let data = data.as_str();

        Some(match name.as_str() {
            "stream_inf" => Directive::StreamInf(parse_attributes(data)),
            "inf" => Directive::Inf(data.to_string()),
            "key" => Directive::Key(parse_attributes(data)),
            _ => {
                let attributes = parse_attributes(data);
                let value = if attributes.is_empty() {
                    AttributeValue::Raw(data.to_string())
                } else {
                    AttributeValue::Pairs(attributes)
                };
                Directive::Attribute { name, value }
            }
        })
    }
}

fn parse_attributes(data: &str) -> HashMap<String, String> {
    ATTRIBUTE_REGEX
        .captures_iter(data)
        .map(|capture| (capture[1].to_string(), capture[2].to_string()))
        .collect()
}

/// Strips one pair of surrounding double quotes, as carried by quoted
/// attribute values like `URI="..."`.
pub(crate) fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
