//! Magnet URI parsing: info hash, display name and HTTP(S) sources.

use url::Url;

use crate::error::EngineStartError;

/// The parts of a magnet link the web-seed engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magnet {
    /// Hash after `urn:btih:` / `urn:btmh:` in the `xt` parameter.
    pub info_hash: String,
    /// `dn` parameter, if present.
    pub display_name: Option<String>,
    /// HTTP(S) URLs from `ws`, `as` and `xs` parameters, in link order.
    pub sources: Vec<String>,
}

const SOURCE_KEYS: [&str; 3] = ["ws", "as", "xs"];

fn is_source_key(key: &str) -> bool {
    SOURCE_KEYS
        .iter()
        .any(|k| key == *k || key.strip_prefix(k).is_some_and(|rest| rest.starts_with('.')))
}

/// Parses `locator` as a magnet link.
pub fn parse_magnet(locator: &str) -> Result<Magnet, EngineStartError> {
    let url = Url::parse(locator).map_err(|e| EngineStartError::Malformed(e.to_string()))?;
    if url.scheme() != "magnet" {
        return Err(EngineStartError::Malformed(format!(
            "expected magnet scheme, got {}",
            url.scheme()
        )));
    }

    let mut info_hash = None;
    let mut display_name = None;
    let mut sources = Vec::new();

    for (key, value) in url.query_pairs() {
        if key == "xt" {
            let hash = value
                .strip_prefix("urn:btih:")
                .or_else(|| value.strip_prefix("urn:btmh:"))
                .filter(|h| !h.is_empty());
            if let Some(h) = hash {
                info_hash.get_or_insert_with(|| h.to_string());
            }
        } else if key == "dn" {
            if !value.trim().is_empty() {
                display_name = Some(value.trim().to_string());
            }
        } else if is_source_key(&key) {
            match Url::parse(&value) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {
                    sources.push(u.to_string());
                }
                _ => tracing::debug!(%key, %value, "ignoring non-HTTP source in magnet"),
            }
        }
    }

    let info_hash = info_hash
        .ok_or_else(|| EngineStartError::Malformed("missing xt=urn:btih: info hash".into()))?;

    Ok(Magnet {
        info_hash,
        display_name,
        sources,
    })
}
