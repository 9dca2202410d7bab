//! HEAD probe of a web seed: size and filename hint before the body transfer.

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

use super::EngineOptions;

/// Headers of the final response that matter for naming and progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

/// Performs a HEAD request against `url`, following redirects.
///
/// Blocking; the web-seed engine calls it from its transfer thread.
pub fn probe(url: &str, opts: &EngineOptions) -> Result<HeadResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(opts.connect_timeout_secs))?;
    easy.timeout(Duration::from_secs(30))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse_headers(&headers))
}

/// Parses collected header lines. When redirects were followed, only the last
/// response block counts: every status line resets what was seen before.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut result = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            result = HeadResult::default();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    result.content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("content-disposition") {
                result.content_disposition = Some(value.to_string());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn content_length_and_disposition() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Content-Disposition: attachment; filename=\"movie.mkv\"",
        ]));
        assert_eq!(r.content_length, Some(12345));
        assert!(r.content_disposition.unwrap().contains("movie.mkv"));
    }

    #[test]
    fn only_last_response_block_counts() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 302 Found",
            "Content-Length: 0",
            "Location: https://mirror.example.com/movie.mkv",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 999",
        ]));
        assert_eq!(r.content_length, Some(999));
        assert!(r.content_disposition.is_none());
    }

    #[test]
    fn garbage_length_is_ignored() {
        let r = parse_headers(&lines(&["content-length: lots"]));
        assert_eq!(r.content_length, None);
    }
}
