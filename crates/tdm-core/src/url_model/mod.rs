//! Artifact naming.
//!
//! Derives safe flat-directory filenames from web-seed URLs or
//! Content-Disposition headers, and builds the retrieval reference a completed
//! task exposes.

mod content_disposition;
mod sanitize;

pub use content_disposition::{attachment_header, parse_content_disposition_filename, percent_encode};
pub use sanitize::sanitize_filename_for_linux;

/// Default filename when URL path and Content-Disposition yield nothing usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// Route prefix under which the HTTP boundary serves finished artifacts.
pub const FILES_ROUTE: &str = "/api/files";

/// Derives a safe filename for saving a download.
///
/// Prefers the filename from `content_disposition` (if present and parseable),
/// otherwise uses the last path segment of `url`, then sanitizes it.
///
/// - `derive_filename("https://example.com/archive.zip", None)` → `"archive.zip"`
/// - `derive_filename("https://example.com/", Some("attachment; filename=\"report.pdf\""))` → `"report.pdf"`
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(parse_content_disposition_filename)
        .filter(|s| !s.is_empty())
        .or_else(|| filename_from_url_path(url));

    let raw = match candidate {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize_filename_for_linux(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = content_disposition::percent_decode(segment);
    (decoded != "." && decoded != "..").then_some(decoded)
}

/// Retrieval reference for a completed artifact, e.g. `/api/files/movie.mkv`.
pub fn artifact_location(name: &str) -> String {
    format!("{}/{}", FILES_ROUTE, percent_encode(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filename_from_url_path() {
        assert_eq!(
            derive_filename("https://example.com/archive.zip", None),
            "archive.zip"
        );
        assert_eq!(
            derive_filename("https://seed.example.com/path/to/debian-12.iso", None),
            "debian-12.iso"
        );
    }

    #[test]
    fn derive_filename_content_disposition_overrides_url() {
        assert_eq!(
            derive_filename(
                "https://example.com/archive.zip",
                Some("attachment; filename=\"real-name.tar.gz\"")
            ),
            "real-name.tar.gz"
        );
    }

    #[test]
    fn derive_filename_fallbacks() {
        assert_eq!(derive_filename("https://example.com/", None), "download.bin");
        assert_eq!(derive_filename("https://example.com/..", None), "download.bin");
    }

    #[test]
    fn url_path_segment_is_decoded() {
        assert_eq!(
            filename_from_url_path("https://seed.example.com/a/My%20Movie.mkv?token=1").as_deref(),
            Some("My Movie.mkv")
        );
        assert_eq!(filename_from_url_path("https://seed.example.com"), None);
        assert_eq!(filename_from_url_path("not a url"), None);
    }

    #[test]
    fn artifact_location_encodes_name() {
        assert_eq!(artifact_location("movie.mkv"), "/api/files/movie.mkv");
        assert_eq!(artifact_location("my movie.mkv"), "/api/files/my%20movie.mkv");
    }
}
