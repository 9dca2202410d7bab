//! Content-Disposition: filename extraction from web-seed responses and the
//! `attachment` header served with retrieved artifacts.

/// Extracts the filename from a raw Content-Disposition header value.
///
/// Supports `filename="value"`, `filename=value` and RFC 5987
/// `filename*=UTF-8''percent-encoded`; `filename*` wins when both exist.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.trim().split(';') {
        let Some((name, v)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let v = v.trim();

        if name == "filename*" {
            let encoded = v
                .strip_prefix("UTF-8''")
                .or_else(|| v.strip_prefix("utf-8''"));
            if let Some(decoded) = encoded.map(percent_decode).map(|d| unescape_quoted(&d)) {
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let unquoted = match v.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                Some(inner) => unescape_quoted(inner),
                None => v.to_string(),
            };
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

/// Builds `attachment; filename="..."` for serving an artifact, adding an
/// RFC 5987 `filename*` when the name is not plain ASCII.
pub fn attachment_header(name: &str) -> String {
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    let quoted = ascii.replace('\\', "\\\\").replace('"', "\\\"");
    if ascii == name {
        format!("attachment; filename=\"{}\"", quoted)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            quoted,
            percent_encode(name)
        )
    }
}

/// Percent-encodes everything outside RFC 3986 unreserved characters.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Percent-decodes, passing malformed escapes through unchanged.
pub(crate) fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Drops backslash escapes in front of `"` and `\`.
fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
