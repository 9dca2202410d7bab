//! Filename sanitization for the flat artifact directory.

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Sanitizes a candidate artifact name so it is a single safe path component.
///
/// Path separators, NUL, control characters and whitespace become `_` (runs
/// collapsed), leading/trailing dots, spaces and underscores are trimmed, and
/// the result is cut to 255 bytes on a char boundary. May return an empty
/// string; callers pick a fallback.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let unsafe_char = c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        if unsafe_char {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_become_underscores() {
        assert_eq!(sanitize_filename_for_linux("Season 1/ep\\01.mkv"), "Season_1_ep_01.mkv");
    }

    #[test]
    fn traversal_is_neutralized() {
        assert_eq!(sanitize_filename_for_linux("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename_for_linux(".."), "");
    }

    #[test]
    fn control_chars_and_runs() {
        assert_eq!(sanitize_filename_for_linux("a\x00\t  b.iso"), "a_b.iso");
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let name = "é".repeat(200);
        let out = sanitize_filename_for_linux(&name);
        assert!(out.len() <= NAME_MAX);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
