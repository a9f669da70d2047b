//! Content-Disposition filename resolution
//!
//! Rules are tried in order and the first one producing a usable name wins:
//!
//! 1. no header, or a blank one: [`FALLBACK_FILENAME`]
//! 2. the RFC 5987 `filename*=charset'lang'value` parameter, percent-decoded
//! 3. the plain `filename=` parameter, quoted or not, percent-decoded
//! 4. [`FALLBACK_FILENAME`]
//!
//! The extended form is authoritative for the encoding, so it beats the plain one
//! even when both are present.

pub const FALLBACK_FILENAME: &str = "video.mp4";

/// Which rule produced the file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedName {
    Extended(String),
    Simple(String),
    Fallback,
}

impl ResolvedName {
    pub fn file_name(&self) -> &str {
        match self {
            ResolvedName::Extended(name) | ResolvedName::Simple(name) => name,
            ResolvedName::Fallback => FALLBACK_FILENAME,
        }
    }

    pub fn into_file_name(self) -> String {
        match self {
            ResolvedName::Extended(name) | ResolvedName::Simple(name) => name,
            ResolvedName::Fallback => FALLBACK_FILENAME.to_string(),
        }
    }
}

#[tracing::instrument(level = "trace", ret)]
pub fn resolve(header: Option<&str>) -> ResolvedName {
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return ResolvedName::Fallback;
    };

    if let Some(name) = param_value(header, "filename*")
        .map(decode_extended)
        .and_then(|name| sanitize(&name))
    {
        return ResolvedName::Extended(name);
    }

    if let Some(name) = param_value(header, "filename")
        .map(|raw| percent_decode_or_raw(&raw))
        .and_then(|name| sanitize(&name))
    {
        return ResolvedName::Simple(name);
    }

    tracing::trace!("No usable filename in Content-Disposition");
    ResolvedName::Fallback
}

/// Raw value of parameter `name`, quotes removed. Names compare case-insensitively.
fn param_value(header: &str, name: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets identical to the original header
    let lower = header.to_ascii_lowercase();
    let needle = format!("{name}=");

    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(&needle) {
        let pos = search_from + found;
        search_from = pos + needle.len();

        // Must be a whole parameter name, not the tail of e.g. `xfilename=`
        let at_boundary = lower[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c == ';' || c.is_whitespace());
        if !at_boundary {
            continue;
        }

        let rest = header[search_from..].trim_start();
        let value = if let Some(quoted) = rest.strip_prefix('"') {
            read_quoted(quoted)
        } else {
            rest.split(';').next().unwrap_or_default().trim().to_string()
        };
        return Some(value);
    }
    None
}

/// Quoted-string body up to the closing quote, honouring backslash escapes
fn read_quoted(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// `charset'language'value` → decoded value
fn decode_extended(raw: String) -> String {
    let mut parts = raw.splitn(3, '\'');
    let (charset, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_lang), Some(value)) => (charset, value),
        _ => ("", raw.as_str()),
    };

    if charset.eq_ignore_ascii_case("iso-8859-1") {
        // Latin-1 bytes map one to one onto the first 256 code points
        return urlencoding::decode_binary(value.as_bytes())
            .iter()
            .map(|&b| b as char)
            .collect();
    }
    percent_decode_or_raw(value)
}

fn percent_decode_or_raw(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, raw, "Filename is not valid percent-encoded UTF-8");
            raw.to_string()
        }
    }
}

/// Strip any directory part so the name cannot escape the output directory
fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_utf8_filename() {
        let resolved = resolve(Some("attachment; filename*=UTF-8''%E6%B5%8B%E8%AF%95.mp4"));
        assert_eq!(resolved, ResolvedName::Extended("测试.mp4".to_string()));
    }

    #[test]
    fn test_quoted_simple_filename() {
        let resolved = resolve(Some("attachment; filename=\"plain.mp4\""));
        assert_eq!(resolved, ResolvedName::Simple("plain.mp4".to_string()));
    }

    #[test]
    fn test_missing_or_blank_header_falls_back() {
        assert_eq!(resolve(None), ResolvedName::Fallback);
        assert_eq!(resolve(Some("")), ResolvedName::Fallback);
        assert_eq!(resolve(Some("   ")), ResolvedName::Fallback);
        assert_eq!(resolve(None).file_name(), FALLBACK_FILENAME);
    }

    #[test]
    fn test_header_without_filename_falls_back() {
        assert_eq!(resolve(Some("inline")), ResolvedName::Fallback);
        assert_eq!(resolve(Some("attachment; size=42")), ResolvedName::Fallback);
    }

    #[test]
    fn test_extended_form_wins_over_simple() {
        let header = "attachment; filename=\"fallback.mp4\"; filename*=UTF-8''%E8%A7%86%E9%A2%91.mp4";
        assert_eq!(
            resolve(Some(header)),
            ResolvedName::Extended("视频.mp4".to_string())
        );
    }

    #[test]
    fn test_unquoted_simple_filename() {
        let resolved = resolve(Some("attachment; filename=clip.mp4; size=10"));
        assert_eq!(resolved, ResolvedName::Simple("clip.mp4".to_string()));
    }

    #[test]
    fn test_simple_filename_is_percent_decoded() {
        let resolved = resolve(Some("attachment; filename=\"my%20clip.mp4\""));
        assert_eq!(resolved.file_name(), "my clip.mp4");
    }

    #[test]
    fn test_invalid_percent_encoding_keeps_raw_value() {
        // %FF alone is not valid UTF-8
        let resolved = resolve(Some("attachment; filename*=UTF-8''%FFclip.mp4"));
        assert_eq!(resolved, ResolvedName::Extended("%FFclip.mp4".to_string()));

        let resolved = resolve(Some("attachment; filename=\"%FFclip.mp4\""));
        assert_eq!(resolved, ResolvedName::Simple("%FFclip.mp4".to_string()));
    }

    #[test]
    fn test_latin1_extended_filename() {
        let resolved = resolve(Some("attachment; filename*=iso-8859-1'en'caf%E9.mp4"));
        assert_eq!(resolved.file_name(), "café.mp4");
    }

    #[test]
    fn test_parameter_names_are_case_insensitive() {
        let resolved = resolve(Some("Attachment; FileName=\"Upper.mp4\""));
        assert_eq!(resolved.file_name(), "Upper.mp4");
    }

    #[test]
    fn test_directory_components_are_stripped() {
        let resolved = resolve(Some("attachment; filename=\"../../etc/passwd\""));
        assert_eq!(resolved, ResolvedName::Simple("passwd".to_string()));

        let resolved = resolve(Some("attachment; filename=\"..\""));
        assert_eq!(resolved, ResolvedName::Fallback);
    }

    #[test]
    fn test_empty_extended_value_falls_through_to_simple() {
        let header = "attachment; filename*=UTF-8''; filename=\"plain.mp4\"";
        assert_eq!(
            resolve(Some(header)),
            ResolvedName::Simple("plain.mp4".to_string())
        );
    }
}
