//! Utility functions for file naming and response header parsing

use crate::types::DEFAULT_CONTENT_TYPE;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Extract the filename from a `Content-Disposition` header value
///
/// The RFC 5987 `filename*=` form is preferred over plain `filename=`
/// because it carries non-ASCII names losslessly. The extension is kept.
///
/// # Examples
///
/// ```
/// use docjob::utils::filename_from_content_disposition;
///
/// let name = filename_from_content_disposition(
///     r#"attachment; filename="report.pdf"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"#,
/// );
/// assert_eq!(name.as_deref(), Some("résumé.pdf"));
/// ```
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in split_parameters(value) {
        let part = part.trim();
        if let Some(encoded) = strip_prefix_ignore_case(part, "filename*=") {
            // Format is: charset'lang'encoded-filename
            let encoded = encoded.trim_matches('"');
            let encoded = match encoded.rfind('\'') {
                Some(idx) => &encoded[idx + 1..],
                None => encoded,
            };
            if let Ok(decoded) = urlencoding::decode(encoded)
                && let Some(name) = clean_filename(&decoded)
            {
                return Some(name);
            }
        } else if let Some(raw) = strip_prefix_ignore_case(part, "filename=")
            && plain.is_none()
        {
            plain = clean_filename(raw.trim_matches('"'));
        }
    }

    plain
}

/// Split header parameters on `;` outside of double quotes
fn split_parameters(value: &str) -> impl Iterator<Item = &str> {
    let mut in_quotes = false;
    value.split(move |c: char| {
        if c == '"' {
            in_quotes = !in_quotes;
        }
        c == ';' && !in_quotes
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// Drop any directory components a server may have put in a filename
fn clean_filename(name: &str) -> Option<String> {
    let name = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// File name without its last extension
///
/// ```
/// use docjob::utils::file_stem;
///
/// assert_eq!(file_stem("scan.final.pdf"), "scan.final");
/// assert_eq!(file_stem("README"), "README");
/// ```
#[must_use]
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Extension (with leading dot) conventionally used for a MIME type
///
/// Parameters such as `; charset=utf-8` are ignored. Unknown types map to `""`.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => ".pdf",
        "application/zip" | "application/x-zip-compressed" => ".zip",
        "application/json" => ".json",
        "text/plain" => ".txt",
        "text/html" => ".html",
        "text/csv" => ".csv",
        "text/markdown" => ".md",
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tiff",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/epub+zip" => ".epub",
        _ => "",
    }
}

/// MIME type guessed from a file name's extension
///
/// Falls back to [`DEFAULT_CONTENT_TYPE`] for unknown extensions.
#[must_use]
pub fn content_type_for_filename(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "epub" => "application/epub+zip",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// True if the MIME type declares a JSON body (`application/json`, `*+json`)
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Set the `async=true` query flag on an operation endpoint
///
/// Any other `async` value already in the query is replaced, so the flag is
/// never sent twice.
#[must_use]
pub fn with_async_flag(endpoint: &str) -> String {
    let Some((path, query)) = endpoint.split_once('?') else {
        return format!("{endpoint}?async=true");
    };

    let mut params: Vec<&str> = query
        .split('&')
        .filter(|p| {
            let key = p.split_once('=').map_or(*p, |(key, _)| key);
            !p.is_empty() && !key.eq_ignore_ascii_case("async")
        })
        .collect();
    params.push("async=true");
    format!("{path}?{}", params.join("&"))
}

#[allow(clippy::expect_used)] // literal pattern
fn uuid_regex() -> &'static Regex {
    static UUID: OnceLock<Regex> = OnceLock::new();
    UUID.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .expect("valid UUID pattern")
    })
}

/// Input ids the backend reported as invalid in an HTTP 422 body
///
/// A JSON body with `errorFileIds` is authoritative; otherwise every UUID in
/// the text is taken, in order of appearance and without duplicates.
pub fn rejected_file_ids(body: &str) -> Vec<String> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(serde_json::Value::Array(ids)) = map.get("errorFileIds")
    {
        return ids
            .iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect();
    }

    let mut ids: Vec<String> = Vec::new();
    for m in uuid_regex().find_iter(body) {
        let id = m.as_str().to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Shorten a response body for logs and error messages
#[must_use]
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    if body.chars().count() <= max_chars {
        body.to_string()
    } else {
        let head: String = body.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // filename_from_content_disposition
    // =========================================================================

    #[test]
    fn quoted_filename_keeps_extension() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="Report.2024.pdf""#)
                .as_deref(),
            Some("Report.2024.pdf")
        );
    }

    #[test]
    fn unquoted_filename() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=report.pdf").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn rfc5987_filename_is_decoded() {
        assert_eq!(
            filename_from_content_disposition(
                "attachment; filename*=UTF-8''file%20name%20with%20spaces.pdf"
            )
            .as_deref(),
            Some("file name with spaces.pdf")
        );
    }

    #[test]
    fn encoded_filename_takes_priority_regardless_of_order() {
        let header = r#"attachment; filename="fallback.pdf"; filename*=UTF-8''real.pdf"#;
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            Some("real.pdf")
        );
    }

    #[test]
    fn directory_components_are_stripped() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="../../etc/passwd""#)
                .as_deref(),
            Some("passwd")
        );
    }

    #[test]
    fn missing_or_empty_filename_is_none() {
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(filename_from_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn semicolon_inside_quoted_filename_is_kept() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="Q1; final.pdf""#)
                .as_deref(),
            Some("Q1; final.pdf")
        );
        assert_eq!(
            filename_from_content_disposition(
                r#"attachment; filename="a;b.pdf"; filename*=UTF-8''a%3Bb%20v2.pdf"#
            )
            .as_deref(),
            Some("a;b v2.pdf")
        );
    }

    #[test]
    fn header_parameter_names_are_case_insensitive() {
        assert_eq!(
            filename_from_content_disposition("attachment; FileName=Scan.PDF").as_deref(),
            Some("Scan.PDF")
        );
    }

    // =========================================================================
    // naming helpers
    // =========================================================================

    #[test]
    fn file_stem_strips_last_extension_only() {
        assert_eq!(file_stem("a.b.c.pdf"), "a.b.c");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn extension_lookup_ignores_parameters_and_case() {
        assert_eq!(extension_for_content_type("application/pdf"), ".pdf");
        assert_eq!(extension_for_content_type("Application/ZIP"), ".zip");
        assert_eq!(extension_for_content_type("text/plain; charset=utf-8"), ".txt");
        assert_eq!(extension_for_content_type("application/x-unknown"), "");
    }

    #[test]
    fn content_type_from_file_name() {
        assert_eq!(content_type_for_filename("page-1.PNG"), "image/png");
        assert_eq!(content_type_for_filename("out.pdf"), "application/pdf");
        assert_eq!(content_type_for_filename("blob"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("application/pdf"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn async_flag_is_appended_once() {
        assert_eq!(with_async_flag("/api/compress"), "/api/compress?async=true");
        assert_eq!(
            with_async_flag("/api/compress?level=2"),
            "/api/compress?level=2&async=true"
        );
        assert_eq!(
            with_async_flag("/api/compress?async=true"),
            "/api/compress?async=true"
        );
    }

    #[test]
    fn async_flag_replaces_existing_value() {
        assert_eq!(with_async_flag("/x?async=false"), "/x?async=true");
        assert_eq!(
            with_async_flag("/x?a=1&Async=false&b=2"),
            "/x?a=1&b=2&async=true"
        );
        assert_eq!(with_async_flag("/x?"), "/x?async=true");
    }

    // =========================================================================
    // rejected_file_ids
    // =========================================================================

    #[test]
    fn rejected_ids_from_json_body() {
        let body = r#"{"message":"bad input","errorFileIds":["a","b"]}"#;
        assert_eq!(rejected_file_ids(body), vec!["a", "b"]);
    }

    #[test]
    fn rejected_ids_from_uuid_scan() {
        let body = "Failed files: 123e4567-e89b-12d3-a456-426614174000, \
                    123e4567-e89b-12d3-a456-426614174000 and \
                    00000000-0000-0000-0000-00000000000a";
        assert_eq!(
            rejected_file_ids(body),
            vec![
                "123e4567-e89b-12d3-a456-426614174000",
                "00000000-0000-0000-0000-00000000000a"
            ]
        );
    }

    #[test]
    fn rejected_ids_empty_when_nothing_matches() {
        assert!(rejected_file_ids("Unprocessable entity").is_empty());
    }

    #[test]
    fn truncate_body_limits_characters() {
        assert_eq!(truncate_body("  short  ", 10), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc…");
    }
}
