//! Diagnostic command builder
//!
//! Builds a shell-reproducible `curl` invocation for a failing POST so an
//! operator can paste it into a terminal and replay the request. Both the
//! URL and the serialized body are shell-escaped.

use std::collections::BTreeMap;

/// How the parameters are serialized into the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurlBody {
    /// URL-encoded `k=v` pairs joined with `&`
    Form,
    /// JSON object, sent with an explicit content-type header
    Json,
}

/// Generate a curl command equivalent to a POST of `params` to `url`.
///
/// Parameters are accepted as an ordered map so the generated command is
/// deterministic.
pub fn curl_command(url: &str, params: &BTreeMap<String, String>, body: CurlBody) -> String {
    match body {
        CurlBody::Form => {
            let data = params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            format!("curl -X POST {} -d {}", shell_quote(url), shell_quote(&data))
        }
        CurlBody::Json => {
            let json = serde_json::Map::from_iter(
                params
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone()))),
            );
            let data = serde_json::Value::Object(json).to_string();
            format!(
                "curl -X POST {} -H 'Content-Type: application/json' -d {}",
                shell_quote(url),
                shell_quote(&data)
            )
        }
    }
}

/// Quote a string for POSIX shells: wrap in single quotes, with embedded
/// single quotes rewritten as `'\''`.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '@' | '%' | '+' | '=')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_form_command_contains_encoded_params() {
        let cmd = curl_command(
            "https://portal.example.org/w/api.php",
            &params(&[("action", "query"), ("srsearch", "arXiv2104.06175MaRDI")]),
            CurlBody::Form,
        );
        assert!(cmd.starts_with("curl -X POST "));
        assert!(cmd.contains("srsearch=arXiv2104.06175MaRDI"));
        assert!(cmd.contains("action=query"));
    }

    #[test]
    fn test_form_command_percent_encodes_values() {
        let cmd = curl_command(
            "https://portal.example.org/w/api.php",
            &params(&[("srsearch", "\"doi.org/10.1007/x\"")]),
            CurlBody::Form,
        );
        assert!(cmd.contains("%22doi.org%2F10.1007%2Fx%22"));
    }

    #[test]
    fn test_json_command_sets_content_type() {
        let cmd = curl_command(
            "https://portal.example.org/w/api.php",
            &params(&[("format", "json")]),
            CurlBody::Json,
        );
        assert!(cmd.contains("-H 'Content-Type: application/json'"));
        assert!(cmd.contains(r#"{"format":"json"}"#));
    }

    #[test]
    fn test_shell_quote_plain_value_unchanged() {
        assert_eq!(shell_quote("https://example.org/api"), "https://example.org/api");
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote(""), "''");
    }
}
