//! RFC 5988 style `Link` header parsing.
//!
//! ACME v1 servers advertise the next protocol step through `Link` headers:
//!
//! ```text
//! Link: <https://ca.example/acme/new-authz>;rel="next",
//!       <https://ca.example/terms>;rel="terms-of-service"
//! ```

use std::collections::HashMap;

/// Parses a `Link` header value into a `rel => url` mapping.
///
/// Returns `None` for a missing header or any malformed segment (a URL part
/// not wrapped in `<`/`>`). A recoverable parse failure; callers decide
/// whether a missing relation is fatal.
pub(crate) fn parse_link(header: Option<&str>) -> Option<HashMap<String, String>> {
    let header = header?;

    let mut links = HashMap::new();

    for segment in header.split(',') {
        let mut parts = segment.trim().split(';');

        let url = parts.next()?.trim();
        let url = url.strip_prefix('<')?.strip_suffix('>')?;

        for attr in parts {
            let Some((key, value)) = attr.split_once('=') else {
                continue;
            };

            let value = value.trim();
            let Some(value) = value
                .strip_prefix('"')
                .and_then(|value| value.strip_suffix('"'))
            else {
                continue;
            };

            if key.trim() == "rel" {
                links.insert(value.to_owned(), url.to_owned());
            }
        }
    }

    Some(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_relations_to_urls() {
        let links = parse_link(Some(r#"<https://x/a>;rel="next", <https://x/b>;rel="up""#)).unwrap();

        assert_eq!(links.get("next").unwrap(), "https://x/a");
        assert_eq!(links.get("up").unwrap(), "https://x/b");
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn parses_terms_of_service_relation() {
        let header = r#"<https://ca/acme/new-authz>;rel="next",<https://ca/terms>;rel="terms-of-service""#;
        let links = parse_link(Some(header)).unwrap();

        assert_eq!(links.get("terms-of-service").unwrap(), "https://ca/terms");
    }

    #[test]
    fn malformed_url_part_is_none() {
        // unmatched angle bracket
        assert!(parse_link(Some(r#"<https://x/a;rel="next""#)).is_none());
        assert!(parse_link(Some(r#"https://x/a>;rel="next""#)).is_none());
    }

    #[test]
    fn missing_header_is_none() {
        assert!(parse_link(None).is_none());
    }

    #[test]
    fn unquoted_attributes_are_skipped() {
        let links = parse_link(Some(r#"<https://x/a>;rel=next"#)).unwrap();
        assert!(links.is_empty());
    }
}
