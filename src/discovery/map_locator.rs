//! Locating a script's source map from its `sourceMappingURL` directive.

use crate::types::{GrabError, Result, SourceMapDescriptor};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;
use tracing::trace;
use url::Url;

/// Matches `//# sourceMappingURL=...`, the deprecated `//@` form and
/// `/*# sourceMappingURL=... */`, capturing the rest of the line.
const DIRECTIVE_PATTERN: &str = r"(?://|/\*)[#@][ \t]*sourceMappingURL[ \t]*=[ \t]*([^\r\n]*)";

/// Find the value of the last `sourceMappingURL` directive in `content`.
pub fn find_directive(content: &str) -> Option<&str> {
    let re = Regex::new(DIRECTIVE_PATTERN).ok()?;
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| directive_value(m.as_str()))
        .last()
}

/// Cut the directive value out of the rest of its line.
///
/// `data:` URLs may carry raw JSON, so they run to the end of the line minus a
/// closing `*/`. Other values stop at whitespace, quotes or `*`.
fn directive_value(rest: &str) -> Option<&str> {
    let value = if rest
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        let line = rest.trim_end();
        line.strip_suffix("*/").unwrap_or(line).trim_end()
    } else {
        rest.split(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | '*'))
            .next()
            .unwrap_or_default()
    };

    (!value.is_empty()).then_some(value)
}

/// Work out where the source map for a script lives.
///
/// The last directive in the script wins. Without a directive, a
/// `SourceMap`/`X-SourceMap` response header is used. Returns `Ok(None)` when
/// the script names no map at all.
pub fn locate_source_map(
    content: &str,
    script_url: &Url,
    header: Option<&str>,
) -> Result<Option<SourceMapDescriptor>> {
    let value = match find_directive(content) {
        Some(v) => v,
        None => match header.map(str::trim).filter(|h| !h.is_empty()) {
            Some(h) => {
                trace!("Using SourceMap header for {}", script_url);
                h
            }
            None => return Ok(None),
        },
    };

    if value
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        let payload = decode_data_url(value)?;
        return Ok(Some(SourceMapDescriptor::Inline(payload)));
    }

    let map_url = script_url.join(value)?;
    Ok(Some(SourceMapDescriptor::External(map_url)))
}

/// Decode the payload of a `data:` URL.
fn decode_data_url(value: &str) -> Result<Vec<u8>> {
    let (header, payload) = value[5..]
        .split_once(',')
        .ok_or_else(|| GrabError::MalformedMap("data URL has no payload".to_string()))?;

    let is_base64 = header
        .split(';')
        .any(|param| param.trim().eq_ignore_ascii_case("base64"));

    if is_base64 {
        decode_base64(payload)
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    let mut last_err = None;
    for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        match engine.decode(&cleaned) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_err = Some(e),
        }
    }

    Err(GrabError::MalformedMap(format!(
        "inline source map is not valid base64: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_url() -> Url {
        Url::parse("https://example.com/static/js/app.js").unwrap()
    }

    #[test]
    fn test_external_map_resolved_relative_to_script() {
        let js = "console.log(1);\n//# sourceMappingURL=app.js.map\n";
        let found = locate_source_map(js, &script_url(), None).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::External(
                Url::parse("https://example.com/static/js/app.js.map").unwrap()
            ))
        );
    }

    #[test]
    fn test_last_directive_wins() {
        let js = "//# sourceMappingURL=first.map\nvar a = 1;\n//# sourceMappingURL=second.map\n";
        assert_eq!(find_directive(js), Some("second.map"));

        let found = locate_source_map(js, &script_url(), None).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::External(
                Url::parse("https://example.com/static/js/second.map").unwrap()
            ))
        );
    }

    #[test]
    fn test_block_comment_and_legacy_forms() {
        assert_eq!(
            find_directive("a();\n/*# sourceMappingURL=style.css.map */"),
            Some("style.css.map")
        );
        assert_eq!(
            find_directive("a();\n/*# sourceMappingURL=tight.map*/"),
            Some("tight.map")
        );
        assert_eq!(find_directive("a();\n//@ sourceMappingURL=old.map"), Some("old.map"));
    }

    #[test]
    fn test_string_literal_is_not_a_directive() {
        let js = r#"var s = "//# sourceMappingURL=" + name;"#;
        assert_eq!(find_directive(js), None);
    }

    #[test]
    fn test_absent_directive_is_not_an_error() {
        let found = locate_source_map("console.log(1);", &script_url(), None).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_inline_base64_map() {
        // {"version":3}
        let js = "x();\n//# sourceMappingURL=data:application/json;base64,eyJ2ZXJzaW9uIjozfQ==";
        let found = locate_source_map(js, &script_url(), None).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::Inline(br#"{"version":3}"#.to_vec()))
        );
    }

    #[test]
    fn test_inline_map_with_charset_and_no_padding() {
        let js = "//# sourceMappingURL=data:application/json;charset=utf-8;base64,eyJ2ZXJzaW9uIjozfQ";
        let found = locate_source_map(js, &script_url(), None).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::Inline(br#"{"version":3}"#.to_vec()))
        );
    }

    #[test]
    fn test_inline_percent_encoded_map() {
        let js = "//# sourceMappingURL=data:application/json,%7B%22version%22%3A3%7D";
        let found = locate_source_map(js, &script_url(), None).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::Inline(br#"{"version":3}"#.to_vec()))
        );
    }

    #[test]
    fn test_inline_raw_json_map() {
        let json = r#"{"version":3,"sources":["a.js"],"sourcesContent":["let a = 'x y';"]}"#;
        let js = format!("a();\n//# sourceMappingURL=data:application/json,{}\n", json);
        let found = locate_source_map(&js, &script_url(), None).unwrap();
        assert_eq!(found, Some(SourceMapDescriptor::Inline(json.as_bytes().to_vec())));

        let Some(SourceMapDescriptor::Inline(bytes)) = found else {
            panic!("expected inline map");
        };
        let map = crate::parser::parse_source_map(&bytes).unwrap();
        assert_eq!(map.sources_content, vec![Some("let a = 'x y';".to_string())]);

        let block = format!("a();\n/*# sourceMappingURL=data:application/json,{} */", json);
        assert_eq!(find_directive(&block), Some(format!("data:application/json,{}", json).as_str()));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let js = "//# sourceMappingURL=data:application/json;base64,!!!not-base64!!!";
        let err = locate_source_map(js, &script_url(), None).unwrap_err();
        assert!(matches!(err, GrabError::MalformedMap(_)));
    }

    #[test]
    fn test_header_fallback() {
        let found = locate_source_map("x();", &script_url(), Some("/maps/app.js.map")).unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::External(
                Url::parse("https://example.com/maps/app.js.map").unwrap()
            ))
        );

        // Directive takes precedence over the header
        let found = locate_source_map(
            "x();\n//# sourceMappingURL=app.js.map",
            &script_url(),
            Some("/maps/app.js.map"),
        )
        .unwrap();
        assert_eq!(
            found,
            Some(SourceMapDescriptor::External(
                Url::parse("https://example.com/static/js/app.js.map").unwrap()
            ))
        );
    }
}
