//! Sed-like path rewriting for outbound routes.
//!
//! Routes may carry a `pathTransform` expression of the form
//! `s/<from>/<to>[/g]`, where slashes inside `<from>` or `<to>` are escaped
//! as `\/`. `<from>` is a regular expression; the trailing `g` makes the
//! replacement global.

use hie_router_core::{HttpTarget, RouterError};
use regex::Regex;

// Escaped slashes are masked with NUL before splitting; a valid request path
// can never contain it.
const SLASH_SENTINEL: char = '\u{0}';

/// Apply a `s/<from>/<to>[/g]` expression to a request path.
///
/// # Errors
///
/// Returns [`RouterError::InvalidPathTransform`] when the expression has
/// fewer than two segments or `<from>` does not compile as a regular
/// expression.
pub fn transform(path: &str, expression: &str) -> Result<String, RouterError> {
    let invalid = || RouterError::InvalidPathTransform {
        expression: expression.to_string(),
    };

    let masked = expression.replace("\\/", "\u{0}");
    let segments: Vec<&str> = masked.split('/').collect();
    if segments.len() < 2 {
        return Err(invalid());
    }

    let from = segments[1].replace(SLASH_SENTINEL, "/");
    let to = segments
        .get(2)
        .copied()
        .unwrap_or("")
        .replace(SLASH_SENTINEL, "/");
    let global = segments.get(3).copied() == Some("g");

    let pattern = Regex::new(&from).map_err(|_| invalid())?;
    Ok(if global {
        pattern.replace_all(path, to.as_str()).into_owned()
    } else {
        pattern.replace(path, to.as_str()).into_owned()
    })
}

/// The outbound path for an HTTP target: the transformed inbound path when a
/// `pathTransform` is set, the target's literal path when one is set, the
/// inbound path otherwise.
///
/// # Errors
///
/// Returns [`RouterError::InvalidPathTransform`] for a malformed expression.
pub fn effective_path(inbound: &str, target: &HttpTarget) -> Result<String, RouterError> {
    if let Some(expression) = &target.path_transform {
        transform(inbound, expression)
    } else if let Some(path) = &target.path {
        Ok(path.clone())
    } else {
        Ok(inbound.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_first_match_without_global_flag() {
        assert_eq!(transform("/a/b/a", "s/a/z").unwrap(), "/z/b/a");
    }

    #[test]
    fn replaces_every_match_with_global_flag() {
        assert_eq!(transform("/a/b/a", "s/a/z/g").unwrap(), "/z/b/z");
    }

    #[test]
    fn identity_expression_leaves_the_path_unchanged() {
        for path in ["/", "/x", "/fhir/Patient/123", "/x/x/x"] {
            assert_eq!(transform(path, "s/x/x").unwrap(), path);
        }
    }

    #[test]
    fn escaped_slashes_are_matched_literally() {
        assert_eq!(transform("/a/b", r"s/\//-/g").unwrap(), "-a-b");
    }

    #[test]
    fn escaped_slashes_are_restored_in_the_replacement() {
        assert_eq!(
            transform("/registry/lookup", r"s/registry/registry\/v2").unwrap(),
            "/registry/v2/lookup"
        );
    }

    #[test]
    fn regex_from_segment_is_honoured() {
        assert_eq!(
            transform("/api/v1/Patient", "s/v[0-9]+/v2").unwrap(),
            "/api/v2/Patient"
        );
    }

    #[test]
    fn missing_from_segment_is_rejected() {
        assert!(matches!(
            transform("/a", "nonsense"),
            Err(RouterError::InvalidPathTransform { .. })
        ));
    }

    #[test]
    fn unparseable_pattern_is_rejected() {
        assert!(matches!(
            transform("/a", "s/[/x"),
            Err(RouterError::InvalidPathTransform { .. })
        ));
    }

    #[test]
    fn effective_path_prefers_the_transform() {
        let target = HttpTarget::new("h", 80)
            .with_path("/static")
            .with_path_transform("s/a/z/g");
        assert_eq!(effective_path("/a/b/a", &target).unwrap(), "/z/b/z");
    }

    #[test]
    fn effective_path_falls_back_to_the_literal_path() {
        let target = HttpTarget::new("h", 80).with_path("/static");
        assert_eq!(effective_path("/a/b", &target).unwrap(), "/static");
    }

    #[test]
    fn effective_path_defaults_to_the_inbound_path() {
        let target = HttpTarget::new("h", 80);
        assert_eq!(effective_path("/a/b", &target).unwrap(), "/a/b");
    }
}
