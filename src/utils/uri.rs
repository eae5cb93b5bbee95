//! Redirect-URI canonicalization for equality checks (C1).
//!
//! Two redirect URIs are considered equal at the protocol boundary iff
//! their normalized forms are byte-equal. Normalization strips a trailing
//! slash from the path only; scheme, host, port, query and fragment are
//! left untouched (lowercasing the host, since DNS names are
//! case-insensitive).

/// Normalize a URI for equality comparison.
///
/// `https://a.com/cb/` and `https://a.com/cb` normalize to the same value;
/// `https://a.com/cb?x=1` and `https://a.com/cb` do not.
pub fn normalize(uri: &str) -> String {
    let (before_fragment, fragment) = match uri.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (uri, None),
    };
    let (before_query, query) = match before_fragment.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (before_fragment, None),
    };

    let (scheme, rest) = match before_query.split_once("://") {
        Some((s, r)) => (Some(s), r),
        None => (None, before_query),
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let mut normalized_path = path.to_string();
    if normalized_path.len() > 1 && normalized_path.ends_with('/') {
        normalized_path.pop();
    }

    let mut out = String::new();
    if let Some(scheme) = scheme {
        out.push_str(&scheme.to_lowercase());
        out.push_str("://");
    }
    out.push_str(&authority.to_lowercase());
    out.push_str(&normalized_path);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Whether two redirect URIs are equal after normalization.
pub fn uris_equal(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized_away() {
        assert_eq!(
            normalize("https://a.com/cb/"),
            normalize("https://a.com/cb")
        );
    }

    #[test]
    fn host_is_case_insensitive() {
        assert_eq!(
            normalize("https://RP.Test/cb"),
            normalize("https://rp.test/cb")
        );
    }

    #[test]
    fn query_and_fragment_are_preserved() {
        assert_eq!(normalize("https://a.com/cb?x=1"), "https://a.com/cb?x=1");
        assert_eq!(normalize("https://a.com/cb#frag"), "https://a.com/cb#frag");
    }

    #[test]
    fn query_differences_are_not_equal() {
        assert!(!uris_equal(
            "https://a.com/cb?x=1",
            "https://a.com/cb?x=2"
        ));
    }

    #[test]
    fn root_path_slash_is_preserved() {
        assert_eq!(normalize("https://a.com/"), "https://a.com/");
    }

    #[test]
    fn uris_equal_mismatch() {
        assert!(!uris_equal("https://rp.test/cb", "https://rp.test/cb2"));
    }
}
