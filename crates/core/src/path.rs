//! Path joining and storage-prefix parsing
//!
//! Folders resolve object names by path joining, never by raw string
//! concatenation that could cross a separator boundary. Two join modes
//! exist: the canonical one, and a compatibility mode that preserves
//! unusual legacy prefixes verbatim.

use url::Url;

use crate::error::{Error, Result};

/// Canonical join: collapses duplicate separators, strips separators at
/// the boundary, and keeps a leading `/` root on the left operand.
pub fn join(one: &str, another: &str) -> String {
    let root = if one.starts_with('/') { "/" } else { "" };
    let joined = one
        .split('/')
        .chain(another.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("{root}{joined}")
}

/// Compatibility join for legacy prefixes: trims a single trailing
/// separator from the left operand and a single leading separator from
/// the right operand, preserving everything else (including doubled
/// separators mid-path) exactly as given.
pub fn join_raw(one: &str, another: &str) -> String {
    let left = one.strip_suffix('/').unwrap_or(one);
    let right = another.strip_prefix('/').unwrap_or(another);
    format!("{left}/{right}")
}

/// Joins per the folder's prefix-normalization flag.
pub fn resolve(base: &str, relative: &str, normalize: bool) -> String {
    if normalize {
        join(base, relative)
    } else {
        join_raw(base, relative)
    }
}

/// Ensures a single trailing separator; empty paths stay empty so a
/// bucket root lists without a stray leading `/`.
pub fn add_delimiter(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Splits a `scheme://bucket/path` storage prefix into bucket and path.
///
/// With `normalize` the path is cleaned through [`join`]; without it the
/// path is preserved verbatim apart from a single leading separator, for
/// compatibility with legacy prefixes like `gs://bucket//odd//path`.
pub fn parse_prefix(prefix: &str, normalize: bool) -> Result<(String, String)> {
    let parsed = Url::parse(prefix)
        .map_err(|err| Error::config("prefix", format!("unable to parse '{prefix}': {err}")))?;
    let bucket = parsed
        .host_str()
        .ok_or_else(|| Error::config("prefix", format!("no bucket in '{prefix}'")))?
        .to_string();

    let raw = parsed.path();
    let path = if normalize {
        join("", raw)
    } else {
        raw.strip_prefix('/').unwrap_or(raw).to_string()
    };
    Ok((bucket, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_strips_boundary_separators() {
        assert_eq!(join("a/b/", "/c"), "a/b/c");
        assert_eq!(join("a", "c"), "a/c");
    }

    #[test]
    fn test_join_collapses_duplicate_separators() {
        assert_eq!(join("a//b", "c"), "a/b/c");
        assert_eq!(join("a/b", "c//d/"), "a/b/c/d");
    }

    #[test]
    fn test_join_keeps_absolute_root() {
        assert_eq!(join("/backups/db", "base_0001"), "/backups/db/base_0001");
        assert_eq!(join("/", "x"), "/x");
    }

    #[test]
    fn test_join_raw_preserves_inner_separators() {
        assert_eq!(join_raw("a//b", "/c"), "a//b/c");
        assert_eq!(join_raw("a//b/", "c"), "a//b/c");
        assert_eq!(join_raw("a", "c"), "a/c");
    }

    #[test]
    fn test_join_raw_trims_one_separator_per_side() {
        // Only a single boundary separator is trimmed on each operand.
        assert_eq!(join_raw("a//", "//c"), "a///c");
    }

    #[test]
    fn test_add_delimiter() {
        assert_eq!(add_delimiter("a/b"), "a/b/");
        assert_eq!(add_delimiter("a/b/"), "a/b/");
        assert_eq!(add_delimiter(""), "");
    }

    #[test]
    fn test_parse_prefix_normalized() {
        let (bucket, path) = parse_prefix("s3://test-bucket/backups//db/", true).unwrap();
        assert_eq!(bucket, "test-bucket");
        assert_eq!(path, "backups/db");
    }

    #[test]
    fn test_parse_prefix_verbatim() {
        let (bucket, path) =
            parse_prefix("gs://legacy-bucket//archive////strange_folder", false).unwrap();
        assert_eq!(bucket, "legacy-bucket");
        assert_eq!(path, "/archive////strange_folder");
    }

    #[test]
    fn test_parse_prefix_rejects_garbage() {
        let err = parse_prefix("not a url", true).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
