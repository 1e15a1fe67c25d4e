//! Dot-delimited key paths
//!
//! A key path addresses a node from the top of the tree, e.g. `kubectl.get`.
//! Runtime arguments travel through the same pipeline as path segments, so a
//! literal `.` inside an argument is swapped for [`PLACEHOLDER`] on the way in
//! and restored on the way out.

use crate::error::{AliError, AliResult};

pub const DELIMITER: char = '.';
pub const PLACEHOLDER: &str = "%2E";

pub fn split(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(DELIMITER).map(String::from).collect()
}

pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Split `path`, rejecting empty paths and empty segments
pub fn validate(path: &str) -> AliResult<Vec<String>> {
    if path.trim().is_empty() {
        return Err(AliError::InvalidPath {
            path: path.to_string(),
            reason: "key path is empty".to_string(),
        });
    }
    let segments = split(path);
    if let Some(pos) = segments.iter().position(|s| s.trim().is_empty()) {
        return Err(AliError::InvalidPath {
            path: path.to_string(),
            reason: format!("segment {} is empty", pos + 1),
        });
    }
    Ok(segments)
}

/// The n-th segment, with `n` clamped to the last one
pub fn segment_at(path: &str, n: usize) -> String {
    let segments = split(path);
    match segments.len() {
        0 => String::new(),
        len => segments[n.min(len - 1)].clone(),
    }
}

pub fn drop_first(path: &str, n: usize) -> String {
    let segments = split(path);
    let n = n.min(segments.len());
    join(&segments[n..])
}

pub fn drop_last(path: &str, n: usize) -> String {
    let segments = split(path);
    let keep = segments.len().saturating_sub(n);
    join(&segments[..keep])
}

pub fn encode<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.as_ref().replace(DELIMITER, PLACEHOLDER))
        .collect()
}

pub fn decode<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.as_ref().replace(PLACEHOLDER, &DELIMITER.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vos;

    #[test]
    fn test_split_and_join() {
        assert_eq!(split("a.b.c"), vos!["a", "b", "c"]);
        assert_eq!(join(&["a", "b", "c"]), "a.b.c");
        assert!(split("").is_empty());
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("one.two").unwrap(), vos!["one", "two"]);
        assert!(matches!(validate(""), Err(AliError::InvalidPath { .. })));
        assert!(matches!(validate("a..b"), Err(AliError::InvalidPath { .. })));
        assert!(matches!(validate(".a"), Err(AliError::InvalidPath { .. })));
        assert!(matches!(validate("a."), Err(AliError::InvalidPath { .. })));
    }

    #[test]
    fn test_segment_at_clamps() {
        assert_eq!(segment_at("a.b.c", 0), "a");
        assert_eq!(segment_at("a.b.c", 1), "b");
        assert_eq!(segment_at("a.b.c", 2), "c");
        assert_eq!(segment_at("a.b.c", 42), "c");
        assert_eq!(segment_at("", 3), "");
    }

    #[test]
    fn test_drop_first_and_last() {
        assert_eq!(drop_first("a.b.c", 1), "b.c");
        assert_eq!(drop_first("a.b.c", 3), "");
        assert_eq!(drop_first("a.b.c", 9), "");
        assert_eq!(drop_first("a.b.c", 0), "a.b.c");
        assert_eq!(drop_last("a.b.c", 1), "a.b");
        assert_eq!(drop_last("a.b.c", 3), "");
        assert_eq!(drop_last("a.b.c", 9), "");
        assert_eq!(drop_last("", 1), "");
    }

    #[test]
    fn test_encode_hides_delimiter() {
        let encoded = encode(&["file.txt", "plain"]);
        assert_eq!(encoded, vos!["file%2Etxt", "plain"]);
        let path = join(&[vec!["k".to_string()], encoded].concat());
        assert_eq!(split(&path).len(), 3);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cases: Vec<Vec<String>> = vec![
            vec![],
            vos![""],
            vos!["a.b.c", "..", "no-dots", "trailing."],
            vos!["192.168.0.1", "--flag=v1.2", "spaces in . arg"],
        ];
        for args in cases {
            assert_eq!(decode(&encode(&args)), args);
        }
    }
}
