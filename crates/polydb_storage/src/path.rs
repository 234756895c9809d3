//! Mapping between type names / identities and single path components.
//!
//! Bytes outside `[A-Za-z0-9._-]` become `%XX`, and so does a leading `.`,
//! so `.`/`..` and separators can never escape the root. Plain ids stay
//! readable on disk.

use crate::error::{StorageError, StorageResult};

/// Suffix of in-flight write files. `%t` is never produced by [`encode`].
pub(crate) const TEMP_SUFFIX: &str = "%tmp";

fn is_plain(byte: u8, first: bool) -> bool {
    match byte {
        b'.' => !first,
        b'-' | b'_' => true,
        _ => byte.is_ascii_alphanumeric(),
    }
}

/// Encodes `name` as one path component.
pub(crate) fn encode(name: &str) -> StorageResult<String> {
    if name.is_empty() {
        return Err(StorageError::invalid_key("name must not be empty"));
    }

    let mut out = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        if is_plain(byte, i == 0) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    Ok(out)
}

/// Reverses [`encode`].
pub(crate) fn decode(component: &str) -> StorageResult<String> {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = component
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| {
                    StorageError::Corrupted(format!("bad escape in file name {component:?}"))
                })?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out)
        .map_err(|_| StorageError::Corrupted(format!("file name {component:?} is not UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_names_are_unchanged() {
        assert_eq!(encode("demo.Person").unwrap(), "demo.Person");
        assert_eq!(
            encode("364f9d08-dcfe-45a3-a75a-f25164d1f933").unwrap(),
            "364f9d08-dcfe-45a3-a75a-f25164d1f933"
        );
    }

    #[test]
    fn separators_and_dots_are_escaped() {
        assert_eq!(encode("podcasts/herdingcode").unwrap(), "podcasts%2Fherdingcode");
        assert_eq!(encode("..").unwrap(), "%2E.");
        assert_eq!(encode("demo::Cat").unwrap(), "demo%3A%3ACat");
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(encode(""), Err(StorageError::InvalidKey { .. })));
    }

    #[test]
    fn bad_escape_is_corruption() {
        assert!(matches!(decode("abc%zz"), Err(StorageError::Corrupted(_))));
        assert!(matches!(decode("abc%tmp"), Err(StorageError::Corrupted(_))));
        assert!(matches!(decode("abc%4"), Err(StorageError::Corrupted(_))));
    }

    proptest! {
        #[test]
        fn decode_reverses_encode(name in "\\PC{1,40}") {
            let encoded = encode(&name).unwrap();
            prop_assert!(!encoded.contains('/'));
            prop_assert!(!encoded.ends_with(TEMP_SUFFIX));
            prop_assert_eq!(decode(&encoded).unwrap(), name);
        }
    }
}
