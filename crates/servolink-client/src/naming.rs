//! Service name resolution.
//!
//! Turns the name a caller passes to a client into the fully qualified form
//! the transport sees:
//!
//! - `/a/b` is already absolute and kept as is
//! - `b` is relative and prefixed with the node namespace (`/ns/b`)
//! - `~/b` is private and prefixed with namespace and node name
//!   (`/ns/node/b`)
//!
//! In the root namespace `add_two_ints` resolves to `/add_two_ints`.

use std::fmt;

use crate::{allocator::Block, error::ClientError};

/// Separator between name tokens.
pub const SEPARATOR: char = '/';

/// Prefix marking a node-private name.
pub const PRIVATE_PREFIX: char = '~';

/// A fully qualified service name, borrowed from the caller's name and the
/// node's identity.
///
/// Nothing is allocated until the name is written into a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedName<'n> {
    pieces: [&'n str; 5],
}

impl ResolvedName<'_> {
    /// Length of the name in bytes.
    pub fn len(&self) -> usize {
        self.pieces.iter().map(|piece| piece.len()).sum()
    }

    /// Always `false` for a resolved name.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Characters of the name, in order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.pieces.iter().flat_map(|piece| piece.chars())
    }

    /// Write the name into `block`, or leave it untouched and return `false`
    /// if it does not fit.
    pub fn write_into(&self, block: &mut Block) -> bool {
        if self.len() > block.remaining() {
            return false;
        }
        self.pieces.iter().all(|piece| block.try_extend(piece.as_bytes()))
    }
}

impl fmt::Display for ResolvedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pieces.iter().try_for_each(|piece| f.write_str(piece))
    }
}

/// Resolve `name` against a node's name and namespace.
///
/// # Errors
///
/// - `ClientError::InvalidArgument` if `name` is empty
/// - `ClientError::ServiceNameInvalid` if the name (after expansion) contains
///   characters other than ASCII alphanumerics, `_` and `/`, an empty token,
///   a token starting with a digit, or a trailing separator
pub fn resolve_service_name<'n>(
    name: &'n str,
    node_name: &'n str,
    namespace: &'n str,
) -> Result<ResolvedName<'n>, ClientError> {
    if name.is_empty() {
        return Err(ClientError::InvalidArgument("service name is empty".into()));
    }

    let invalid = |reason| ClientError::ServiceNameInvalid { name: name.to_string(), reason };

    let [sep, namespace] = namespace_prefix(namespace);
    let pieces = if let Some(rest) = name.strip_prefix(PRIVATE_PREFIX) {
        if !rest.is_empty() && !rest.starts_with(SEPARATOR) {
            return Err(invalid("'~' must be followed by '/' or end the name"));
        }
        [sep, namespace, "/", node_name, rest]
    } else if name.starts_with(SEPARATOR) {
        [name, "", "", "", ""]
    } else {
        [sep, namespace, "/", name, ""]
    };

    let resolved = ResolvedName { pieces };
    validate_fully_qualified(resolved.chars()).map_err(invalid)?;

    debug_assert!(resolved.chars().next() == Some(SEPARATOR));
    Ok(resolved)
}

/// Leading `/namespace` pieces. An empty namespace is the root.
fn namespace_prefix(namespace: &str) -> [&str; 2] {
    let namespace = namespace.trim_end_matches(SEPARATOR);
    let namespace = namespace.strip_prefix(SEPARATOR).unwrap_or(namespace);

    if namespace.is_empty() { ["", ""] } else { ["/", namespace] }
}

fn validate_fully_qualified(mut chars: impl Iterator<Item = char>) -> Result<(), &'static str> {
    if chars.next() != Some(SEPARATOR) {
        return Err("name is not absolute");
    }

    let mut tokens = 0usize;
    let mut token_len = 0usize;
    for c in chars {
        if c == SEPARATOR {
            if token_len == 0 {
                return Err("name contains an empty token");
            }
            tokens += 1;
            token_len = 0;
            continue;
        }
        if token_len == 0 && c.is_ascii_digit() {
            return Err("token must not start with a digit");
        }
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return Err("name contains characters other than alphanumerics and '_'");
        }
        token_len += 1;
    }

    match (tokens, token_len) {
        (0, 0) => Err("name has no tokens"),
        (_, 0) => Err("name must not end with '/'"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn resolve(name: &str, node: &str, namespace: &str) -> Result<String, ErrorKind> {
        resolve_service_name(name, node, namespace).map(|n| n.to_string()).map_err(|e| e.kind())
    }

    #[test]
    fn relative_name_in_root_namespace() {
        assert_eq!(resolve("add_two_ints", "node", ""), Ok("/add_two_ints".to_string()));
        assert_eq!(resolve("add_two_ints", "node", "/"), Ok("/add_two_ints".to_string()));
    }

    #[test]
    fn relative_name_in_nested_namespace() {
        assert_eq!(resolve("add", "node", "/robot/arm"), Ok("/robot/arm/add".to_string()));
        assert_eq!(resolve("add", "node", "robot/"), Ok("/robot/add".to_string()));
    }

    #[test]
    fn absolute_name_is_kept() {
        assert_eq!(resolve("/global/add", "node", "/robot"), Ok("/global/add".to_string()));
    }

    #[test]
    fn private_name_expands_node() {
        assert_eq!(resolve("~/reset", "driver", "/robot"), Ok("/robot/driver/reset".to_string()));
        assert_eq!(resolve("~", "driver", ""), Ok("/driver".to_string()));
    }

    #[test]
    fn empty_name_is_invalid_argument() {
        assert_eq!(resolve("", "node", ""), Err(ErrorKind::InvalidArgument));
    }

    #[test]
    fn malformed_names_are_rejected() {
        for name in ["a//b", "a/", "/", "1abc", "a/2b", "sp ace", "dash-ed", "~x"] {
            assert_eq!(
                resolve(name, "node", ""),
                Err(ErrorKind::ServiceNameInvalid),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn writes_exactly_its_length() {
        let resolved = resolve_service_name("~/reset", "driver", "/robot").expect("resolve");
        assert_eq!(resolved.len(), "/robot/driver/reset".len());

        let mut block = Block::with_capacity(resolved.len());
        assert!(resolved.write_into(&mut block));
        assert_eq!(block.as_slice(), b"/robot/driver/reset");
    }

    #[test]
    fn short_block_is_left_untouched() {
        let resolved = resolve_service_name("add_two_ints", "node", "").expect("resolve");

        let mut block = Block::with_capacity(resolved.len() - 1);
        assert!(!resolved.write_into(&mut block));
        assert!(block.is_empty());
    }

    #[test]
    fn trailing_separator_after_private_prefix_is_rejected() {
        assert_eq!(resolve("~/", "driver", ""), Err(ErrorKind::ServiceNameInvalid));
    }
}
