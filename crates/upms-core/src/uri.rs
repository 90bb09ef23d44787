//! URI parsing and classification.
//!
//! A URI is split into scheme, authority, path and query. Classification
//! depends only on those parts, so [`classify`] is pure and total: every
//! input maps to exactly one [`UriClass`], with [`UriClass::Invalid`] as the
//! fallback callers must reject.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DOCS_AUTHORITY, MEDIA_AUTHORITY};

/// Marker separating a distributed docs path from its network id.
pub const NETWORK_ID_MARK: &str = "?networkid=";

/// Backend class of a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UriClass {
    /// `file://<bundle>/...` owned by an application.
    FileBundle,
    /// `file://docs/...` on the local device.
    FileDocs,
    /// `file://docs/...?networkid=<id>` on a remote device.
    FileDocsCloud,
    /// `file://media/...` or `content://media/...`.
    Media,
    /// `content://<provider>/...` handled by the collaborator.
    Content,
    /// Anything else.
    Invalid,
}

impl UriClass {
    /// Classes materialized through the ledger and share files.
    pub const fn is_file(&self) -> bool {
        matches!(
            self,
            UriClass::FileBundle | UriClass::FileDocs | UriClass::FileDocsCloud
        )
    }
}

/// A parsed URI. The original string is kept verbatim as the ledger key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    raw: String,
    scheme_end: Option<usize>,
    authority: (usize, usize),
    path: (usize, usize),
}

impl Uri {
    /// Parse a URI string. Parsing never fails; malformed input yields
    /// empty components and classifies as [`UriClass::Invalid`].
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let scheme_end = raw
            .find(':')
            .filter(|&i| i > 0 && raw[..i].chars().all(is_scheme_char));

        let rest_start = scheme_end.map(|i| i + 1).unwrap_or(0);
        let mut authority = (rest_start, rest_start);
        let mut path_start = rest_start;

        if raw[rest_start..].starts_with("//") {
            let auth_start = rest_start + 2;
            let auth_end = raw[auth_start..]
                .find(&['/', '?', '#'][..])
                .map(|i| auth_start + i)
                .unwrap_or(raw.len());
            authority = (auth_start, auth_end);
            path_start = auth_end;
        }

        let path_end = raw[path_start..]
            .find(&['?', '#'][..])
            .map(|i| path_start + i)
            .unwrap_or(raw.len());

        Self {
            raw,
            scheme_end,
            authority,
            path: (path_start, path_end),
        }
    }

    /// The full URI string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Scheme, or an empty string when absent.
    pub fn scheme(&self) -> &str {
        match self.scheme_end {
            Some(end) => &self.raw[..end],
            None => "",
        }
    }

    /// Authority, or an empty string when absent.
    pub fn authority(&self) -> &str {
        &self.raw[self.authority.0..self.authority.1]
    }

    /// Path component.
    pub fn path(&self) -> &str {
        &self.raw[self.path.0..self.path.1]
    }

    /// Carries the distributed network-id marker.
    pub fn has_network_id(&self) -> bool {
        self.raw.contains(NETWORK_ID_MARK)
    }

    /// `scheme:authority`, used in audit events so paths never leave the
    /// service.
    pub fn scheme_authority(&self) -> String {
        format!("{}:{}", self.scheme(), self.authority())
    }

    /// Classify this URI.
    pub fn class(&self) -> UriClass {
        classify(self)
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uri({}://{}/..)", self.scheme(), self.authority())
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Uri {
    fn from(raw: &str) -> Self {
        Uri::parse(raw)
    }
}

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'
}

/// Classify a URI by scheme and authority.
pub fn classify(uri: &Uri) -> UriClass {
    let authority = uri.authority();
    match uri.scheme() {
        "file" => match authority {
            "" => UriClass::Invalid,
            MEDIA_AUTHORITY => UriClass::Media,
            DOCS_AUTHORITY if uri.has_network_id() => UriClass::FileDocsCloud,
            DOCS_AUTHORITY => UriClass::FileDocs,
            _ => UriClass::FileBundle,
        },
        "content" => match authority {
            "" => UriClass::Invalid,
            MEDIA_AUTHORITY => UriClass::Media,
            _ => UriClass::Content,
        },
        _ => UriClass::Invalid,
    }
}

/// Split a distributed URI into `(path part, network-id suffix)`.
pub fn split_network_id(uri: &str) -> Option<(&str, &str)> {
    uri.find(NETWORK_ID_MARK).map(|pos| uri.split_at(pos))
}

/// True if `query` lies strictly under the directory `cached` and both carry
/// the same network id.
pub fn is_distributed_subdir(query: &str, cached: &str) -> bool {
    let (Some((q_path, q_net)), Some((c_path, c_net))) =
        (split_network_id(query), split_network_id(cached))
    else {
        return false;
    };
    q_net == c_net
        && q_path.len() > c_path.len()
        && q_path.starts_with(c_path)
        && q_path.as_bytes()[c_path.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_components() {
        let uri = Uri::parse("file://com.example.app/data/storage/a.txt");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.authority(), "com.example.app");
        assert_eq!(uri.path(), "/data/storage/a.txt");
    }

    #[test]
    fn test_parse_docs_cloud() {
        let uri = Uri::parse("file://docs/storage/a?networkid=abc");
        assert_eq!(uri.authority(), "docs");
        assert_eq!(uri.path(), "/storage/a");
        assert!(uri.has_network_id());
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            ("file://bundleA/x", UriClass::FileBundle),
            ("file://docs/x?networkid=1", UriClass::FileDocsCloud),
            ("file://docs/x", UriClass::FileDocs),
            ("file://media/x", UriClass::Media),
            ("content://media/x", UriClass::Media),
            ("content://provider/x", UriClass::Content),
            ("http://x", UriClass::Invalid),
            ("file:///x", UriClass::Invalid),
            ("", UriClass::Invalid),
            ("no scheme here", UriClass::Invalid),
        ];
        for (raw, expected) in cases {
            assert_eq!(classify(&Uri::parse(raw)), expected, "{raw}");
        }
    }

    #[test]
    fn test_scheme_authority() {
        assert_eq!(
            Uri::parse("content://provider/x").scheme_authority(),
            "content:provider"
        );
    }

    #[test]
    fn test_distributed_subdir() {
        let parent = "file://docs/path?networkid=N";
        assert!(is_distributed_subdir("file://docs/path/sub/child.txt?networkid=N", parent));
        assert!(!is_distributed_subdir("file://docs/path/sub/child.txt?networkid=M", parent));
        assert!(!is_distributed_subdir("file://docs/pathology?networkid=N", parent));
        assert!(!is_distributed_subdir("file://docs/path?networkid=N", parent));
        assert!(!is_distributed_subdir("file://docs/path/sub", parent));
    }

    proptest! {
        #[test]
        fn test_parse_never_panics(raw in ".{0,64}") {
            let uri = Uri::parse(raw.clone());
            prop_assert_eq!(uri.as_str(), raw.as_str());
            let _ = classify(&uri);
        }

        #[test]
        fn test_non_file_content_is_invalid(scheme in "[a-z]{1,8}", rest in "[a-z/]{0,16}") {
            prop_assume!(scheme != "file" && scheme != "content");
            let uri = Uri::parse(format!("{scheme}://{rest}"));
            prop_assert_eq!(classify(&uri), UriClass::Invalid);
        }
    }
}
