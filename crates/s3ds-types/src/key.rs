use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Lexically clean a slash-separated path.
///
/// Collapses repeated slashes, drops `.` segments, resolves `..` against the
/// preceding segment and removes trailing slashes. A rooted path stays rooted
/// (`..` at the root is dropped); an empty relative result becomes `"."`.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".into();
    }
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let body = out.join("/");
    if rooted {
        format!("/{body}")
    } else if body.is_empty() {
        ".".into()
    } else {
        body
    }
}

/// Hierarchical logical identifier for a stored value.
///
/// A `Key` is always rooted and clean: `"a//b/"` and `"/a/./b"` both become
/// `/a/b`. Keys are supplied by callers and never generated by the store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Create a key from any path-like string, cleaning it.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(clean_path(&format!("/{}", raw.as_ref())))
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self("/".into())
    }

    /// Returns `true` if this is the root key.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The cleaned string form, always starting with `/`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (empty for the root key).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Path segments from the root down.
    pub fn namespaces(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// The key one level up.
    pub fn parent(&self) -> Result<Key, TypeError> {
        if self.is_root() {
            return Err(TypeError::NoParent(self.0.clone()));
        }
        let cut = self.0.rfind('/').unwrap_or(0);
        Ok(Key::new(&self.0[..cut]))
    }

    /// Append one segment below this key.
    pub fn child(&self, segment: &str) -> Result<Key, TypeError> {
        if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
            return Err(TypeError::InvalidSegment(segment.to_string()));
        }
        Ok(Key::new(format!("{}/{}", self.0, segment)))
    }

    /// Returns `true` if `other` lives strictly below this key.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key::new(raw)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
