use s3ds_types::{clean_path, Key};

/// Translates logical keys to object paths under a root directory and back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathMapper {
    root: String,
}

impl PathMapper {
    /// An empty root (or `"."`) maps keys to object paths verbatim.
    pub fn new(root: &str) -> Self {
        let root = match clean_path(root).as_str() {
            "." => String::new(),
            cleaned => cleaned.to_string(),
        };
        Self { root }
    }

    /// The cleaned root directory.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Join `key` under the root with slash-path semantics.
    pub fn to_remote_path(&self, key: &str) -> String {
        match (self.root.is_empty(), key.is_empty()) {
            (true, true) => String::new(),
            (true, false) => clean_path(key),
            (false, true) => self.root.clone(),
            (false, false) => clean_path(&format!("{}/{}", self.root, key)),
        }
    }

    /// Object path for a key.
    pub fn path_of(&self, key: &Key) -> String {
        self.to_remote_path(key.as_str())
    }

    /// Listing prefix for a query prefix.
    ///
    /// An empty or root prefix lists the whole root directory, so a trailing
    /// slash is kept to avoid matching sibling directories that merely share
    /// the root's name as a prefix.
    pub fn list_prefix(&self, prefix: &str) -> String {
        let path = self.to_remote_path(prefix);
        if Key::new(prefix).is_root() && !path.is_empty() && !path.ends_with('/') {
            format!("{path}/")
        } else {
            path
        }
    }

    /// Recover the logical key of a listed object path.
    pub fn to_key(&self, remote_path: &str) -> Key {
        if self.root.is_empty() {
            return Key::new(remote_path);
        }
        let relative = remote_path
            .strip_prefix(self.root.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/') || self.root.ends_with('/'))
            .unwrap_or(remote_path);
        Key::new(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn joins_under_root() {
        let paths = PathMapper::new("data/");
        assert_eq!(paths.root(), "data");
        assert_eq!(paths.path_of(&Key::new("/a/b")), "data/a/b");
        assert_eq!(paths.to_remote_path(""), "data");
    }

    #[test]
    fn empty_root_keeps_leading_slash() {
        let paths = PathMapper::new("");
        assert_eq!(paths.path_of(&Key::new("/a/b")), "/a/b");
        assert_eq!(paths.to_remote_path(""), "");
    }

    #[test]
    fn rooted_root() {
        let paths = PathMapper::new("/srv//store/");
        assert_eq!(paths.path_of(&Key::new("/x")), "/srv/store/x");
        assert_eq!(paths.to_key("/srv/store/x"), Key::new("/x"));
    }

    #[test]
    fn slash_root() {
        let paths = PathMapper::new("/");
        assert_eq!(paths.path_of(&Key::new("/a")), "/a");
        assert_eq!(paths.to_key("/a"), Key::new("/a"));
    }

    #[test]
    fn list_prefix_for_whole_root() {
        let paths = PathMapper::new("data");
        assert_eq!(paths.list_prefix(""), "data/");
        assert_eq!(paths.list_prefix("/"), "data/");
        assert_eq!(paths.list_prefix("/a"), "data/a");
        assert_eq!(PathMapper::new("").list_prefix(""), "");
    }

    #[test]
    fn to_key_ignores_sibling_directories() {
        let paths = PathMapper::new("data");
        assert_eq!(paths.to_key("data/a/b"), Key::new("/a/b"));
        assert_eq!(paths.to_key("database/x"), Key::new("/database/x"));
    }

    proptest! {
        #[test]
        fn to_key_inverts_path_of(
            root in "[a-z]{0,6}(/[a-z]{1,6}){0,2}",
            raw in "(/[a-z0-9]{1,8}){1,4}",
        ) {
            let paths = PathMapper::new(&root);
            let key = Key::new(&raw);
            prop_assert_eq!(paths.to_key(&paths.path_of(&key)), key);
        }
    }
}
