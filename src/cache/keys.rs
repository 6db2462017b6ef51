//! Cache key namespaces.
//!
//! Keys are `murmur:<namespace>:<identity>`, a deterministic function of the
//! entity kind and its identifier (or author, for first pages).

use crate::domain::ids::{PostId, UserId};

const KEY_PREFIX: &str = "murmur";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// A single post keyed by its identifier.
    Posts,
    /// An author's canonical first page.
    FirstPage,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Posts => "posts",
            CacheNamespace::FirstPage => "fppack",
        }
    }

    pub fn key(self, identity: &str) -> String {
        format!("{KEY_PREFIX}:{}:{identity}", self.as_str())
    }
}

pub fn post_identity(id: PostId) -> String {
    id.encode()
}

pub fn first_page_identity(author: &UserId) -> &str {
    author.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let id = PostId::from_bytes([0; 12]);
        assert_eq!(
            CacheNamespace::Posts.key(&post_identity(id)),
            "murmur:posts:AAAAAAAAAAAAAAAA"
        );

        let author = UserId::new("alice").expect("user");
        assert_eq!(
            CacheNamespace::FirstPage.key(first_page_identity(&author)),
            "murmur:fppack:alice"
        );
    }
}
