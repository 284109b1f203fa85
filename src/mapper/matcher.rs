//! Multi-pattern substring matching for the super blacklist
//!
//! The blacklisted strings are compiled into a trie with a terminal accept
//! state. A phrase is then scanned once per start offset, short-circuiting on
//! the first accepting walk, which makes the scan `O(phrase × longest
//! pattern)` regardless of how many patterns are registered.

use rustc_hash::FxHashMap;

/// Trie over a set of strings, answering "does any string start here?"
#[derive(Debug)]
pub struct SubstringMatcher {
    root: Node,
}
//
impl SubstringMatcher {
    /// Compile a set of patterns
    ///
    /// An empty pattern makes the matcher accept everything, consistent with
    /// "the empty string occurs in every phrase".
    pub fn new<I>(patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut root = FxHashMap::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                return Self { root: Node::Accept };
            }
            insert(&mut root, pattern);
        }
        Self {
            root: Node::Branch(root),
        }
    }

    /// Truth that some pattern is a prefix of `text`
    pub fn matches_prefix(&self, text: &str) -> bool {
        let mut node = &self.root;
        for c in text.chars() {
            match node {
                Node::Accept => return true,
                Node::Branch(children) => match children.get(&c) {
                    Some(child) => node = child,
                    None => return false,
                },
            }
        }
        matches!(node, Node::Accept)
    }

    /// Truth that some pattern occurs anywhere in `text`
    pub fn matches_anywhere(&self, text: &str) -> bool {
        text.char_indices()
            .any(|(offset, _)| self.matches_prefix(&text[offset..]))
    }
}

/// One trie node
#[derive(Debug)]
enum Node {
    /// A complete pattern ends here; everything below is irrelevant
    Accept,

    /// Patterns continue through the edges of this node
    Branch(FxHashMap<char, Node>),
}

/// Insert one pattern into the trie
fn insert(mut children: &mut FxHashMap<char, Node>, pattern: &str) {
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if chars.peek().is_none() {
            // A shorter pattern shadows any longer one through this node
            children.insert(c, Node::Accept);
            return;
        }
        let child = children
            .entry(c)
            .or_insert_with(|| Node::Branch(FxHashMap::default()));
        match child {
            // An existing shorter pattern already accepts this walk
            Node::Accept => return,
            Node::Branch(next) => children = next,
        }
    }
}
