use super::node::{tokenize, RouteNode};
use crate::error::Error;
use smallvec::SmallVec;
use std::sync::Arc;

/// Captured path parameters: `name -> value`. Stack-allocated for the
/// common case of a handful of parameters, matching the capture-vector
/// discipline used on the rest of the dispatch hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); 8]>;

/// A per-method prefix tree mapping URL path patterns to a handler chain of
/// type `T`.
pub struct Trie<T> {
    root: RouteNode<T>,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Trie {
            root: RouteNode::default(),
        }
    }
}

impl<T> Trie<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handlers` at `pattern`. Overwrites any handlers previously
    /// registered at the same terminal node.
    pub fn insert(&mut self, pattern: &str, handlers: T) -> Result<(), Error> {
        let segments = tokenize(pattern)?;
        self.root.insert(&segments, Arc::new(handlers))
    }

    /// Match `path` against the trie, returning the terminal handlers and
    /// captured parameters in priority order (static > typed > named >
    /// wildcard > catch-all).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<(Arc<T>, ParamVec)> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = ParamVec::new();
        let node = search(&self.root, &parts, &mut captures)?;
        node.handlers.clone().map(|h| (h, captures))
    }
}

fn search<'a, T>(
    node: &'a RouteNode<T>,
    parts: &[&str],
    captures: &mut ParamVec,
) -> Option<&'a RouteNode<T>> {
    let Some((seg, rest)) = parts.split_first() else {
        if node.handlers.is_some() {
            return Some(node);
        }
        if let Some(ca) = &node.catch_all_child {
            if ca.handlers.is_some() {
                captures.push((Arc::from("*"), String::new()));
                return Some(ca);
            }
        }
        return None;
    };

    for child in &node.static_children {
        if child.segment == *seg {
            if let Some(found) = search(child, rest, captures) {
                return Some(found);
            }
        }
    }

    if let Some(typed) = &node.typed_child {
        if typed.constraint.as_ref().is_some_and(|c| c.validate(seg)) {
            #[allow(clippy::unwrap_used)]
            captures.push((typed.param_name.clone().unwrap(), (*seg).to_string()));
            if let Some(found) = search(typed, rest, captures) {
                return Some(found);
            }
            captures.pop();
        }
    }

    if let Some(named) = &node.named_child {
        #[allow(clippy::unwrap_used)]
        captures.push((named.param_name.clone().unwrap(), (*seg).to_string()));
        if let Some(found) = search(named, rest, captures) {
            return Some(found);
        }
        captures.pop();
    }

    if let Some(wc) = &node.wildcard_child {
        #[allow(clippy::unwrap_used)]
        captures.push((wc.param_name.clone().unwrap(), (*seg).to_string()));
        if let Some(found) = search(wc, rest, captures) {
            return Some(found);
        }
        captures.pop();
    }

    if let Some(ca) = &node.catch_all_child {
        if ca.handlers.is_some() {
            let remainder = parts.join("/");
            captures.push((Arc::from("*"), remainder));
            return Some(ca);
        }
    }

    None
}
