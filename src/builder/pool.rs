//! Recyclable node slots.
//!
//! Streaming assembly creates and discards many short-lived nodes (text
//! runs that get coalesced, elements dropped during recovery). The pool
//! keeps a bounded free-list of detached arena slots and hands them back to
//! the allocation paths, so churny documents do not grow the arena without
//! bound.

use crate::tree::{Document, NodeId, NodeKind};

/// Default number of recyclable slots kept around.
pub(crate) const DEFAULT_RETAIN: usize = 100;

/// A bounded free-list of recyclable arena slots.
#[derive(Debug)]
pub struct NodePool {
    free: Vec<NodeId>,
    retain: usize,
}

impl NodePool {
    /// Creates a pool retaining at most `retain` free slots.
    #[must_use]
    pub fn new(retain: usize) -> Self {
        Self {
            free: Vec::new(),
            retain,
        }
    }

    /// Allocates a node, reusing a recycled slot when one is available.
    pub fn alloc(&mut self, doc: &mut Document, kind: NodeKind) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                doc.reset_node(id, kind);
                id
            }
            None => doc.create_node(kind),
        }
    }

    /// Returns a detached node's slot to the pool. Slots beyond the
    /// retention cap are simply abandoned in the arena.
    pub fn recycle(&mut self, doc: &mut Document, id: NodeId) {
        doc.detach(id);
        if self.free.len() < self.retain {
            self.free.push(id);
        }
    }

    /// Number of slots currently available for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new(DEFAULT_RETAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TextContent;

    fn text(content: &str) -> NodeKind {
        NodeKind::Text {
            content: TextContent::Owned(content.to_string()),
        }
    }

    #[test]
    fn test_alloc_reuses_recycled_slot() {
        let mut doc = Document::new();
        let mut pool = NodePool::default();

        let a = pool.alloc(&mut doc, text("A"));
        let count = doc.node_count();

        pool.recycle(&mut doc, a);
        assert_eq!(pool.available(), 1);

        let b = pool.alloc(&mut doc, text("B"));
        assert_eq!(a, b);
        assert_eq!(doc.node_count(), count);
        assert_eq!(doc.node_text(b), Some("B"));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_retention_cap() {
        let mut doc = Document::new();
        let mut pool = NodePool::new(2);

        let ids: Vec<_> = (0..4).map(|i| pool.alloc(&mut doc, text(&i.to_string()))).collect();
        for id in ids {
            pool.recycle(&mut doc, id);
        }
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_recycle_detaches() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut pool = NodePool::default();

        let a = pool.alloc(&mut doc, text("A"));
        doc.append_child(root, a);
        pool.recycle(&mut doc, a);

        assert_eq!(doc.first_child(root), None);
        assert_eq!(doc.parent(a), None);
    }
}
