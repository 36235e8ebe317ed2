//! Text accumulation.
//!
//! Consecutive `characters` events must coalesce into a single text node
//! without quadratic reallocation. The accumulator tracks the logical
//! length and the reserved capacity of the text node currently being
//! extended, grows the buffer geometrically, and enforces the text-size
//! limit. It also decides when a fresh short run is worth interning through
//! the session's string pool instead of owning its bytes.

use crate::error::{BuildDiagnostic, DiagnosticKind};
use crate::tree::{Document, NodeId, NodeKind, TextContent};
use crate::util::strings::StringPool;

use super::pool::NodePool;

/// Hard ceiling on a single text node, unless the huge-text option is set.
pub(crate) const MAX_TEXT_LENGTH: usize = 10_000_000;

/// Whitespace-only runs shorter than this are interned.
const INTERN_BLANK_LIMIT: usize = 60;

/// Runs of at most this many bytes are interned regardless of content.
const INTERN_SHORT_LIMIT: usize = 3;

/// State for the text node currently being extended.
///
/// `len` is the logical content length; `capacity` is the reservation the
/// accumulator has already made. They diverge because geometric growth
/// over-reserves on purpose.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    current: Option<NodeId>,
    len: usize,
    capacity: usize,
}

impl TextAccumulator {
    /// Creates an idle accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The text node currently being extended, if any.
    #[must_use]
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Ends the current run. The next `characters` event starts a new node.
    pub fn flush(&mut self) {
        self.current = None;
        self.len = 0;
        self.capacity = 0;
    }

    /// Starts a new text run in a fresh (or recycled) node and returns it.
    /// The caller links the node into the tree.
    pub fn begin(
        &mut self,
        doc: &mut Document,
        pool: &mut NodePool,
        strings: &mut StringPool,
        content: &str,
        intern: bool,
    ) -> NodeId {
        let payload = if intern && should_intern(content) {
            TextContent::Shared(strings.intern(content))
        } else {
            TextContent::Owned(content.to_string())
        };
        let node = pool.alloc(doc, NodeKind::Text { content: payload });
        self.current = Some(node);
        self.len = content.len();
        self.capacity = content.len();
        node
    }

    /// Appends to the current run, growing the buffer geometrically.
    ///
    /// A shared (interned) run is copied out of the pool before the first
    /// append; the pooled original is never mutated.
    ///
    /// # Errors
    ///
    /// Returns a resource diagnostic when the run would exceed the text
    /// length limit and `huge` is not set. The node is left unchanged.
    pub fn append(
        &mut self,
        doc: &mut Document,
        content: &str,
        max_len: usize,
        huge: bool,
    ) -> Result<(), BuildDiagnostic> {
        let Some(node) = self.current else {
            return Ok(());
        };
        if !huge && self.len + content.len() > max_len {
            return Err(BuildDiagnostic::new(
                DiagnosticKind::Resource,
                "text node too long, try the huge-text option",
            ));
        }

        let grow_to = if self.len + content.len() >= self.capacity {
            Some((self.capacity + content.len()) * 2)
        } else {
            None
        };

        match &mut doc.node_mut(node).kind {
            NodeKind::Text { content: payload } => {
                let buf = payload.to_mut();
                if let Some(target) = grow_to {
                    buf.reserve(target.saturating_sub(buf.len()));
                    self.capacity = target;
                }
                buf.push_str(content);
            }
            _ => return Ok(()), // not a text node; nothing to extend
        }
        self.len += content.len();
        Ok(())
    }
}

/// Interning heuristic for a fresh run: formatting whitespace below the
/// blank limit, or any run short enough that pooling beats owning.
fn should_intern(content: &str) -> bool {
    if content.len() <= INTERN_SHORT_LIMIT {
        return true;
    }
    content.len() < INTERN_BLANK_LIMIT && content.bytes().all(|b| b.is_ascii_whitespace())
}
