//! Shared string pool.
//!
//! The `StringPool` interns frequently repeated short strings — formatting
//! whitespace between elements, single-character runs at markup boundaries —
//! so that a ten-thousand-row document stores one copy of `"\n  "` instead of
//! ten thousand. Unlike a symbol dictionary it hands back the shared string
//! itself (`Rc<str>`), because text nodes need the content, not an id.

use std::collections::HashMap;
use std::rc::Rc;

/// A pool of shared immutable strings.
///
/// `intern` returns an `Rc<str>` handle; repeated calls with equal content
/// return clones of the same allocation. The pool owns one copy of every
/// distinct string handed to it.
///
/// # Examples
///
/// ```
/// use treeoxide::util::strings::StringPool;
///
/// let mut pool = StringPool::new();
/// let a = pool.intern("\n  ");
/// let b = pool.intern("\n  ");
/// assert!(std::rc::Rc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Default)]
pub struct StringPool {
    map: HashMap<Box<str>, Rc<str>>,
}

impl StringPool {
    /// Creates a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Interns a string, returning a shared handle to the pooled copy.
    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(shared) = self.map.get(s) {
            return Rc::clone(shared);
        }
        let shared: Rc<str> = Rc::from(s);
        self.map.insert(Box::from(s), Rc::clone(&shared));
        shared
    }

    /// Returns `true` if `s` is already pooled.
    #[must_use]
    pub fn contains(&self, s: &str) -> bool {
        self.map.contains_key(s)
    }

    /// Returns the number of distinct pooled strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the pool holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
