//! Input bookkeeping and the external-resource resolver seam.
//!
//! The builder does not read bytes itself — the tokenizer drives it — but it
//! tracks the stack of inputs the tokenizer is reading from, because several
//! behaviors depend on it: base-URI resolution for entity declarations,
//! encoding reconciliation at start of document, and the save/restore
//! discipline around nested external-subset parses.
//!
//! External resources (the external DTD subset, external parsed entities)
//! are fetched through an injected [`EntityResolver`] callback. Without a
//! resolver the builder never touches the network or filesystem.

use std::sync::Arc;

/// One input the tokenizer is reading from.
///
/// The outermost input is the document itself; pushed entries are entity or
/// subset inputs opened during the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSource {
    /// The SYSTEM identifier (URI) of this input, if known.
    pub system_id: Option<String>,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The encoding this input was declared or detected to be in.
    pub encoding: Option<String>,
    /// Current source line within this input.
    pub line: u32,
}

impl InputSource {
    /// Creates an input for the given system id.
    #[must_use]
    pub fn with_system_id(system_id: &str) -> Self {
        Self {
            system_id: Some(system_id.to_string()),
            ..Self::default()
        }
    }
}

/// The stack of open inputs, innermost last.
#[derive(Debug, Clone, Default)]
pub struct InputStack {
    inputs: Vec<InputSource>,
}

impl InputStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a newly opened input.
    pub fn push(&mut self, input: InputSource) {
        self.inputs.push(input);
    }

    /// Pops the innermost input.
    pub fn pop(&mut self) -> Option<InputSource> {
        self.inputs.pop()
    }

    /// Returns the innermost open input.
    #[must_use]
    pub fn innermost(&self) -> Option<&InputSource> {
        self.inputs.last()
    }

    /// Returns a mutable handle to the innermost open input.
    pub fn innermost_mut(&mut self) -> Option<&mut InputSource> {
        self.inputs.last_mut()
    }

    /// Returns the outermost input (the document itself).
    #[must_use]
    pub fn outermost(&self) -> Option<&InputSource> {
        self.inputs.first()
    }

    /// Returns the number of open inputs.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inputs.len()
    }

    /// Returns `true` if no inputs are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// A request to resolve an external resource.
///
/// Passed to the [`EntityResolver`] callback when the builder needs the
/// external DTD subset or the content of an external parsed entity.
#[derive(Debug)]
pub struct ResolveRequest<'a> {
    /// The entity or doctype name the request is for.
    pub name: &'a str,
    /// The SYSTEM identifier (URI), resolved against the declaring input's
    /// base when one was known.
    pub system_id: Option<&'a str>,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<&'a str>,
}

/// The raw bytes of a fetched external resource.
///
/// Encoding is not assumed: the fetch coordinator sniffs the leading bytes
/// and transcodes before parsing.
#[derive(Debug, Clone)]
pub struct ExternalInput {
    /// The resource content, in whatever encoding it was stored in.
    pub bytes: Vec<u8>,
    /// The URI the resource was actually loaded from, if different from the
    /// requested one (e.g., after catalog or redirect handling).
    pub system_id: Option<String>,
}

/// Callback for fetching external resources.
///
/// Return `Some` with the raw bytes to let the builder parse the resource,
/// or `None` to reject the request (which produces a warning and leaves the
/// tree unchanged).
///
/// # Security
///
/// **Warning:** Resolving external resources opens the door to XML External
/// Entity (XXE) attacks. Only use this with trusted input, and consider
/// restricting which URIs the resolver is willing to fetch.
pub type EntityResolver = Arc<dyn Fn(ResolveRequest<'_>) -> Option<ExternalInput> + Send + Sync>;

/// Resolves a possibly-relative URI reference against a base URI.
///
/// References that carry a scheme, and references with no usable base, are
/// returned unchanged. Otherwise the reference replaces everything after
/// the last `/` of the base.
#[must_use]
pub fn resolve_uri(base: Option<&str>, reference: &str) -> String {
    fn has_scheme(uri: &str) -> bool {
        uri.split_once(':').is_some_and(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
    }

    let Some(base) = base else {
        return reference.to_string();
    };
    if reference.is_empty() || has_scheme(reference) || reference.starts_with('/') {
        return reference.to_string();
    }
    match base.rfind('/') {
        Some(pos) => format!("{}{}", &base[..=pos], reference),
        None => reference.to_string(),
    }
}
