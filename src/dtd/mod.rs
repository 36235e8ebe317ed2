//! DTD (Document Type Definition) declaration registry.
//!
//! This module holds the data model for declarations collected from DTD
//! subsets: element declarations, attribute-list declarations, entity
//! declarations (parsed and unparsed, general and parameter), and notation
//! declarations. See XML 1.0 (Fifth Edition) sections 2.8, 3.2, 3.3, and 4.2.
//!
//! A [`DtdSubset`] is a pure registry: within each subset the first
//! declaration of a name wins and later ones are ignored. Content models are
//! recorded but not enforced — content-model validation is a separate
//! concern, outside this crate.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// An element declaration from `<!ELEMENT name content-model>`.
///
/// See XML 1.0 section 3.2.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// The element name.
    pub name: String,
    /// The declared content model.
    pub content_model: ContentModel,
}

/// The content model for an element declaration.
///
/// See XML 1.0 section 3.2 for the grammar:
/// - `contentspec ::= 'EMPTY' | 'ANY' | Mixed | children`
#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    /// The element must have no children (no elements, no text).
    /// Declared as `<!ELEMENT name EMPTY>`.
    Empty,
    /// Any content is allowed.
    /// Declared as `<!ELEMENT name ANY>`.
    Any,
    /// Mixed content: text and optionally listed elements in any order.
    /// Declared as `<!ELEMENT name (#PCDATA)>` or `<!ELEMENT name (#PCDATA|a|b)*>`.
    ///
    /// The `Vec<String>` contains the allowed element names (empty for `#PCDATA` only).
    Mixed(Vec<String>),
    /// Element-only content following a content spec pattern.
    /// Declared as `<!ELEMENT name (a,b,c)>` etc.
    Children(ContentSpec),
}

/// A content specification for element-only content models.
///
/// Represents the recursive structure of `(a,b)`, `(a|b)`, etc.
/// with occurrence indicators.
///
/// See XML 1.0 section 3.2.1 and 3.2.2.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    /// The content particle kind.
    pub kind: ContentSpecKind,
    /// How many times this particle may occur.
    pub occurrence: Occurrence,
}

/// The kind of a content specification particle.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSpecKind {
    /// A single named element, e.g., `a`.
    Name(String),
    /// A sequence of particles, e.g., `(a, b, c)`.
    Seq(Vec<ContentSpec>),
    /// A choice among particles, e.g., `(a | b | c)`.
    Choice(Vec<ContentSpec>),
}

/// Occurrence indicator for a content particle.
///
/// See XML 1.0 section 3.2.1: `'?' | '*' | '+'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Exactly once (no indicator).
    Once,
    /// Zero or one time (`?`).
    Optional,
    /// Zero or more times (`*`).
    ZeroOrMore,
    /// One or more times (`+`).
    OneOrMore,
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::Any => write!(f, "ANY"),
            Self::Mixed(names) => {
                if names.is_empty() {
                    write!(f, "(#PCDATA)")
                } else {
                    write!(f, "(#PCDATA|{})*", names.join("|"))
                }
            }
            Self::Children(spec) => write!(f, "{spec}"),
        }
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ContentSpecKind::Name(name) => write!(f, "{name}")?,
            ContentSpecKind::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")?;
            }
            ContentSpecKind::Choice(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")?;
            }
        }
        match self.occurrence {
            Occurrence::Once => {}
            Occurrence::Optional => write!(f, "?")?,
            Occurrence::ZeroOrMore => write!(f, "*")?,
            Occurrence::OneOrMore => write!(f, "+")?,
        }
        Ok(())
    }
}

/// An attribute declaration from `<!ATTLIST element-name attr-name type default>`.
///
/// See XML 1.0 section 3.3.
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// The element this attribute belongs to.
    pub element_name: String,
    /// The attribute name.
    pub attribute_name: String,
    /// The attribute type.
    pub attribute_type: AttributeType,
    /// The default value specification.
    pub default: AttributeDefault,
}

/// The type of an attribute as declared in `<!ATTLIST>`.
///
/// See XML 1.0 section 3.3.1.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    /// Character data (`CDATA`).
    CData,
    /// A unique identifier (`ID`).
    Id,
    /// A reference to an ID (`IDREF`).
    IdRef,
    /// Space-separated list of ID references (`IDREFS`).
    IdRefs,
    /// An entity name (`ENTITY`).
    Entity,
    /// Space-separated list of entity names (`ENTITIES`).
    Entities,
    /// A name token (`NMTOKEN`).
    NmToken,
    /// Space-separated list of name tokens (`NMTOKENS`).
    NmTokens,
    /// A notation type with allowed notation names (`NOTATION (a|b|c)`).
    Notation(Vec<String>),
    /// An enumeration of allowed values (`(a|b|c)`).
    Enumeration(Vec<String>),
}

/// The default value specification for an attribute.
///
/// See XML 1.0 section 3.3.2.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDefault {
    /// The attribute is required (`#REQUIRED`).
    Required,
    /// The attribute is optional with no default (`#IMPLIED`).
    Implied,
    /// The attribute has a fixed value (`#FIXED "value"`).
    Fixed(String),
    /// The attribute has a default value (`"value"`).
    Default(String),
}

/// What sort of entity a declaration introduces.
///
/// See XML 1.0 section 4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Internal general entity with a literal replacement text.
    InternalGeneral,
    /// External parsed general entity (SYSTEM/PUBLIC identifiers).
    ExternalParsed,
    /// External unparsed entity (declared with `NDATA notation`).
    Unparsed,
    /// Internal parameter entity (`<!ENTITY % name "...">`).
    InternalParameter,
    /// External parameter entity.
    ExternalParameter,
    /// One of the five predefined entities (`lt`, `gt`, `amp`, `apos`, `quot`).
    Predefined,
}

/// An entity declaration.
///
/// See XML 1.0 section 4.2.
#[derive(Debug, Clone)]
pub struct EntityDecl {
    /// The entity name.
    pub name: String,
    /// What sort of entity this is.
    pub kind: EntityKind,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier (URI), if any.
    pub system_id: Option<String>,
    /// The notation name for unparsed entities.
    pub notation: Option<String>,
    /// The replacement text for internal and predefined entities, or the
    /// fetched content once an external parsed entity has been loaded.
    pub value: Option<String>,
    /// The system id resolved against the base of the declaring input.
    pub base_uri: Option<String>,
}

impl EntityDecl {
    /// Returns `true` if this entity was declared with external identifiers.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::ExternalParsed | EntityKind::Unparsed | EntityKind::ExternalParameter
        )
    }
}

/// A notation declaration from `<!NOTATION name ...>`.
///
/// See XML 1.0 section 4.7.
#[derive(Debug, Clone)]
pub struct NotationDecl {
    /// The notation name.
    pub name: String,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
}

/// One DTD subset (internal or external) with its declaration tables.
///
/// Registration is first-wins within a subset: `add_*` return `false` when
/// the name is already taken and leave the existing declaration in place.
#[derive(Debug, Clone, Default)]
pub struct DtdSubset {
    /// The declared root element name from the DOCTYPE.
    pub name: String,
    /// The PUBLIC identifier of the subset, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier of the subset, if any.
    pub system_id: Option<String>,
    /// Element declarations, keyed by element name.
    elements: HashMap<String, ElementDecl>,
    /// Attribute declarations, keyed by `(element name, attribute name)`.
    attributes: HashMap<(String, String), AttributeDecl>,
    /// General entity declarations, keyed by entity name.
    entities: HashMap<String, EntityDecl>,
    /// Parameter entity declarations, keyed by entity name.
    parameter_entities: HashMap<String, EntityDecl>,
    /// Notation declarations, keyed by notation name.
    notations: HashMap<String, NotationDecl>,
}

impl DtdSubset {
    /// Creates a subset registry with the given doctype identifiers.
    #[must_use]
    pub fn new(name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            ..Self::default()
        }
    }

    /// Registers an element declaration. Returns `false` if the element
    /// name is already declared.
    pub fn add_element(&mut self, decl: ElementDecl) -> bool {
        insert_first_wins(&mut self.elements, decl.name.clone(), decl)
    }

    /// Looks up an element declaration by name.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    /// Registers an attribute declaration. Returns `false` if the
    /// `(element, attribute)` pair is already declared.
    pub fn add_attribute(&mut self, decl: AttributeDecl) -> bool {
        let key = (decl.element_name.clone(), decl.attribute_name.clone());
        insert_first_wins(&mut self.attributes, key, decl)
    }

    /// Looks up an attribute declaration by element and attribute name.
    #[must_use]
    pub fn attribute(&self, element: &str, attribute: &str) -> Option<&AttributeDecl> {
        self.attributes
            .get(&(element.to_string(), attribute.to_string()))
    }

    /// Registers a general entity declaration. Returns `false` if the
    /// entity name is already declared.
    pub fn add_entity(&mut self, decl: EntityDecl) -> bool {
        insert_first_wins(&mut self.entities, decl.name.clone(), decl)
    }

    /// Looks up a general entity declaration by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.get(name)
    }

    /// Returns a mutable handle to a general entity declaration.
    pub fn entity_mut(&mut self, name: &str) -> Option<&mut EntityDecl> {
        self.entities.get_mut(name)
    }

    /// Registers a parameter entity declaration. Returns `false` if the
    /// entity name is already declared.
    pub fn add_parameter_entity(&mut self, decl: EntityDecl) -> bool {
        insert_first_wins(&mut self.parameter_entities, decl.name.clone(), decl)
    }

    /// Looks up a parameter entity declaration by name.
    #[must_use]
    pub fn parameter_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.parameter_entities.get(name)
    }

    /// Registers a notation declaration. Returns `false` if the notation
    /// name is already declared.
    pub fn add_notation(&mut self, decl: NotationDecl) -> bool {
        insert_first_wins(&mut self.notations, decl.name.clone(), decl)
    }

    /// Looks up a notation declaration by name.
    #[must_use]
    pub fn notation(&self, name: &str) -> Option<&NotationDecl> {
        self.notations.get(name)
    }
}

fn insert_first_wins<K, V>(map: &mut HashMap<K, V>, key: K, value: V) -> bool
where
    K: std::hash::Hash + Eq,
{
    use std::collections::hash_map::Entry;
    match map.entry(key) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(value);
            true
        }
    }
}

/// Looks up one of the five predefined XML entities.
///
/// These are resolvable even when the document has no DTD at all.
/// See XML 1.0 section 4.6.
#[must_use]
pub fn predefined_entity(name: &str) -> Option<&'static EntityDecl> {
    static TABLE: OnceLock<HashMap<&'static str, EntityDecl>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for (name, value) in [
            ("lt", "<"),
            ("gt", ">"),
            ("amp", "&"),
            ("apos", "'"),
            ("quot", "\""),
        ] {
            map.insert(
                name,
                EntityDecl {
                    name: name.to_string(),
                    kind: EntityKind::Predefined,
                    public_id: None,
                    system_id: None,
                    notation: None,
                    value: Some(value.to_string()),
                    base_uri: None,
                },
            );
        }
        map
    });
    table.get(name)
}
