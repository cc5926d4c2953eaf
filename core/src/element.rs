//! Deduplicating element storage.
//!
//! Tables, fields, tags, business entities and actions are shared between
//! every description of a build. [`ElementRepository`] keeps at most one
//! [`Element`] per `(kind, name)` pair and remembers the row id each element
//! receives once it has been written to the documentation store.
//!
//! # Examples
//!
//! ```
//! use dal_doc_core::{Element, ElementKind, ElementRepository};
//!
//! let mut repository = ElementRepository::new();
//! repository.add(Element::tag("users"));
//! repository.add(Element::tag("users"));
//! assert_eq!(repository.count(ElementKind::Tag), 1);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a shared documentation element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    /// A database table.
    Table,
    /// A qualified `table.field` column.
    Field,
    /// A free-form tag attached to entry points.
    Tag,
    /// A domain concept such as `user`.
    BusinessEntity,
    /// A verb applied to a business entity such as `delete`.
    Action,
}

impl ElementKind {
    /// Every kind, in the order the store persists them.
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Table,
        ElementKind::BusinessEntity,
        ElementKind::Action,
        ElementKind::Field,
        ElementKind::Tag,
    ];

    /// Returns the lowercase name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Table => "table",
            ElementKind::Field => "field",
            ElementKind::Tag => "tag",
            ElementKind::BusinessEntity => "business entity",
            ElementKind::Action => "action",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named element shared across descriptions.
///
/// Fields carry the name of their owning table; every other kind has no
/// parent. The `id` is unset until the element is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    kind: ElementKind,
    name: String,
    table: Option<String>,
    id: Option<i64>,
}

impl Element {
    /// Creates an element of the given kind with no parent.
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            table: None,
            id: None,
        }
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Table, name)
    }

    /// Creates a field element named `"<table>.<field>"`.
    pub fn field(table: &str, field: &str) -> Self {
        Self {
            kind: ElementKind::Field,
            name: format!("{table}.{field}"),
            table: Some(table.to_string()),
            id: None,
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Tag, name)
    }

    pub fn business_entity(name: impl Into<String>) -> Self {
        Self::new(ElementKind::BusinessEntity, name)
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Action, name)
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning table of a field element.
    pub fn owner_table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Row id assigned when the element was persisted.
    pub fn id(&self) -> Option<i64> {
        self.id
    }
}

/// Store of unique elements keyed by `(kind, name)`.
///
/// Elements are kept in first-insertion order so that persisting the same
/// inputs twice yields the same row sequence. The repository is owned by a
/// single build; call [`reset`](Self::reset) or create a new one between
/// independent runs.
#[derive(Debug, Default)]
pub struct ElementRepository {
    elements: Vec<Element>,
    index: HashMap<(ElementKind, String), usize>,
}

impl ElementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element unless one with the same kind and name exists.
    ///
    /// Returns the stored instance. An existing element is never
    /// overwritten, so a previously assigned id survives re-adding.
    pub fn add(&mut self, element: Element) -> &Element {
        let key = (element.kind, element.name.clone());
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.elements.push(element);
                let position = self.elements.len() - 1;
                self.index.insert(key, position);
                position
            }
        };
        &self.elements[position]
    }

    /// Looks up an element by kind and name.
    pub fn get(&self, kind: ElementKind, name: &str) -> Option<&Element> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&position| &self.elements[position])
    }

    pub fn contains(&self, kind: ElementKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Returns the persisted row id of an element, if it exists and was written.
    pub fn id_of(&self, kind: ElementKind, name: &str) -> Option<i64> {
        self.get(kind, name).and_then(Element::id)
    }

    /// Records the row id an element received in the store.
    ///
    /// Returns `false` when no such element is registered.
    pub fn assign_id(&mut self, kind: ElementKind, name: &str, id: i64) -> bool {
        match self.index.get(&(kind, name.to_string())) {
            Some(&position) => {
                self.elements[position].id = Some(id);
                true
            }
            None => false,
        }
    }

    /// Iterates over all elements of a kind in insertion order.
    pub fn all_of(&self, kind: ElementKind) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: ElementKind) -> usize {
        self.all_of(kind).count()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Removes every element of every kind.
    pub fn reset(&mut self) {
        self.elements.clear();
        self.index.clear();
    }
}
