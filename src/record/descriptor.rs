//! Self-describing record types.
//!
//! A [`TypeDescriptor`] lists the members a record type declares directly:
//! its fields and, optionally, the methods of one inherent impl block. The
//! descriptors are produced by `#[derive(Record)]` or loaded from a JSON
//! manifest and are the input for checksum computation and field dispatch.

use crate::core::{FormError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Method,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Method => "method",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Public,
    Crate,
    Restricted,
    Private,
    Static,
    MutReceiver,
    Async,
    Const,
    Unsafe,
    Id,
    Embedded,
    ElementCollection,
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
    Money,
    Transient,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Crate => "crate",
            Modifier::Restricted => "restricted",
            Modifier::Private => "private",
            Modifier::Static => "static",
            Modifier::MutReceiver => "mut_receiver",
            Modifier::Async => "async",
            Modifier::Const => "const",
            Modifier::Unsafe => "unsafe",
            Modifier::Id => "id",
            Modifier::Embedded => "embedded",
            Modifier::ElementCollection => "element_collection",
            Modifier::OneToOne => "one_to_one",
            Modifier::ManyToOne => "many_to_one",
            Modifier::OneToMany => "one_to_many",
            Modifier::ManyToMany => "many_to_many",
            Modifier::Money => "money",
            Modifier::Transient => "transient",
        }
    }
}

/// One directly declared field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub kind: MemberKind,
    pub name: String,
    pub declared_type: String,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
}

impl MemberDescriptor {
    pub fn new(
        kind: MemberKind,
        name: impl Into<String>,
        declared_type: impl AsRef<str>,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            declared_type: canonical_type_text(declared_type.as_ref()),
            modifiers: modifiers.into_iter().collect(),
        }
    }

    pub fn field(
        name: impl Into<String>,
        declared_type: impl AsRef<str>,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Self {
        Self::new(MemberKind::Field, name, declared_type, modifiers)
    }

    pub fn method(
        name: impl Into<String>,
        signature: impl AsRef<str>,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Self {
        Self::new(MemberKind::Method, name, signature, modifiers)
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn is_field(&self) -> bool {
        self.kind == MemberKind::Field
    }
}

/// Structural description of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_id: String,
    pub simple_name: String,
    #[serde(default)]
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_id: impl Into<String>, simple_name: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            simple_name: simple_name.into(),
            members: Vec::new(),
        }
    }

    pub fn push_member(&mut self, member: MemberDescriptor) {
        self.members.push(member);
    }

    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.push_member(member);
        self
    }

    pub fn field(
        self,
        name: impl Into<String>,
        declared_type: impl AsRef<str>,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Self {
        self.with_member(MemberDescriptor::field(name, declared_type, modifiers))
    }

    pub fn method(
        self,
        name: impl Into<String>,
        signature: impl AsRef<str>,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Self {
        self.with_member(MemberDescriptor::method(name, signature, modifiers))
    }

    pub fn fields(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|member| member.is_field())
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Query alias of the type: its simple name's first character, lowercased.
    pub fn alias(&self) -> String {
        match self.simple_name.chars().next() {
            Some(first) => first.to_lowercase().collect(),
            None => "r".to_string(),
        }
    }

    fn check(&self) -> Result<()> {
        if self.type_id.trim().is_empty() {
            return Err(FormError::Config("record type id must not be empty".to_string()));
        }
        if self.simple_name.trim().is_empty() {
            return Err(FormError::Config(format!(
                "record type '{}' has an empty simple name",
                self.type_id
            )));
        }
        Ok(())
    }
}

/// Implemented by `#[derive(Record)]`.
pub trait Record {
    fn descriptor() -> TypeDescriptor;
}

/// Insertion-ordered set of record types, unique by type id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet {
    types: Vec<TypeDescriptor>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `R`; re-adding the same descriptor is a no-op.
    pub fn insert<R: Record>(&mut self) -> Result<()> {
        self.insert_descriptor(R::descriptor())
    }

    pub fn with<R: Record>(mut self) -> Result<Self> {
        self.insert::<R>()?;
        Ok(self)
    }

    /// Member type texts are canonicalized before the descriptor is stored.
    pub fn insert_descriptor(&mut self, mut descriptor: TypeDescriptor) -> Result<()> {
        descriptor.check()?;
        for member in &mut descriptor.members {
            member.declared_type = canonical_type_text(&member.declared_type);
        }
        match self.get(&descriptor.type_id) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(FormError::Config(format!(
                "conflicting descriptors registered for record type '{}'",
                descriptor.type_id
            ))),
            None => {
                self.types.push(descriptor);
                Ok(())
            }
        }
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        let mut set = Self::new();
        for descriptor in descriptors {
            set.insert_descriptor(descriptor)?;
        }
        Ok(set)
    }

    /// Loads a JSON array of type descriptors.
    pub fn from_manifest<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| FormError::storage(format!("read manifest '{}'", path.display()), e))?;
        let descriptors: Vec<TypeDescriptor> = serde_json::from_slice(&data)
            .map_err(|e| FormError::storage(format!("parse manifest '{}'", path.display()), e))?;
        if descriptors.is_empty() {
            return Err(FormError::Config(format!(
                "manifest '{}' declares no record types",
                path.display()
            )));
        }
        Self::from_descriptors(descriptors)
    }

    pub fn get(&self, type_id: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|ty| ty.type_id == type_id)
    }

    pub fn by_simple_name(&self, simple_name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|ty| ty.simple_name == simple_name)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.get(type_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collapses whitespace in type text so `Vec < String >` and `Vec<String>`
/// describe the same member. A single space survives only between two
/// identifier-like tokens (`dyn Trait`, `&'a str`).
pub fn canonical_type_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in text.split_whitespace() {
        let joins_words = matches!(
            (out.chars().last(), token.chars().next()),
            (Some(prev), Some(next)) if is_word_char(prev) && is_word_char(next)
        );
        if joins_words {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}
