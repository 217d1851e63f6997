// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structure descriptors
//!
//! A structure takes part in save/load by implementing [`Tagged`], which lists
//! its tagged fields as typed slots. Field kinds form a closed set
//! ([`FieldKind`]) derived from the static Rust type through [`Slotted`], so the
//! engine never inspects types at runtime.
//!
//! Most structures implement [`Tagged`] with the [`tagged!`](crate::tagged)
//! macro:
//!
//! ```ignore
//! #[derive(Default)]
//! struct Limits {
//!     max_conn: i32,
//! }
//! tagtree::tagged!(Limits { max_conn => "/max_conn" });
//!
//! #[derive(Default)]
//! struct Config {
//!     name: String,
//!     limits: Limits,
//!     peers: Vec<String>,
//!     labels: Option<HashMap<String, String>>,
//!     scratch: u8, // not listed, never touched
//! }
//! tagtree::tagged!(Config {
//!     name => "/name",
//!     limits => "/limits",
//!     peers => "/peers",
//!     labels => "/labels",
//! });
//! ```

use std::collections::HashMap;

/// Scalar field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Int32,
    Int64,
    Flag,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Text => "text",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Flag => "flag",
        }
    }
}

/// Kinds allowed as sequence elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scalar(ScalarKind),
    Struct,
}

/// Closed set of field kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Struct,
    Sequence(ElementKind),
    Map,
}

impl FieldKind {
    /// True for kinds stored as a directory node.
    pub fn is_directory(self) -> bool {
        !matches!(self, FieldKind::Scalar(_))
    }
}

impl From<ElementKind> for FieldKind {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Scalar(s) => FieldKind::Scalar(s),
            ElementKind::Struct => FieldKind::Struct,
        }
    }
}

/// Read access to a field slot.
#[derive(Clone, Copy)]
pub enum SlotRef<'a> {
    Text(&'a str),
    Int32(i32),
    Int64(i64),
    Flag(bool),
    Struct(&'a dyn Tagged),
    Sequence(&'a dyn SequenceSlot),
    Map(Option<&'a HashMap<String, String>>),
}

impl SlotRef<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            SlotRef::Text(_) => FieldKind::Scalar(ScalarKind::Text),
            SlotRef::Int32(_) => FieldKind::Scalar(ScalarKind::Int32),
            SlotRef::Int64(_) => FieldKind::Scalar(ScalarKind::Int64),
            SlotRef::Flag(_) => FieldKind::Scalar(ScalarKind::Flag),
            SlotRef::Struct(_) => FieldKind::Struct,
            SlotRef::Sequence(seq) => FieldKind::Sequence(seq.element_kind()),
            SlotRef::Map(_) => FieldKind::Map,
        }
    }
}

/// Write access to a field slot.
pub enum SlotMut<'a> {
    Text(&'a mut String),
    Int32(&'a mut i32),
    Int64(&'a mut i64),
    Flag(&'a mut bool),
    Struct(&'a mut dyn Tagged),
    Sequence(&'a mut dyn SequenceSlot),
    Map(&'a mut dyn MapSlot),
}

impl SlotMut<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            SlotMut::Text(_) => FieldKind::Scalar(ScalarKind::Text),
            SlotMut::Int32(_) => FieldKind::Scalar(ScalarKind::Int32),
            SlotMut::Int64(_) => FieldKind::Scalar(ScalarKind::Int64),
            SlotMut::Flag(_) => FieldKind::Scalar(ScalarKind::Flag),
            SlotMut::Struct(_) => FieldKind::Struct,
            SlotMut::Sequence(seq) => FieldKind::Sequence(seq.element_kind()),
            SlotMut::Map(_) => FieldKind::Map,
        }
    }
}

/// A tagged field, read side.
pub struct Field<'a> {
    pub name: &'static str,
    pub tag: &'static str,
    pub slot: SlotRef<'a>,
}

/// A tagged field, write side.
pub struct FieldMut<'a> {
    pub name: &'static str,
    pub tag: &'static str,
    pub slot: SlotMut<'a>,
}

/// A structure whose fields map onto tree paths.
///
/// `fields` and `fields_mut` must list the same fields in the same order;
/// positions in that list are used as stable field identities.
pub trait Tagged {
    fn type_name(&self) -> &'static str;

    fn fields(&self) -> Vec<Field<'_>>;

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>>;
}

/// Types that can sit in a tagged field.
pub trait Slotted {
    fn slot(&self) -> SlotRef<'_>;

    fn slot_mut(&mut self) -> SlotMut<'_>;
}

/// Types that can be sequence elements.
pub trait Element: Slotted + Default + Send + 'static {
    const KIND: ElementKind;
}

/// Type-erased sequence, implemented for `Vec<E>`.
pub trait SequenceSlot {
    fn element_kind(&self) -> ElementKind;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, index: usize) -> Option<SlotRef<'_>>;

    fn clear(&mut self);

    /// Append a default element and return its slot.
    fn push_default(&mut self) -> SlotMut<'_>;
}

impl<T: Element> SequenceSlot for Vec<T> {
    fn element_kind(&self) -> ElementKind {
        T::KIND
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&self, index: usize) -> Option<SlotRef<'_>> {
        self.get(index).map(Slotted::slot)
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn push_default(&mut self) -> SlotMut<'_> {
        self.push(T::default());
        let last = Vec::len(self) - 1;
        self[last].slot_mut()
    }
}

/// Type-erased string map. `None` from `entries` means "not initialized".
pub trait MapSlot {
    fn entries(&self) -> Option<&HashMap<String, String>>;

    fn entries_mut(&mut self) -> Option<&mut HashMap<String, String>>;

    /// Allocate the map if needed.
    fn initialize(&mut self) -> &mut HashMap<String, String>;
}

impl MapSlot for HashMap<String, String> {
    fn entries(&self) -> Option<&HashMap<String, String>> {
        Some(self)
    }

    fn entries_mut(&mut self) -> Option<&mut HashMap<String, String>> {
        Some(self)
    }

    fn initialize(&mut self) -> &mut HashMap<String, String> {
        self
    }
}

impl MapSlot for Option<HashMap<String, String>> {
    fn entries(&self) -> Option<&HashMap<String, String>> {
        self.as_ref()
    }

    fn entries_mut(&mut self) -> Option<&mut HashMap<String, String>> {
        self.as_mut()
    }

    fn initialize(&mut self) -> &mut HashMap<String, String> {
        self.get_or_insert_with(HashMap::new)
    }
}

impl Slotted for String {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Text(self.as_str())
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Text(self)
    }
}

impl Element for String {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::Text);
}

impl Slotted for i32 {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Int32(*self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Int32(self)
    }
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::Int32);
}

impl Slotted for i64 {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Int64(*self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Int64(self)
    }
}

impl Element for i64 {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::Int64);
}

impl Slotted for bool {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Flag(*self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Flag(self)
    }
}

impl Element for bool {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::Flag);
}

impl<T: Element> Slotted for Vec<T> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Sequence(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Sequence(self)
    }
}

impl Slotted for HashMap<String, String> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Map(Some(self))
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Map(self)
    }
}

impl Slotted for Option<HashMap<String, String>> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Map(self.as_ref())
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Map(self)
    }
}

/// Position chain from the root structure down to a field slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Locator(Vec<usize>);

impl Locator {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, position: usize) -> Self {
        let mut positions = self.0.clone();
        positions.push(position);
        Self(positions)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn positions(&self) -> &[usize] {
        &self.0
    }

    /// Read the slot this locator points at.
    pub fn resolve<'a>(&self, root: &'a dyn Tagged) -> Option<SlotRef<'a>> {
        let Some((last, init)) = self.0.split_last() else {
            return Some(SlotRef::Struct(root));
        };

        let mut current = root;
        for &position in init {
            match current.fields().into_iter().nth(position)?.slot {
                SlotRef::Struct(inner) => current = inner,
                _ => return None,
            }
        }
        current.fields().into_iter().nth(*last).map(|f| f.slot)
    }

    /// Borrow the slot this locator points at for writing.
    pub fn resolve_mut<'a>(&self, root: &'a mut dyn Tagged) -> Option<SlotMut<'a>> {
        resolve_mut_at(root, &self.0)
    }
}

fn resolve_mut_at<'a>(node: &'a mut dyn Tagged, positions: &[usize]) -> Option<SlotMut<'a>> {
    let Some((&position, rest)) = positions.split_first() else {
        return Some(SlotMut::Struct(node));
    };

    let field = node.fields_mut().into_iter().nth(position)?;
    if rest.is_empty() {
        return Some(field.slot);
    }
    match field.slot {
        SlotMut::Struct(inner) => resolve_mut_at(inner, rest),
        _ => None,
    }
}

/// Implement [`Tagged`], [`Slotted`] and [`Element`] for a struct.
///
/// Each entry maps a field to its tag. Fields not listed are ignored, as are
/// entries with an empty tag. The struct must implement `Default`.
#[macro_export]
macro_rules! tagged {
    ($ty:ty { $($field:ident => $tag:expr),* $(,)? }) => {
        impl $crate::Tagged for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn fields(&self) -> ::std::vec::Vec<$crate::Field<'_>> {
                ::std::vec![$(
                    $crate::Field {
                        name: stringify!($field),
                        tag: $tag,
                        slot: $crate::Slotted::slot(&self.$field),
                    }
                ),*]
            }

            fn fields_mut(&mut self) -> ::std::vec::Vec<$crate::FieldMut<'_>> {
                ::std::vec![$(
                    $crate::FieldMut {
                        name: stringify!($field),
                        tag: $tag,
                        slot: $crate::Slotted::slot_mut(&mut self.$field),
                    }
                ),*]
            }
        }

        impl $crate::Slotted for $ty {
            fn slot(&self) -> $crate::SlotRef<'_> {
                $crate::SlotRef::Struct(self)
            }

            fn slot_mut(&mut self) -> $crate::SlotMut<'_> {
                $crate::SlotMut::Struct(self)
            }
        }

        impl $crate::Element for $ty {
            const KIND: $crate::ElementKind = $crate::ElementKind::Struct;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        a: String,
        b: i64,
    }
    crate::tagged!(Inner { a => "/a", b => "/b" });

    #[derive(Debug, Default)]
    struct Outer {
        inner: Inner,
        flag: bool,
        list: Vec<i32>,
        items: Vec<Inner>,
        labels: Option<HashMap<String, String>>,
        skipped: String,
        untagged: u8,
    }
    crate::tagged!(Outer {
        inner => "/inner",
        flag => "/flag",
        list => "/list",
        items => "/items",
        labels => "/labels",
        skipped => "",
    });

    #[test]
    fn test_field_kinds() {
        let outer = Outer::default();
        let kinds: Vec<_> = outer.fields().iter().map(|f| f.slot.kind()).collect();

        assert_eq!(
            kinds,
            vec![
                FieldKind::Struct,
                FieldKind::Scalar(ScalarKind::Flag),
                FieldKind::Sequence(ElementKind::Scalar(ScalarKind::Int32)),
                FieldKind::Sequence(ElementKind::Struct),
                FieldKind::Map,
                FieldKind::Scalar(ScalarKind::Text),
            ]
        );
        assert_eq!(outer.untagged, 0);
        assert_eq!(outer.type_name(), "Outer");
    }

    #[test]
    fn test_fields_and_fields_mut_agree() {
        let mut outer = Outer::default();
        let read: Vec<_> = outer.fields().iter().map(|f| (f.name, f.tag)).collect();
        let write: Vec<_> = outer
            .fields_mut()
            .iter()
            .map(|f| (f.name, f.tag))
            .collect();
        assert_eq!(read, write);
    }

    #[test]
    fn test_locator_resolve_nested() {
        let mut outer = Outer::default();
        outer.inner.b = 42;

        let locator = Locator::root().child(0).child(1);
        match locator.resolve(&outer) {
            Some(SlotRef::Int64(v)) => assert_eq!(v, 42),
            _ => panic!("expected int64 slot"),
        }

        match locator.resolve_mut(&mut outer) {
            Some(SlotMut::Int64(v)) => *v = 7,
            _ => panic!("expected int64 slot"),
        }
        assert_eq!(outer.inner.b, 7);
    }

    #[test]
    fn test_locator_root_and_invalid() {
        let outer = Outer::default();
        assert!(matches!(
            Locator::root().resolve(&outer),
            Some(SlotRef::Struct(_))
        ));
        assert!(Locator::root().child(99).resolve(&outer).is_none());
        // Descending through a scalar is not possible.
        assert!(Locator::root().child(1).child(0).resolve(&outer).is_none());
    }

    #[test]
    fn test_sequence_slot_push_default() {
        let mut items: Vec<Inner> = Vec::new();
        let seq: &mut dyn SequenceSlot = &mut items;
        assert!(seq.is_empty());

        if let SlotMut::Struct(inner) = seq.push_default() {
            if let Some(FieldMut {
                slot: SlotMut::Text(a),
                ..
            }) = inner.fields_mut().into_iter().next()
            {
                a.push_str("filled");
            }
        }
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].a, "filled");
    }

    #[test]
    fn test_map_slot_initialize() {
        let mut labels: Option<HashMap<String, String>> = None;
        assert!(MapSlot::entries(&labels).is_none());

        labels.initialize().insert("k".into(), "v".into());
        assert_eq!(labels.as_ref().map(HashMap::len), Some(1));

        let mut plain: HashMap<String, String> = HashMap::new();
        assert!(MapSlot::entries_mut(&mut plain).is_some());
    }
}
