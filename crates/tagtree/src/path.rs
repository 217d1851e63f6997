// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Path mapping
//!
//! Paths are built by concatenating a prefix and a tag verbatim: the tag
//! supplies its own separator (`"" + "/name"` → `/name`) and slashes inside a
//! tag are kept as-is. Stores canonicalize keys, so comparisons go through
//! [`same`].

use crate::field::{FieldKind, Locator, SlotRef, Tagged};

/// Key of the tree root.
pub const ROOT: &str = "/";

/// Concatenate a prefix and a tag fragment.
pub fn join(prefix: &str, tag: &str) -> String {
    let mut path = String::with_capacity(prefix.len() + tag.len());
    path.push_str(prefix);
    path.push_str(tag);
    path
}

/// `prefix/key`.
pub fn child(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key)
}

/// `prefix/index`, used for elements of struct sequences.
pub fn index(prefix: &str, index: usize) -> String {
    child(prefix, &index.to_string())
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form: leading slash, single separators, no trailing slash.
pub fn canonical(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push_str(ROOT);
    }
    out
}

/// True if both paths have the same canonical form.
pub fn same(a: &str, b: &str) -> bool {
    segments(a).eq(segments(b))
}

/// Last segment, or `""` for the root.
pub fn last_segment(path: &str) -> &str {
    segments(path).last().unwrap_or_default()
}

/// Canonical parent path, `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let canonical = canonical(path);
    if canonical == ROOT {
        return None;
    }
    match canonical.rfind('/') {
        Some(0) => Some(ROOT.to_string()),
        Some(pos) => Some(canonical[..pos].to_string()),
        None => None,
    }
}

/// True if `path` is `base` or lies below it.
pub fn is_within(path: &str, base: &str) -> bool {
    let mut path_segments = segments(path);
    segments(base).all(|b| path_segments.next() == Some(b))
}

/// One mapped field of a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedField {
    pub path: String,
    pub kind: FieldKind,
    pub locator: Locator,
}

/// Map every tagged field reachable through nested structures.
///
/// The first entry is the structure root, keyed by the canonical prefix.
pub fn map_fields(root: &dyn Tagged, prefix: &str) -> Vec<MappedField> {
    let mut out = vec![MappedField {
        path: canonical(prefix),
        kind: FieldKind::Struct,
        locator: Locator::root(),
    }];
    walk(root, prefix, &Locator::root(), &mut out);
    out
}

fn walk(node: &dyn Tagged, prefix: &str, locator: &Locator, out: &mut Vec<MappedField>) {
    for (position, field) in node.fields().into_iter().enumerate() {
        if field.tag.is_empty() {
            continue;
        }

        let path = join(prefix, field.tag);
        let locator = locator.child(position);
        if let SlotRef::Struct(inner) = field.slot {
            walk(inner, &path, &locator, out);
        }

        out.push(MappedField {
            path,
            kind: field.slot.kind(),
            locator,
        });
    }
}
