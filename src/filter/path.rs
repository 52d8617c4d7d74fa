// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Dotted/indexed path lookup into JSON trees
//!
//! A path is a dot-separated list of segments. Each segment is an optional
//! object key followed by any number of bracketed array indexes:
//!
//! ```text
//! payload.units[2].name
//! keywords[0]
//! ```
//!
//! When a keyed segment meets an array without an explicit index, every
//! element is tried with the remaining path and the first hit wins.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment<'a> {
    key: &'a str,
    indexes: Vec<usize>,
}

fn parse_segment(raw: &str) -> Option<Segment<'_>> {
    let (key, mut rest) = match raw.find('[') {
        Some(pos) => (&raw[..pos], &raw[pos..]),
        None => (raw, ""),
    };

    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indexes.push(inner[..close].trim().parse::<usize>().ok()?);
        rest = &inner[close + 1..];
    }

    if key.is_empty() && indexes.is_empty() {
        return None;
    }

    Some(Segment { key, indexes })
}

fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    path.split('.').map(parse_segment).collect()
}

/// String form of a scalar node; `None` for null, arrays and objects.
fn scalar_text(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn walk<F>(node: &Value, segments: &[Segment<'_>], accept: &mut F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    let Some((segment, rest)) = segments.split_first() else {
        return scalar_text(node).filter(|text| accept(text.as_str()));
    };

    // Keyed segment against an array: try every element with the same path.
    if !segment.key.is_empty() {
        if let Value::Array(items) = node {
            return items.iter().find_map(|item| walk(item, segments, accept));
        }
    }

    let mut current = if segment.key.is_empty() {
        node
    } else {
        node.as_object()?.get(segment.key)?
    };

    for &index in &segment.indexes {
        current = current.as_array()?.get(index)?;
        if current.is_null() {
            return None;
        }
    }

    walk(current, rest, accept)
}

/// Resolve `path` against `root` and return the first scalar accepted by `accept`.
pub fn resolve_matching<F>(root: &Value, path: &str, mut accept: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    let segments = parse_path(path)?;
    walk(root, &segments, &mut accept)
}

/// Resolve `path` against `root`, returning the string form of the scalar found there.
pub fn resolve(root: &Value, path: &str) -> Option<String> {
    resolve_matching(root, path, |_| true)
}

/// Whether any value reachable through `path` equals `expected`, ignoring case.
pub fn matches(root: &Value, path: &str, expected: &str) -> bool {
    let expected = expected.to_lowercase();
    resolve_matching(root, path, |value| value.to_lowercase() == expected).is_some()
}
