//! Collection merge engine - folds one change into an ordered view.
//!
//! [`apply`] is a pure function: it never mutates the input sequence and
//! keeps no hidden state, so it is independently testable and safely
//! replayable. The engine is also filter-blind - deciding whether an
//! addition belongs in a filtered collection happens one level up, in the
//! live-view layer.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::cursor::{scalar_cmp, Direction};
use crate::resource::{resource_from_attrs, AttrMap, Resource, ResourceChange};

/// Error type for merge operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The incoming resource payload did not decode to the collection's type.
    Decode(String),
    /// Applying a partial update produced a value the type rejected.
    Patch(String),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::Decode(msg) => write!(f, "merge decode error: {}", msg),
            MergeError::Patch(msg) => write!(f, "merge patch error: {}", msg),
        }
    }
}

impl std::error::Error for MergeError {}

/// Fold one change into an ordered collection, returning the updated view.
///
/// - `Removal`: drops the element matching the change's identity; removing
///   an absent item is not an error.
/// - `Addition`: drops any same-identity element first (a race between the
///   initial fetch and a live event must not duplicate), then inserts the
///   resource at its ordering-correct position via a stable merge. On equal
///   ordering keys the new element is placed first among the ties.
/// - `Update`: patches only the attributes present in the partial set on the
///   matching element; everything else passes through untouched. The element
///   keeps its position even if the ordering attribute changed - the live
///   collection does not re-sort on attribute drift.
pub fn apply<R: Resource>(
    collection: &[R],
    change: &ResourceChange,
    ordering: &str,
    direction: Direction,
) -> Result<Vec<R>, MergeError> {
    match change {
        ResourceChange::Removal { identity, .. } => Ok(collection
            .iter()
            .filter(|element| element.identity() != *identity)
            .cloned()
            .collect()),

        ResourceChange::Addition {
            identity, resource, ..
        } => {
            let incoming: R =
                resource_from_attrs(resource).map_err(|e| MergeError::Decode(e.to_string()))?;

            let mut merged: Vec<R> = collection
                .iter()
                .filter(|element| element.identity() != *identity)
                .cloned()
                .collect();

            let key = incoming.attr(ordering).unwrap_or(Value::Null);
            let position = merged
                .iter()
                .position(|element| {
                    let existing = element.attr(ordering).unwrap_or(Value::Null);
                    let cmp = scalar_cmp(&existing, &key);
                    match direction {
                        Direction::Ascending => cmp != Ordering::Less,
                        Direction::Descending => cmp != Ordering::Greater,
                    }
                })
                .unwrap_or(merged.len());

            merged.insert(position, incoming);
            Ok(merged)
        }

        ResourceChange::Update {
            identity, partial, ..
        } => collection
            .iter()
            .map(|element| {
                if element.identity() == *identity {
                    patch(element, partial)
                } else {
                    Ok(element.clone())
                }
            })
            .collect(),
    }
}

/// Overlay a partial attribute set onto one element.
pub fn patch<R: Resource>(element: &R, partial: &AttrMap) -> Result<R, MergeError> {
    let mut attrs = match serde_json::to_value(element) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(MergeError::Patch("element is not an object".into())),
        Err(e) => return Err(MergeError::Patch(e.to_string())),
    };

    for (attr, value) in partial {
        attrs.insert(attr.clone(), value.clone());
    }

    resource_from_attrs(&attrs).map_err(|e| MergeError::Patch(e.to_string()))
}
