//! Cursors - serializable descriptions of ordered, filtered, paginated queries.
//!
//! A [`Cursor`] names a resource type, an ordering attribute and direction,
//! optional equality filters, an optional exclusive `since` bound, and a page
//! size. Cursors round-trip through opaque continuation tokens, and every
//! [`Page`] carries the cursor that continues it (absent when the sequence is
//! complete relative to the query at fetch time).
//!
//! ## Example
//!
//! ```ignore
//! use synced_rust::{Cursor, Direction};
//!
//! let cursor = Cursor::new::<Task>("created_at", Direction::Ascending)
//!     .with_filter("owner", &"user1")
//!     .with_page_size(25);
//!
//! let token = cursor.to_token();
//! assert_eq!(Cursor::from_token(&token).unwrap(), cursor);
//! ```

mod token;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::resource::{AttrMap, Resource};

/// Default page size when none is given.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Sort direction for a query's ordering attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A query over one resource type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// The resource type being queried.
    pub resource_type: String,
    /// The attribute the results are ordered by.
    pub ordering: String,
    /// Sort direction.
    pub direction: Direction,
    /// Exclusive bound on the ordering attribute: results start strictly
    /// after this value in the query's direction.
    pub since: Option<Value>,
    /// Equality filters over attributes. BTreeMap keeps the serialized form
    /// canonical regardless of construction order.
    pub filters: BTreeMap<String, Value>,
    /// Maximum number of items per page.
    pub page_size: usize,
}

impl Cursor {
    /// Create a cursor over `R`, ordered by the given attribute.
    pub fn new<R: Resource>(ordering: &str, direction: Direction) -> Self {
        Cursor {
            resource_type: R::TYPE_NAME.to_string(),
            ordering: ordering.to_string(),
            direction,
            since: None,
            filters: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Add an equality filter.
    pub fn with_filter<V: Serialize>(mut self, attr: &str, value: &V) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.filters.insert(attr.to_string(), value);
        self
    }

    /// Set the exclusive `since` bound.
    pub fn with_since<V: Serialize>(mut self, value: &V) -> Self {
        self.since = Some(serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Serialize to an opaque continuation token. Round-trip fidelity is
    /// guaranteed within one schema version only.
    pub fn to_token(&self) -> String {
        token::encode(self)
    }

    /// Reconstruct a cursor from a continuation token.
    pub fn from_token(token: &str) -> Result<Self, CursorError> {
        token::decode(token)
    }

    /// True if the given attributes satisfy this cursor's equality filters
    /// and `since` bound. Used by the live-view layer to decide whether an
    /// addition belongs in a collection; the merge engine itself never
    /// filters.
    pub fn accepts(&self, attrs: &AttrMap) -> bool {
        for (attr, expected) in &self.filters {
            if attrs.get(attr) != Some(expected) {
                return false;
            }
        }

        if let Some(since) = &self.since {
            let null = Value::Null;
            let value = attrs.get(&self.ordering).unwrap_or(&null);
            let cmp = scalar_cmp(value, since);
            let in_range = match self.direction {
                Direction::Ascending => cmp == Ordering::Greater,
                Direction::Descending => cmp == Ordering::Less,
            };
            if !in_range {
                return false;
            }
        }

        true
    }
}

/// A fetched slice of a query's results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<R> {
    /// The items, in the cursor's order.
    pub items: Vec<R>,
    /// Cursor continuing the query, or None when the sequence is complete.
    pub next: Option<Cursor>,
}

impl<R> Page<R> {
    /// True when this page ends the sequence for its query.
    pub fn is_complete(&self) -> bool {
        self.next.is_none()
    }
}

/// Total order over scalar attribute values, used for ordering keys and
/// `since` bounds: null < bool < number < string, numbers compared as f64.
/// Composite values (arrays, objects) sort after scalars by their JSON text.
pub fn scalar_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Error type for cursor token operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// The token is not valid base64.
    InvalidToken(String),
    /// The token decoded, but not to a cursor of this schema version.
    Decode(String),
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::InvalidToken(msg) => write!(f, "invalid cursor token: {}", msg),
            CursorError::Decode(msg) => write!(f, "cursor decode error: {}", msg),
        }
    }
}

impl std::error::Error for CursorError {}
