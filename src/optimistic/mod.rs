//! Optimistic mutation queue - locally-applied, unconfirmed changes.
//!
//! Every mutating call first records the change it expects the server to
//! confirm. The records overlay cached views until the call's outcome is
//! known: confirmation replaces the overlay with an authoritative change,
//! failure removes the record and the affected views re-derive their
//! visible state from confirmed state plus the records still pending. That
//! re-derivation - never an inverse-patch subtraction - is what keeps
//! concurrent in-flight edits to the same identity intact when an earlier
//! one rolls back.
//!
//! Records are owned exclusively by the queue and never persisted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::resource::ResourceChange;

/// Identifier for one in-flight mutating operation.
pub type OperationId = u64;

/// A speculative, unconfirmed local mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimisticRecord {
    pub operation_id: OperationId,
    pub change: ResourceChange,
}

/// Issuance-ordered set of pending optimistic records.
pub struct OptimisticQueue {
    records: Mutex<Vec<OptimisticRecord>>,
    next_id: AtomicU64,
}

impl Default for OptimisticQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        OptimisticQueue {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record a newly-issued mutation. Records keep issuance order; the
    /// returned id is what `settle` later removes.
    pub fn begin(&self, change: ResourceChange) -> OperationId {
        let operation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.records.lock().unwrap().push(OptimisticRecord {
            operation_id,
            change,
        });
        operation_id
    }

    /// Remove a record once its operation's outcome is known. Completion
    /// order may differ from issuance order; only the named operation's own
    /// record is touched.
    pub fn settle(&self, operation_id: OperationId) -> Option<ResourceChange> {
        let mut records = self.records.lock().unwrap();
        let position = records
            .iter()
            .position(|r| r.operation_id == operation_id)?;
        Some(records.remove(position).change)
    }

    /// The still-pending changes for one resource type, in issuance order.
    /// This is the fold input for re-deriving a live artifact's visible
    /// state.
    pub fn pending_for(&self, resource_type: &str) -> Vec<ResourceChange> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.change.resource_type() == resource_type)
            .map(|r| r.change.clone())
            .collect()
    }

    /// Number of pending records across all resource types.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}
