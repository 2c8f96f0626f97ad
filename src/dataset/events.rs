//! Change notifications raised by a DataSet.

use super::{RowKey, SetKey};

/// Notification delivered to every subscribed observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSetEvent {
    /// A row was attached at `ordinal` (after-insert).
    RowInserted {
        set: SetKey,
        row: RowKey,
        ordinal: usize,
    },
    /// A row was taken out of `set`; its disposal follows.
    RowRemoved {
        set: SetKey,
        row: RowKey,
        ordinal: usize,
    },
    /// A row was disposed. Raised top-down for a removed row and every
    /// descendant.
    RowDisposed { row: RowKey },
    /// A stored value was written, or a computed value was invalidated.
    ValueChanged { row: RowKey, slot: usize },
}

/// Handle returned by `DataSet::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

pub(crate) type Observer = Box<dyn FnMut(&DataSetEvent)>;
