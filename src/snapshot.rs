//! In-memory projection of the organization panel's persisted constants.
//!
//! Timezone, membership baseline, treasurer name and the like are read on
//! every dependent computation; this cache avoids a store round trip each
//! time. It is process-local, rebuilt wholesale from the store after every
//! successful organization save, and never a source of truth.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::db::values::ValueRow;

/// Flattened `{field_name: display_value}` view of the organization panel.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: Mutex<HashMap<String, String>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot from raw store rows, flattening them to the map
    /// shape. Values render through their display form (amounts as
    /// two-decimal strings).
    pub fn replace_with_rows(&self, rows: &[ValueRow]) {
        let map = rows
            .iter()
            .map(|row| (row.field.clone(), row.value.display()))
            .collect();
        *self.inner.lock() = map;
    }

    /// Replace the snapshot from an already-flattened map.
    pub fn replace(&self, map: HashMap<String, String>) {
        *self.inner.lock() = map;
    }

    /// The current snapshot; empty before first population.
    pub fn get(&self) -> HashMap<String, String> {
        self.inner.lock().clone()
    }

    /// Convenience lookup for a single organization constant.
    pub fn field(&self, name: &str) -> Option<String> {
        self.inner.lock().get(name).cloned()
    }
}
