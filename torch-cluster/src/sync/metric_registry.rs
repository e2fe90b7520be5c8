//! Deduplicated multiaddress metric records

use parking_lot::Mutex;
use std::sync::Arc;

use torch_core::metrics::MetricSink;
use torch_core::MultiAddrEntry;

/// Known multiaddress entries, unique by address
///
/// Every accepted entry triggers a full re-emit so the sink always mirrors
/// the complete set.
pub struct MetricRegistry {
    entries: Mutex<Vec<MultiAddrEntry>>,
    sink: Arc<dyn MetricSink>,
    service_name: String,
    namespace: String,
}

impl MetricRegistry {
    pub fn new(
        sink: Arc<dyn MetricSink>,
        service_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink,
            service_name: service_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Add `entry` unless its address is already known
    ///
    /// Returns whether the entry was accepted.
    pub fn register(&self, entry: MultiAddrEntry) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.multiaddress == entry.multiaddress) {
            tracing::info!(
                node_name = %entry.node_name,
                multiaddress = %entry.multiaddress,
                "Multiaddress already registered"
            );
            return false;
        }
        entries.push(entry);
        self.sink.emit(&entries);
        true
    }

    /// Register a resolved node under this service and namespace
    pub fn record(&self, node_name: &str, address: &str) -> bool {
        self.register(MultiAddrEntry::present(
            self.service_name.as_str(),
            node_name,
            address,
            self.namespace.as_str(),
        ))
    }

    #[must_use]
    pub fn entries(&self) -> Vec<MultiAddrEntry> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingSink;

    #[test]
    fn test_duplicate_address_rejected() {
        let sink = RecordingSink::new();
        let registry = MetricRegistry::new(sink.clone(), "torch", "celestia");

        assert!(registry.record("da-e", "addr-X"));
        assert!(!registry.record("da-f", "addr-X"));

        let entries = registry.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].node_name, "da-e");
        assert_eq!(entries[0].multiaddress, "addr-X");
        assert_eq!(sink.emissions(), 1);
    }

    #[test]
    fn test_each_acceptance_re_emits_full_set() {
        let sink = RecordingSink::new();
        let registry = MetricRegistry::new(sink.clone(), "torch", "celestia");

        registry.record("da-0", "addr-0");
        registry.record("da-1", "addr-1");
        registry.record("da-2", "addr-2");

        assert_eq!(sink.emissions(), 3);
        let last = sink.last();
        assert_eq!(last.len(), 3);
        assert!(last.iter().all(|e| e.namespace == "celestia" && e.value == 1.0));
    }

    #[test]
    fn test_same_node_new_address_is_accepted() {
        let registry = MetricRegistry::new(RecordingSink::new(), "torch", "ns");
        assert!(registry.record("da-0", "addr-old"));
        assert!(registry.record("da-0", "addr-new"));
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
