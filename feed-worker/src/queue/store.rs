//! In-memory ordered store of pending queue items.

use std::collections::VecDeque;

use super::types::QueueItem;

/// Ordered sequence of pending items. Insertion order is publish priority.
///
/// Holds no locks of its own; the dispatcher keeps it behind the same mutex
/// as the rate limit gate.
#[derive(Debug, Default)]
pub struct QueueStore {
    items: VecDeque<QueueItem>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to the tail. Returns the new length.
    pub fn enqueue(&mut self, item: QueueItem) -> usize {
        self.items.push_back(item);
        self.items.len()
    }

    /// Independent ordered copy of the current contents.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }

    /// Remove and return the item at `index`, if any.
    pub fn remove_at(&mut self, index: usize) -> Option<QueueItem> {
        self.items.remove(index)
    }

    /// Put an item back at the head so it is the next one attempted.
    pub fn requeue_front(&mut self, item: QueueItem) {
        self.items.push_front(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> QueueItem {
        QueueItem {
            content: format!("{} body", title),
            embed: None,
            languages: vec!["en".to_string()],
            title: title.to_string(),
            date: String::new(),
        }
    }

    fn titles(items: &[QueueItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let mut store = QueueStore::new();
        assert_eq!(store.enqueue(item("A")), 1);
        assert_eq!(store.enqueue(item("B")), 2);
        assert_eq!(store.enqueue(item("C")), 3);

        assert_eq!(titles(&store.snapshot()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut store = QueueStore::new();
        store.enqueue(item("A"));

        let snapshot = store.snapshot();
        store.enqueue(item("B"));
        store.remove_at(0);

        assert_eq!(titles(&snapshot), vec!["A"]);
        assert_eq!(titles(&store.snapshot()), vec!["B"]);
    }

    #[test]
    fn test_remove_at_shifts_following_items() {
        let mut store = QueueStore::new();
        store.enqueue(item("A"));
        store.enqueue(item("B"));
        store.enqueue(item("C"));

        let removed = store.remove_at(1).unwrap();
        assert_eq!(removed.title, "B");
        assert_eq!(titles(&store.snapshot()), vec!["A", "C"]);
        assert!(store.remove_at(5).is_none());
    }

    #[test]
    fn test_requeue_front_goes_ahead_of_everything() {
        let mut store = QueueStore::new();
        store.enqueue(item("A"));
        store.enqueue(item("B"));

        let front = store.remove_at(0).unwrap();
        store.enqueue(item("C"));
        store.requeue_front(front);

        assert_eq!(titles(&store.snapshot()), vec!["A", "B", "C"]);
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
    }
}
