// ── Partition store ──
//
// Thin owner around the pure `Partition` transition. One surface owns
// the store and mutates it through `&mut self`; every operation publishes
// the selected ids on a `watch` channel.

use std::sync::Arc;

use tokio::sync::watch;

use super::{ItemId, Operation, Partition, Transfers};
use crate::stream::SnapshotStream;

/// Selected ids in display order.
pub type Selection<I> = Arc<Vec<I>>;

/// Subscription to a store's selection. Yields once per operation
/// dispatched after subscribing.
pub type SelectionStream<I> = SnapshotStream<Vec<I>>;

/// Owns the current partition and notifies on selection changes.
pub struct PartitionStore<I: ItemId> {
    partition: Partition<I>,
    selection: watch::Sender<Selection<I>>,
}

impl<I: ItemId> PartitionStore<I> {
    pub fn new(
        universe: impl IntoIterator<Item = I>,
        selected: impl IntoIterator<Item = I>,
    ) -> Self {
        let partition = Partition::new(universe, selected);
        let (selection, _) = watch::channel(Arc::new(collect_selected(&partition)));
        Self {
            partition,
            selection,
        }
    }

    /// Run one operation and publish the resulting selection.
    ///
    /// Publishes even when the selection did not change, so each call
    /// wakes subscribers exactly once.
    pub fn dispatch(&mut self, op: Operation<I>) -> &Partition<I> {
        tracing::trace!(?op, "partition operation");
        self.partition = self.partition.apply(op);
        self.selection
            .send_replace(Arc::new(collect_selected(&self.partition)));
        &self.partition
    }

    // ── Operations ───────────────────────────────────────────────────

    pub fn initialize(&mut self, universe: Vec<I>, selected: Vec<I>) {
        self.dispatch(Operation::Initialize { universe, selected });
    }

    pub fn toggle_checked(&mut self, id: I) {
        self.dispatch(Operation::ToggleChecked(id));
    }

    pub fn move_checked_to_selected(&mut self) {
        self.dispatch(Operation::MoveCheckedToSelected);
    }

    pub fn move_checked_to_available(&mut self) {
        self.dispatch(Operation::MoveCheckedToAvailable);
    }

    pub fn move_all_to_selected(&mut self) {
        self.dispatch(Operation::MoveAllToSelected);
    }

    pub fn move_all_to_available(&mut self) {
        self.dispatch(Operation::MoveAllToAvailable);
    }

    pub fn replace_universe(&mut self, universe: Vec<I>) {
        self.dispatch(Operation::ReplaceUniverse(universe));
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current selected ids (cheap `Arc` clone).
    pub fn selected(&self) -> Selection<I> {
        self.selection.borrow().clone()
    }

    pub fn partition(&self) -> &Partition<I> {
        &self.partition
    }

    pub fn transfers(&self) -> Transfers {
        self.partition.transfers()
    }

    /// Subscribe to selection changes.
    pub fn subscribe(&self) -> SelectionStream<I> {
        SnapshotStream::new(self.selection.subscribe())
    }
}

fn collect_selected<I: ItemId>(partition: &Partition<I>) -> Vec<I> {
    partition.selected().iter().cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn dispatch_updates_selection() {
        let mut store = PartitionStore::new(1..=5u64, [3, 5]);
        store.toggle_checked(1);
        store.toggle_checked(2);
        store.move_checked_to_selected();

        assert_eq!(*store.selected(), vec![3, 5, 1, 2]);
        assert_eq!(
            store.partition().available().iter().copied().collect::<Vec<_>>(),
            vec![4]
        );
        assert!(store.partition().checked().is_empty());
    }

    #[test]
    fn initialize_resets_everything() {
        let mut store = PartitionStore::new(1..=3u64, [1]);
        store.toggle_checked(2);
        store.initialize(vec![7, 8], vec![8, 1]);

        assert_eq!(*store.selected(), vec![8]);
        assert!(store.partition().checked().is_empty());
        assert!(store.transfers().all_to_selected);
    }

    #[test]
    fn every_operation_notifies() {
        let mut store = PartitionStore::new(1..=3u64, []);
        let mut stream = task::spawn(store.subscribe().into_changes());
        assert_pending!(stream.poll_next());

        // A toggle leaves the selection unchanged but still publishes.
        store.toggle_checked(1);
        assert!(stream.is_woken());
        assert_ready_eq!(stream.poll_next(), Some(Arc::new(vec![])));
        assert_pending!(stream.poll_next());

        store.move_checked_to_selected();
        assert_ready_eq!(stream.poll_next(), Some(Arc::new(vec![1])));
    }

    #[tokio::test]
    async fn changed_returns_latest_selection() {
        let mut store = PartitionStore::new(1..=3u64, []);
        let mut sub = store.subscribe();
        assert!(sub.current().is_empty());

        store.move_all_to_selected();
        let selection = sub.changed().await.unwrap();
        assert_eq!(*selection, vec![1, 2, 3]);
        assert_eq!(**sub.current(), vec![1, 2, 3]);

        drop(store);
        assert!(sub.changed().await.is_none());
    }

    #[tokio::test]
    async fn stream_ends_with_store() {
        let mut store = PartitionStore::new(1..=2u64, []);
        let stream = store.subscribe().into_stream();

        store.move_all_to_selected();
        store.replace_universe(vec![2, 9]);
        drop(store);

        // Intermediate values may be coalesced; the last one is always seen.
        let seen: Vec<_> = stream.collect().await;
        assert_eq!(seen.last().map(|s| s.to_vec()), Some(vec![2]));
    }
}
