// ── Item partition ──
//
// Splits a universe of identifiers into two panes, "available" and
// "selected", plus a transient "checked" subset used for batch moves.
// Transitions are a pure function of (state, operation); `PartitionStore`
// owns the current value and publishes selection changes.
//
// After every transition:
//   available ∩ selected = ∅
//   available ∪ selected = universe
//   checked ⊆ universe

mod store;

use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;

pub use store::{PartitionStore, Selection, SelectionStream};

/// Bound shared by everything that can be partitioned.
pub trait ItemId: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> ItemId for T {}

// ── Operation ───────────────────────────────────────────────────────

/// Every mutation a partition accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<I> {
    /// Reset to `universe`, with the ids of `selected` that exist in it on
    /// the selected side.
    Initialize { universe: Vec<I>, selected: Vec<I> },
    /// Flip the checked mark of one item. Ids outside the universe are ignored.
    ToggleChecked(I),
    MoveCheckedToSelected,
    MoveCheckedToAvailable,
    MoveAllToSelected,
    MoveAllToAvailable,
    /// Swap in a new universe, keeping side membership and checked marks
    /// of the ids that survive.
    ReplaceUniverse(Vec<I>),
}

// ── Transfers ───────────────────────────────────────────────────────

/// Which of the four transfer buttons can do anything right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Transfers {
    pub all_to_selected: bool,
    pub checked_to_selected: bool,
    pub checked_to_available: bool,
    pub all_to_available: bool,
}

// ── Partition ───────────────────────────────────────────────────────

/// Immutable partition value.
///
/// Panes keep a stable display order: the universe order at seeding time,
/// with moved items appended to the destination in their source order.
/// Equality compares set membership only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<I: ItemId> {
    universe: IndexSet<I>,
    available: IndexSet<I>,
    selected: IndexSet<I>,
    checked: IndexSet<I>,
}

impl<I: ItemId> Default for Partition<I> {
    fn default() -> Self {
        Self {
            universe: IndexSet::new(),
            available: IndexSet::new(),
            selected: IndexSet::new(),
            checked: IndexSet::new(),
        }
    }
}

impl<I: ItemId> Partition<I> {
    /// Seed a partition. Duplicates collapse; selected ids outside the
    /// universe are dropped.
    pub fn new(
        universe: impl IntoIterator<Item = I>,
        selected: impl IntoIterator<Item = I>,
    ) -> Self {
        let universe: IndexSet<I> = universe.into_iter().collect();
        let selected: IndexSet<I> = selected
            .into_iter()
            .filter(|id| universe.contains(id))
            .collect();
        let available = universe
            .iter()
            .filter(|id| !selected.contains(*id))
            .cloned()
            .collect();

        Self {
            universe,
            available,
            selected,
            checked: IndexSet::new(),
        }
    }

    /// Apply one operation, returning the next partition.
    pub fn apply(&self, op: Operation<I>) -> Self {
        let next = match op {
            Operation::Initialize { universe, selected } => Self::new(universe, selected),
            Operation::ToggleChecked(id) => self.toggle_checked(id),
            Operation::MoveCheckedToSelected => {
                let (available, selected, checked) =
                    move_checked(&self.available, &self.selected, &self.checked);
                Self {
                    universe: self.universe.clone(),
                    available,
                    selected,
                    checked,
                }
            }
            Operation::MoveCheckedToAvailable => {
                let (selected, available, checked) =
                    move_checked(&self.selected, &self.available, &self.checked);
                Self {
                    universe: self.universe.clone(),
                    available,
                    selected,
                    checked,
                }
            }
            Operation::MoveAllToSelected => Self {
                universe: self.universe.clone(),
                available: IndexSet::new(),
                selected: concat(&self.selected, &self.available),
                checked: IndexSet::new(),
            },
            Operation::MoveAllToAvailable => Self {
                universe: self.universe.clone(),
                available: concat(&self.available, &self.selected),
                selected: IndexSet::new(),
                checked: IndexSet::new(),
            },
            Operation::ReplaceUniverse(universe) => self.replace_universe(universe),
        };

        debug_assert!(next.is_consistent(), "partition invariant violated");
        next
    }

    fn toggle_checked(&self, id: I) -> Self {
        let mut next = self.clone();
        if !next.universe.contains(&id) {
            return next;
        }
        if !next.checked.shift_remove(&id) {
            next.checked.insert(id);
        }
        next
    }

    fn replace_universe(&self, universe: Vec<I>) -> Self {
        let universe: IndexSet<I> = universe.into_iter().collect();

        let selected: IndexSet<I> = self
            .selected
            .iter()
            .filter(|id| universe.contains(*id))
            .cloned()
            .collect();

        // Survivors keep their place; newcomers follow in universe order.
        let mut available: IndexSet<I> = self
            .available
            .iter()
            .filter(|id| universe.contains(*id))
            .cloned()
            .collect();
        available.extend(
            universe
                .iter()
                .filter(|id| !selected.contains(*id))
                .cloned(),
        );

        let checked = self
            .checked
            .iter()
            .filter(|id| universe.contains(*id))
            .cloned()
            .collect();

        Self {
            universe,
            available,
            selected,
            checked,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn universe(&self) -> &IndexSet<I> {
        &self.universe
    }

    /// Left pane, in display order.
    pub fn available(&self) -> &IndexSet<I> {
        &self.available
    }

    /// Right pane, in display order.
    pub fn selected(&self) -> &IndexSet<I> {
        &self.selected
    }

    pub fn checked(&self) -> &IndexSet<I> {
        &self.checked
    }

    pub fn is_checked(&self, id: &I) -> bool {
        self.checked.contains(id)
    }

    /// Button enablement for the current state.
    pub fn transfers(&self) -> Transfers {
        Transfers {
            all_to_selected: !self.available.is_empty(),
            checked_to_selected: self.available.iter().any(|id| self.checked.contains(id)),
            checked_to_available: self.selected.iter().any(|id| self.checked.contains(id)),
            all_to_available: !self.selected.is_empty(),
        }
    }

    /// Whether the three partition invariants hold.
    pub fn is_consistent(&self) -> bool {
        let disjoint = self.available.iter().all(|id| !self.selected.contains(id));
        let covering = self.available.len() + self.selected.len() == self.universe.len()
            && self
                .available
                .iter()
                .chain(self.selected.iter())
                .all(|id| self.universe.contains(id));
        let checked_known = self.checked.iter().all(|id| self.universe.contains(id));
        disjoint && covering && checked_known
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Move the checked members of `from` to the end of `to`.
/// Returns `(from, to, checked)` after the move.
fn move_checked<I: ItemId>(
    from: &IndexSet<I>,
    to: &IndexSet<I>,
    checked: &IndexSet<I>,
) -> (IndexSet<I>, IndexSet<I>, IndexSet<I>) {
    let (moved, kept): (IndexSet<I>, IndexSet<I>) =
        from.iter().cloned().partition(|id| checked.contains(id));

    let remaining_checked = checked
        .iter()
        .filter(|id| !moved.contains(*id))
        .cloned()
        .collect();

    (kept, concat(to, &moved), remaining_checked)
}

fn concat<I: ItemId>(head: &IndexSet<I>, tail: &IndexSet<I>) -> IndexSet<I> {
    head.iter().chain(tail.iter()).cloned().collect()
}
