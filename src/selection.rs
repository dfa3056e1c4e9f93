use crate::session::SessionId;
use std::collections::HashSet;

/// Multi-select state for one browsing screen.
///
/// The two active representations are duals: `Inclusive` stores the selected
/// ids directly, `Exclusive` stores the *deselected* ids and treats everything
/// else (relative to the known total) as selected. "Select all, then deselect
/// a few" costs O(deselected) this way instead of O(collection).
///
/// An empty `Inclusive` set and a full `Exclusive` set are illegal; the engine
/// collapses either to `Inactive` before anything can observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Inactive,
    Inclusive(HashSet<SessionId>),
    Exclusive(HashSet<SessionId>),
}

/// Token returned by [`SelectionEngine::subscribe_activeness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

type ActivenessObserver = Box<dyn FnMut(bool)>;

/// Per-screen selection state machine. Single-owner, single-threaded: the
/// screen controller that owns it serializes all mutations, so there is no
/// internal locking. It stores identifiers only, never records.
pub struct SelectionEngine {
    state: Selection,
    total_item_count: usize,
    observers: Vec<(SubscriptionId, ActivenessObserver)>,
    next_subscription: usize,
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("state", &self.state)
            .field("total_item_count", &self.total_item_count)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SelectionEngine {
    pub fn new(total_item_count: usize) -> Self {
        Self {
            state: Selection::Inactive,
            total_item_count,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &Selection {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, Selection::Inactive)
    }

    pub fn total_item_count(&self) -> usize {
        self.total_item_count
    }

    /// Number of currently selected items, in `[0, total_item_count]`.
    pub fn selected_item_count(&self) -> usize {
        match &self.state {
            Selection::Inactive => 0,
            Selection::Inclusive(selected) => selected.len(),
            Selection::Exclusive(unselected) => {
                self.total_item_count.saturating_sub(unselected.len())
            }
        }
    }

    /// Membership query, correct for either representation, no allocation.
    pub fn is_selected(&self, id: SessionId) -> bool {
        match &self.state {
            Selection::Inactive => false,
            Selection::Inclusive(selected) => selected.contains(&id),
            Selection::Exclusive(unselected) => !unselected.contains(&id),
        }
    }

    /// Long press: enters selection mode on a single item, or toggles like a
    /// plain click when selection mode is already active. Returns the item's
    /// new selected flag.
    pub fn long_press(&mut self, id: SessionId) -> bool {
        match self.state {
            Selection::Inactive => {
                self.state = Selection::Inclusive(HashSet::from([id]));
                self.notify_activeness(true);
                true
            }
            _ => self.toggle(id),
        }
    }

    /// Click: while inactive, runs the primary action (`on_inactive`) and
    /// returns `None`; while active, toggles membership and returns the
    /// item's new selected flag.
    pub fn click(&mut self, id: SessionId, on_inactive: impl FnOnce()) -> Option<bool> {
        match self.state {
            Selection::Inactive => {
                on_inactive();
                None
            }
            _ => Some(self.toggle(id)),
        }
    }

    /// Select every item by switching to `Exclusive(∅)`. On an empty
    /// collection there is nothing to select and the result is `Inactive`.
    pub fn select_all(&mut self) {
        let was_active = self.is_active();
        if self.total_item_count == 0 {
            self.state = Selection::Inactive;
            if was_active {
                self.notify_activeness(false);
            }
            return;
        }
        self.state = Selection::Exclusive(HashSet::new());
        if !was_active {
            self.notify_activeness(true);
        }
    }

    /// Leave selection mode, whatever the current state.
    pub fn deselect_all(&mut self) {
        if self.is_active() {
            self.state = Selection::Inactive;
            self.notify_activeness(false);
        }
    }

    /// The live total count changed: discard any in-progress selection and
    /// adopt the new cardinality. Deliberately destructive, even when the
    /// change was an unrelated insert that touched nothing the user selected
    /// (matches the shipped behavior; see DESIGN.md before changing).
    pub fn reset(&mut self, new_total_count: usize) {
        let was_active = self.is_active();
        self.state = Selection::Inactive;
        self.total_item_count = new_total_count;
        if was_active {
            self.notify_activeness(false);
        }
    }

    /// Register an observer for `Inactive ⇄ Active` edges. It fires exactly
    /// once per boundary crossing, never on individual toggles, so a toolbar
    /// can show/hide its bulk affordances without churn.
    pub fn subscribe_activeness(&mut self, observer: impl FnMut(bool) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe_activeness(&mut self, id: SubscriptionId) {
        self.observers.retain(|(sub, _)| *sub != id);
    }

    /// Flip membership of `id` in the active representation, collapsing to
    /// `Inactive` when the flip empties the selection. The new flag is
    /// reported even when the flip deactivates the engine, so the caller can
    /// unhighlight the just-toggled row before leaving selection mode.
    fn toggle(&mut self, id: SessionId) -> bool {
        let now_selected = match &mut self.state {
            Selection::Inactive => unreachable!("toggle is only reachable while active"),
            Selection::Inclusive(selected) => {
                if !selected.remove(&id) {
                    selected.insert(id);
                }
                selected.contains(&id)
            }
            Selection::Exclusive(unselected) => {
                // Inverted semantics: inserting into the exclusion set
                // deselects the item.
                if !unselected.remove(&id) {
                    unselected.insert(id);
                }
                !unselected.contains(&id)
            }
        };
        if self.selection_exhausted() {
            self.state = Selection::Inactive;
            self.notify_activeness(false);
        }
        now_selected
    }

    fn selection_exhausted(&self) -> bool {
        match &self.state {
            Selection::Inactive => false,
            Selection::Inclusive(selected) => selected.is_empty(),
            Selection::Exclusive(unselected) => unselected.len() == self.total_item_count,
        }
    }

    fn notify_activeness(&mut self, active: bool) {
        for (_, observer) in &mut self.observers {
            observer(active);
        }
    }
}
