use crate::filter::SessionFilter;
use crate::selection::Selection;
use crate::session::SessionId;
use crate::store::{SessionStore, StoreResult};

/// Resolve a selection plus the active filter into exactly one store delete
/// and return the number of rows actually removed.
///
/// The selection is a client-side snapshot of intent, not a live set: ids
/// that vanished or stopped matching the filter since the user selected them
/// are silently excluded, so the returned count may be smaller than
/// `selected_item_count`. On storage failure the selection is untouched and
/// the call can be retried with identical semantics.
pub fn delete_selected<S: SessionStore + ?Sized>(
    store: &mut S,
    selection: &Selection,
    filter: &SessionFilter,
) -> StoreResult<usize> {
    match selection {
        Selection::Inactive => Ok(0),
        Selection::Inclusive(selected) => {
            let ids = sorted_ids(selected.iter());
            store.delete(&ids, filter)
        }
        Selection::Exclusive(unselected) => {
            let ids = sorted_ids(unselected.iter());
            store.delete_other(&ids, filter)
        }
    }
}

// Hash-set iteration order is arbitrary; sorting keeps the issued SQL
// deterministic, which matters for log diffing and test stability.
fn sorted_ids<'a>(ids: impl Iterator<Item = &'a SessionId>) -> Vec<SessionId> {
    let mut ids: Vec<SessionId> = ids.copied().collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionEngine;
    use crate::session::NewSession;
    use crate::store::MemoryStore;
    use chrono::{Duration, Local, TimeZone};

    fn seeded_store(n: usize) -> (MemoryStore, Vec<SessionId>) {
        let mut store = MemoryStore::new();
        let ids = (0..n)
            .map(|i| {
                let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::minutes(i as i64);
                store
                    .insert(NewSession::new(format!("exercise {i}"), at, 60))
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn inactive_selection_is_a_no_op() {
        let (mut store, _) = seeded_store(5);
        let affected =
            delete_selected(&mut store, &Selection::Inactive, &SessionFilter::all()).unwrap();
        assert_eq!(affected, 0);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 5);
    }

    #[test]
    fn inclusive_selection_deletes_only_matching_rows() {
        let (mut store, ids) = seeded_store(666);
        let mut engine = SelectionEngine::new(666);
        for id in &ids[..222] {
            engine.long_press(*id);
        }
        assert_eq!(engine.selected_item_count(), 222);

        // A filter matching none of the selected rows: nothing goes.
        let miss = SessionFilter::all().exercise_contains("no such exercise");
        let affected = delete_selected(&mut store, engine.state(), &miss).unwrap();
        assert_eq!(affected, 0);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 666);

        // A filter matching all of them: exactly the selection goes.
        let affected =
            delete_selected(&mut store, engine.state(), &SessionFilter::all()).unwrap();
        assert_eq!(affected, 222);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 444);
    }

    #[test]
    fn exclusive_selection_deletes_everything_but_the_exclusions() {
        let (mut store, ids) = seeded_store(666);
        let mut engine = SelectionEngine::new(666);
        engine.select_all();
        for id in &ids[444..] {
            engine.click(*id, || ());
        }
        assert_eq!(engine.selected_item_count(), 444);

        let affected =
            delete_selected(&mut store, engine.state(), &SessionFilter::all()).unwrap();
        assert_eq!(affected, 444);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 222);
    }

    #[test]
    fn stale_ids_shrink_the_affected_count() {
        let (mut store, ids) = seeded_store(10);
        let mut engine = SelectionEngine::new(10);
        for id in &ids[..4] {
            engine.long_press(*id);
        }
        // Two of the selected rows disappear out from under the selection.
        store.delete(&ids[..2], &SessionFilter::all()).unwrap();
        let affected =
            delete_selected(&mut store, engine.state(), &SessionFilter::all()).unwrap();
        assert_eq!(affected, 2);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 6);
    }

    #[test]
    fn post_delete_count_round_trips() {
        let (mut store, ids) = seeded_store(50);
        let filter = SessionFilter::all().tempo_min(60);
        let before = store.count(&filter).unwrap();
        let mut engine = SelectionEngine::new(50);
        for id in &ids[10..25] {
            engine.long_press(*id);
        }
        let affected = delete_selected(&mut store, engine.state(), &filter).unwrap();
        assert_eq!(store.count(&filter).unwrap(), before - affected);
    }
}
