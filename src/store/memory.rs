use super::{CountFeed, CountPublisher, SessionStore, StoreResult};
use crate::filter::SessionFilter;
use crate::session::{NewSession, PracticeSession, SessionId};
use std::collections::HashSet;

/// In-memory reference store. It executes `SessionFilter::matches` directly,
/// which makes it the semantic baseline the sqlite backend is tested
/// against, and a convenient fixture for everything above the storage seam.
pub struct MemoryStore {
    rows: Vec<PracticeSession>,
    next_id: SessionId,
    counts: CountPublisher,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.rows.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
            counts: CountPublisher::default(),
        }
    }

    fn matching<'a>(
        &'a self,
        filter: &'a SessionFilter,
    ) -> impl Iterator<Item = &'a PracticeSession> {
        self.rows.iter().filter(|row| filter.matches(row))
    }

    fn retain_and_publish(&mut self, keep: impl Fn(&PracticeSession) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        let removed = before - self.rows.len();
        if removed > 0 {
            let total = self.rows.len();
            self.counts.publish(total);
        }
        removed
    }
}

impl SessionStore for MemoryStore {
    fn count(&self, filter: &SessionFilter) -> StoreResult<usize> {
        Ok(self.matching(filter).count())
    }

    fn list(
        &self,
        size: usize,
        offset: usize,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<PracticeSession>> {
        let mut matching: Vec<&PracticeSession> = self.matching(filter).collect();
        // Same stable order as the sqlite backend: newest first, id breaks ties.
        matching.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(size)
            .cloned()
            .collect())
    }

    fn insert(&mut self, session: NewSession) -> StoreResult<SessionId> {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(PracticeSession {
            id,
            exercise: session.exercise,
            recorded_at: session.recorded_at,
            tempo_bpm: session.tempo_bpm,
        });
        let total = self.rows.len();
        self.counts.publish(total);
        Ok(id)
    }

    fn delete(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize> {
        let targets: HashSet<SessionId> = ids.iter().copied().collect();
        Ok(self.retain_and_publish(|row| !(targets.contains(&row.id) && filter.matches(row))))
    }

    fn delete_other(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize> {
        let spared: HashSet<SessionId> = ids.iter().copied().collect();
        Ok(self.retain_and_publish(|row| spared.contains(&row.id) || !filter.matches(row)))
    }

    fn subscribe_total_count(&mut self) -> StoreResult<CountFeed> {
        let current = self.rows.len();
        Ok(self.counts.subscribe(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};

    fn seed(store: &mut MemoryStore, n: usize) -> Vec<SessionId> {
        (0..n)
            .map(|i| {
                let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::minutes(i as i64);
                store
                    .insert(NewSession::new(format!("exercise {i}"), at, 60 + i as u32))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn list_is_newest_first() {
        let mut store = MemoryStore::new();
        seed(&mut store, 4);
        let page = store.list(10, 0, &SessionFilter::all()).unwrap();
        assert_eq!(page[0].exercise, "exercise 3");
        assert_eq!(page[3].exercise, "exercise 0");
    }

    #[test]
    fn id_breaks_timestamp_ties() {
        let mut store = MemoryStore::new();
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = store.insert(NewSession::new("first", at, 60)).unwrap();
        let b = store.insert(NewSession::new("second", at, 60)).unwrap();
        assert!(b > a);
        let page = store.list(10, 0, &SessionFilter::all()).unwrap();
        assert_eq!(page[0].id, b);
        assert_eq!(page[1].id, a);
    }

    #[test]
    fn delete_respects_the_filter() {
        let mut store = MemoryStore::new();
        let ids = seed(&mut store, 5);
        let fast = SessionFilter::all().tempo_min(63); // matches exercises 3 and 4
        assert_eq!(store.delete(&ids, &fast).unwrap(), 2);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 3);
    }

    #[test]
    fn delete_other_respects_the_filter() {
        let mut store = MemoryStore::new();
        let ids = seed(&mut store, 5);
        let fast = SessionFilter::all().tempo_min(63);
        // Spare the first two ids; only filter-matching others go.
        assert_eq!(store.delete_other(&ids[..2], &fast).unwrap(), 2);
        assert_eq!(store.count(&SessionFilter::all()).unwrap(), 3);
    }

    #[test]
    fn count_feed_tracks_inserts_and_deletes() {
        let mut store = MemoryStore::new();
        let mut feed = store.subscribe_total_count().unwrap();
        assert_eq!(feed.poll_latest(), None);
        let ids = seed(&mut store, 3);
        assert_eq!(feed.poll_latest(), Some(3));
        store.delete(&ids[..1], &SessionFilter::all()).unwrap();
        assert_eq!(feed.poll_latest(), Some(2));
    }

    #[test]
    fn no_op_delete_does_not_emit() {
        let mut store = MemoryStore::new();
        seed(&mut store, 3);
        let mut feed = store.subscribe_total_count().unwrap();
        feed.poll_latest();
        store.delete(&[999], &SessionFilter::all()).unwrap();
        assert_eq!(feed.poll_latest(), None);
    }
}
