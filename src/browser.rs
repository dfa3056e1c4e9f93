use crate::bulk;
use crate::filter::SessionFilter;
use crate::selection::SelectionEngine;
use crate::session::Page;
use crate::store::{CountFeed, SessionStore, StoreResult};
use crate::window::resolve_window;

/// Visible state of the list. Transitions are monotonic per load generation:
/// `Loading` → `Ready`, never backwards because of a stale completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

/// Ticket identifying one load request. A completion carrying a stale token
/// (superseded by a newer filter or page request) is discarded on apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken {
    generation: u64,
}

/// Per-screen controller owning the selection engine, the active filter and
/// the loaded page. All selection mutations funnel through this single
/// owner, which is the serialization the engine relies on.
pub struct SessionBrowser<S: SessionStore> {
    store: S,
    filter: SessionFilter,
    page_size: usize,
    engine: SelectionEngine,
    counts: CountFeed,
    page: Page,
    load_state: LoadState,
    generation: u64,
    requested_offset: i64,
}

impl<S: SessionStore> SessionBrowser<S> {
    pub fn new(mut store: S, filter: SessionFilter, page_size: usize) -> StoreResult<Self> {
        let counts = store.subscribe_total_count()?;
        let total = store.count(&SessionFilter::all())?;
        let mut browser = Self {
            store,
            filter,
            page_size,
            engine: SelectionEngine::new(total),
            counts,
            page: Page::empty(),
            load_state: LoadState::Loading,
            generation: 0,
            requested_offset: 0,
        };
        let token = browser.begin_load(0);
        let page = browser.fetch(0)?;
        browser.apply_loaded(token, page);
        Ok(browser)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SelectionEngine {
        &mut self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Stamp a new load request. Any in-flight load is superseded: its token
    /// goes stale and [`apply_loaded`](Self::apply_loaded) will reject it.
    pub fn begin_load(&mut self, requested_offset: i64) -> LoadToken {
        self.generation += 1;
        self.requested_offset = requested_offset;
        self.load_state = LoadState::Loading;
        LoadToken {
            generation: self.generation,
        }
    }

    /// Run the windowed read for a requested offset against the current
    /// filter. The offset is re-clamped against the count taken here, so a
    /// stale offset still yields the fullest possible page.
    pub fn fetch(&self, requested_offset: i64) -> StoreResult<Page> {
        let total = self.store.count(&self.filter)?;
        let window = resolve_window(self.page_size as i64, requested_offset, total);
        let items = if window.is_empty() {
            Vec::new()
        } else {
            self.store.list(window.size, window.offset, &self.filter)?
        };
        Ok(Page {
            items,
            offset: window.offset,
        })
    }

    /// Install a completed load if its token is still current. Stale
    /// completions are dropped so the visible state never regresses to an
    /// out-of-order result.
    pub fn apply_loaded(&mut self, token: LoadToken, page: Page) -> bool {
        if token.generation != self.generation {
            return false;
        }
        self.page = page;
        self.load_state = LoadState::Ready;
        true
    }

    /// Begin, fetch and apply in one step. The front-end uses this; the
    /// split API above exists for callers that run fetches off-thread.
    pub fn load_page(&mut self, requested_offset: i64) -> StoreResult<&Page> {
        let token = self.begin_load(requested_offset);
        let page = self.fetch(requested_offset)?;
        self.apply_loaded(token, page);
        Ok(&self.page)
    }

    /// Swap the active filter and reload from the top. A no-op when the new
    /// filter equals the current one.
    pub fn set_filter(&mut self, filter: SessionFilter) -> StoreResult<()> {
        if filter == self.filter {
            return Ok(());
        }
        self.filter = filter;
        self.load_page(0)?;
        Ok(())
    }

    /// Drain the live total-count feed. On an emission the selection is
    /// reset to the new cardinality and the current page reloaded. Every
    /// emission is authoritative, even an increase from an insert that
    /// touched nothing the user selected — the selection is discarded all
    /// the same (see DESIGN.md). Returns whether a reset happened.
    pub fn pump_counts(&mut self) -> StoreResult<bool> {
        let Some(total) = self.counts.poll_latest() else {
            return Ok(false);
        };
        self.engine.reset(total);
        let requested = self.requested_offset;
        self.load_page(requested)?;
        Ok(true)
    }

    /// Resolve the current selection into one bulk delete, then pump the
    /// count feed so the engine reset flows through the same path an
    /// external mutation would take.
    pub fn delete_selected(&mut self) -> StoreResult<usize> {
        let affected = bulk::delete_selected(&mut self.store, self.engine.state(), &self.filter)?;
        self.pump_counts()?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;
    use crate::session::NewSession;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use chrono::{Duration, Local, TimeZone};

    fn seeded_store(n: usize) -> MemoryStore {
        let mut store = MemoryStore::new();
        for i in 0..n {
            let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(i as i64);
            store
                .insert(NewSession::new(format!("exercise {i}"), at, 60 + i as u32))
                .unwrap();
        }
        store
    }

    #[test]
    fn new_browser_loads_first_page_and_skips_count_replay() {
        let mut browser = SessionBrowser::new(seeded_store(30), SessionFilter::all(), 10).unwrap();
        assert_eq!(browser.load_state(), LoadState::Ready);
        assert_eq!(browser.page().len(), 10);
        assert_eq!(browser.page().offset, 0);
        assert_eq!(browser.engine().total_item_count(), 30);
        // The replayed initial count must not reset a fresh screen.
        assert!(!browser.pump_counts().unwrap());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut browser = SessionBrowser::new(seeded_store(30), SessionFilter::all(), 10).unwrap();
        let stale = browser.begin_load(0);
        let stale_page = browser.fetch(0).unwrap();
        let current = browser.begin_load(20);
        let current_page = browser.fetch(20).unwrap();
        // Completions arrive out of order: newest first, then the stale one.
        assert!(browser.apply_loaded(current, current_page));
        assert_eq!(browser.load_state(), LoadState::Ready);
        assert!(!browser.apply_loaded(stale, stale_page));
        assert_eq!(browser.page().offset, 20);
        assert_eq!(browser.load_state(), LoadState::Ready);
    }

    #[test]
    fn count_change_resets_selection_even_on_unrelated_insert() {
        let mut browser = SessionBrowser::new(seeded_store(10), SessionFilter::all(), 5).unwrap();
        browser.engine_mut().select_all();
        assert_eq!(browser.engine().selected_item_count(), 10);

        let at = Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        browser
            .store_mut()
            .insert(NewSession::new("new elsewhere", at, 100))
            .unwrap();

        assert!(browser.pump_counts().unwrap());
        assert_matches!(browser.engine().state(), Selection::Inactive);
        assert_eq!(browser.engine().total_item_count(), 11);
    }

    #[test]
    fn delete_selected_shrinks_collection_and_resets_engine() {
        let mut browser = SessionBrowser::new(seeded_store(20), SessionFilter::all(), 10).unwrap();
        browser.engine_mut().select_all();
        for id in browser.page().items[..3].iter().map(|s| s.id).collect::<Vec<_>>() {
            browser.engine_mut().click(id, || ());
        }
        assert_eq!(browser.engine().selected_item_count(), 17);

        let affected = browser.delete_selected().unwrap();
        assert_eq!(affected, 17);
        assert_matches!(browser.engine().state(), Selection::Inactive);
        assert_eq!(browser.engine().total_item_count(), 3);
        assert_eq!(browser.page().len(), 3);
    }

    #[test]
    fn inactive_delete_is_a_no_op() {
        let mut browser = SessionBrowser::new(seeded_store(5), SessionFilter::all(), 10).unwrap();
        assert_eq!(browser.delete_selected().unwrap(), 0);
        assert_eq!(browser.engine().total_item_count(), 5);
    }

    #[test]
    fn page_reclamps_when_collection_shrinks_under_a_stale_offset() {
        let mut browser = SessionBrowser::new(seeded_store(30), SessionFilter::all(), 10).unwrap();
        browser.load_page(20).unwrap();
        assert_eq!(browser.page().offset, 20);

        // Everything past the first dozen goes away behind our back.
        let survivors: Vec<_> = browser
            .store()
            .list(12, 18, &SessionFilter::all())
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        browser
            .store_mut()
            .delete_other(&survivors, &SessionFilter::all())
            .unwrap();

        assert!(browser.pump_counts().unwrap());
        // Requested offset 20 is stale against a total of 12; clamped to 2.
        assert_eq!(browser.page().offset, 2);
        assert_eq!(browser.page().len(), 10);
    }

    #[test]
    fn filter_change_reloads_from_the_top() {
        let mut browser = SessionBrowser::new(seeded_store(30), SessionFilter::all(), 10).unwrap();
        browser.load_page(20).unwrap();
        let filter = SessionFilter::all().tempo_min(85); // exercises 25..30
        browser.set_filter(filter.clone()).unwrap();
        assert_eq!(browser.page().offset, 0);
        assert_eq!(browser.page().len(), 5);
        assert!(browser.page().items.iter().all(|s| s.tempo_bpm >= 85));
        // Setting the identical filter again changes nothing.
        browser.set_filter(filter).unwrap();
        assert_eq!(browser.page().len(), 5);
    }

    #[test]
    fn filtered_delete_only_touches_matching_rows() {
        let filter = SessionFilter::all().tempo_min(70); // exercises 10..20
        let mut browser = SessionBrowser::new(seeded_store(20), filter, 10).unwrap();
        browser.engine_mut().select_all();
        let affected = browser.delete_selected().unwrap();
        assert_eq!(affected, 10);
        assert_eq!(browser.store().count(&SessionFilter::all()).unwrap(), 10);
    }
}
