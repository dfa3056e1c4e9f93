use crate::filter::SessionFilter;
use crate::session::{NewSession, PracticeSession, SessionId};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::sync::mpsc::{channel, Receiver, Sender};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Failures surfaced by a session store. Callers treat every operation as
/// safely retryable: deletion is idempotent, so retrying after a failure
/// never removes more than the intended set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The persistence contract the browsing core needs from a backing store.
///
/// Ordering contract for `list`: rows are sorted by `recorded_at`
/// descending, ties broken by id descending, so repeated windowed reads are
/// consistent while the collection is not concurrently mutated. Both
/// backends must apply the exact same filter semantics to all operations;
/// `SessionFilter::matches` is the reference.
pub trait SessionStore {
    /// Number of sessions the filter matches.
    fn count(&self, filter: &SessionFilter) -> StoreResult<usize>;

    /// `size` matching sessions starting at `offset`, in the stable order.
    fn list(&self, size: usize, offset: usize, filter: &SessionFilter)
        -> StoreResult<Vec<PracticeSession>>;

    /// Store a new session, returning its assigned id.
    fn insert(&mut self, session: NewSession) -> StoreResult<SessionId>;

    /// Delete sessions whose id is in `ids` *and* that match the filter, as
    /// one atomic statement. Returns the number of rows actually removed;
    /// ids that no longer exist or no longer match simply do not count.
    fn delete(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize>;

    /// Delete sessions whose id is *not* in `ids` and that match the filter,
    /// as one atomic statement. The exclusive-selection counterpart of
    /// [`SessionStore::delete`].
    fn delete_other(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize>;

    /// Subscribe to the unfiltered total count. The feed replays the current
    /// total as its very first value; see [`CountFeed`] for the drop-first
    /// consumer contract.
    fn subscribe_total_count(&mut self) -> StoreResult<CountFeed>;
}

/// Timestamps are persisted as fixed-width RFC 3339 text in UTC so that
/// lexicographic comparison in sqlite agrees with chronological order.
pub(crate) fn encode_timestamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_timestamp(text: &str) -> Result<DateTime<Local>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Local))
}

/// Consumer end of the live unfiltered-total stream.
///
/// Contract: the first value a subscriber receives is a replay of the total
/// at subscription time, and `poll_latest` skips it. This is deliberate — a
/// screen subscribing at startup must not see a spurious "the count changed"
/// for a count it already knows, which would destroy a selection the moment
/// the screen opens. Every later emission is authoritative, latest-wins.
pub struct CountFeed {
    rx: Receiver<usize>,
    replay_skipped: bool,
}

impl CountFeed {
    /// Drain all pending emissions and return the newest, or `None` when
    /// nothing new arrived. The initial replayed value is consumed here but
    /// never returned.
    pub fn poll_latest(&mut self) -> Option<usize> {
        let mut latest = None;
        while let Ok(total) = self.rx.try_recv() {
            if !self.replay_skipped {
                self.replay_skipped = true;
                continue;
            }
            latest = Some(total);
        }
        latest
    }
}

/// Publisher half shared by both store backends. Disconnected subscribers
/// are pruned on the next publish.
#[derive(Default)]
pub(crate) struct CountPublisher {
    senders: Vec<Sender<usize>>,
}

impl CountPublisher {
    pub(crate) fn subscribe(&mut self, current_total: usize) -> CountFeed {
        let (tx, rx) = channel();
        // Replayed initial value; the feed's poll_latest skips it.
        let _ = tx.send(current_total);
        self.senders.push(tx);
        CountFeed {
            rx,
            replay_skipped: false,
        }
    }

    pub(crate) fn publish(&mut self, total: usize) {
        self.senders.retain(|tx| tx.send(total).is_ok());
    }
}
