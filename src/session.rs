use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Stable row identifier. Sqlite rowids are never reused while a live
/// selection still references them, so they are safe to hold client-side.
pub type SessionId = i64;

/// One logged practice session: what was practised, when, and at what tempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: SessionId,
    pub exercise: String,
    pub recorded_at: DateTime<Local>,
    pub tempo_bpm: u32,
}

/// A session as entered by the user, before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub exercise: String,
    pub recorded_at: DateTime<Local>,
    pub tempo_bpm: u32,
}

impl NewSession {
    pub fn new(exercise: impl Into<String>, recorded_at: DateTime<Local>, tempo_bpm: u32) -> Self {
        Self {
            exercise: exercise.into(),
            recorded_at,
            tempo_bpm,
        }
    }
}

/// An offset-addressed slice of the filtered collection.
///
/// `offset` is the position actually used, which may differ from the one
/// requested when the window resolver had to clamp (see `window`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub items: Vec<PracticeSession>,
    pub offset: usize,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
