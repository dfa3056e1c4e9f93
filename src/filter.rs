use crate::session::PracticeSession;
use chrono::{DateTime, Local};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

/// A conjunction of optional constraints narrowing which sessions a storage
/// operation considers. All constraints absent means "match everything".
///
/// The same filter value drives `count`, `list` and both delete operations,
/// through a single lowering (`where_sql`) and a single in-memory predicate
/// (`matches`), so the four operations cannot diverge on what a row matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionFilter {
    /// Case-sensitive substring of the exercise name.
    exercise_contains: Option<String>,
    /// Half-open range `[from, until)` on `recorded_at`.
    recorded_from: Option<DateTime<Local>>,
    recorded_until: Option<DateTime<Local>>,
    /// Closed range `[min, max]` on `tempo_bpm`.
    tempo_min: Option<u32>,
    tempo_max: Option<u32>,
}

impl SessionFilter {
    /// The filter that matches every session.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn exercise_contains(mut self, needle: impl Into<String>) -> Self {
        self.exercise_contains = Some(needle.into());
        self
    }

    pub fn recorded_from(mut self, from: DateTime<Local>) -> Self {
        self.recorded_from = Some(from);
        self
    }

    pub fn recorded_until(mut self, until: DateTime<Local>) -> Self {
        self.recorded_until = Some(until);
        self
    }

    pub fn tempo_min(mut self, min: u32) -> Self {
        self.tempo_min = Some(min);
        self
    }

    pub fn tempo_max(mut self, max: u32) -> Self {
        self.tempo_max = Some(max);
        self
    }

    /// True when no constraint is present.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Reference predicate. This is the semantic ground truth the sqlite
    /// lowering must agree with; the in-memory store executes it directly.
    pub fn matches(&self, session: &PracticeSession) -> bool {
        if let Some(needle) = &self.exercise_contains {
            if !session.exercise.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(from) = &self.recorded_from {
            if session.recorded_at < *from {
                return false;
            }
        }
        if let Some(until) = &self.recorded_until {
            if session.recorded_at >= *until {
                return false;
            }
        }
        if let Some(min) = self.tempo_min {
            if session.tempo_bpm < min {
                return false;
            }
        }
        if let Some(max) = self.tempo_max {
            if session.tempo_bpm > max {
                return false;
            }
        }
        true
    }

    /// Lower the filter to SQL fragments: one `column op ?` clause per
    /// present constraint, with parameters in clause order. Timestamps are
    /// compared as RFC 3339 text with a fixed UTC offset so lexicographic
    /// ordering agrees with chronological ordering (see `store::sqlite`).
    pub(crate) fn where_sql(&self) -> (Vec<String>, Vec<FilterParam>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        if let Some(needle) = &self.exercise_contains {
            clauses.push("instr(exercise, ?) > 0".to_string());
            params.push(FilterParam::Text(needle.clone()));
        }
        if let Some(from) = &self.recorded_from {
            clauses.push("recorded_at >= ?".to_string());
            params.push(FilterParam::Text(crate::store::encode_timestamp(from)));
        }
        if let Some(until) = &self.recorded_until {
            clauses.push("recorded_at < ?".to_string());
            params.push(FilterParam::Text(crate::store::encode_timestamp(until)));
        }
        if let Some(min) = self.tempo_min {
            clauses.push("tempo_bpm >= ?".to_string());
            params.push(FilterParam::Int(i64::from(min)));
        }
        if let Some(max) = self.tempo_max {
            clauses.push("tempo_bpm <= ?".to_string());
            params.push(FilterParam::Int(i64::from(max)));
        }
        (clauses, params)
    }
}

/// Owned sqlite parameter produced by the filter lowering.
#[derive(Debug, Clone)]
pub(crate) enum FilterParam {
    Text(String),
    Int(i64),
}

impl ToSql for FilterParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FilterParam::Text(s) => s.to_sql(),
            FilterParam::Int(i) => i.to_sql(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(exercise: &str, hour: u32, tempo: u32) -> PracticeSession {
        PracticeSession {
            id: 1,
            exercise: exercise.to_string(),
            recorded_at: Local.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap(),
            tempo_bpm: tempo,
        }
    }

    #[test]
    fn unconstrained_matches_everything() {
        let filter = SessionFilter::all();
        assert!(filter.is_unconstrained());
        assert!(filter.matches(&session("scales", 9, 80)));
        assert!(filter.matches(&session("", 0, 0)));
    }

    #[test]
    fn substring_constraint() {
        let filter = SessionFilter::all().exercise_contains("arpeg");
        assert!(filter.matches(&session("arpeggios in C", 9, 80)));
        assert!(!filter.matches(&session("scales", 9, 80)));
    }

    #[test]
    fn time_range_is_half_open() {
        let from = Local.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let until = Local.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let filter = SessionFilter::all().recorded_from(from).recorded_until(until);
        assert!(filter.matches(&session("scales", 9, 80))); // inclusive lower
        assert!(filter.matches(&session("scales", 11, 80)));
        assert!(!filter.matches(&session("scales", 12, 80))); // exclusive upper
        assert!(!filter.matches(&session("scales", 8, 80)));
    }

    #[test]
    fn tempo_range_is_closed() {
        let filter = SessionFilter::all().tempo_min(60).tempo_max(120);
        assert!(filter.matches(&session("scales", 9, 60)));
        assert!(filter.matches(&session("scales", 9, 120)));
        assert!(!filter.matches(&session("scales", 9, 59)));
        assert!(!filter.matches(&session("scales", 9, 121)));
    }

    #[test]
    fn conjunction_requires_all_constraints() {
        let filter = SessionFilter::all()
            .exercise_contains("scales")
            .tempo_min(100);
        assert!(filter.matches(&session("scales", 9, 110)));
        assert!(!filter.matches(&session("scales", 9, 90)));
        assert!(!filter.matches(&session("arpeggios", 9, 110)));
    }

    #[test]
    fn equality_compares_all_constraints() {
        let a = SessionFilter::all().exercise_contains("x").tempo_min(10);
        let b = SessionFilter::all().exercise_contains("x").tempo_min(10);
        let c = SessionFilter::all().exercise_contains("x").tempo_min(11);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn where_sql_emits_one_clause_per_constraint() {
        let (clauses, params) = SessionFilter::all().where_sql();
        assert!(clauses.is_empty());
        assert!(params.is_empty());

        let filter = SessionFilter::all()
            .exercise_contains("scales")
            .tempo_min(60)
            .tempo_max(120);
        let (clauses, params) = filter.where_sql();
        assert_eq!(clauses.len(), 3);
        assert_eq!(params.len(), 3);
    }
}
