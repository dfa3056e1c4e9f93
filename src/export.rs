use crate::filter::SessionFilter;
use crate::store::{SessionStore, StoreResult};
use std::io::Write;

/// How many rows each export read pulls from the store.
const EXPORT_CHUNK: usize = 500;

/// Write the filtered collection as CSV, newest session first.
///
/// Pages through the store in chunks rather than materializing everything;
/// a collection that shrinks mid-export simply ends the loop early. Returns
/// the number of rows written.
pub fn export_csv<S: SessionStore + ?Sized, W: Write>(
    store: &S,
    filter: &SessionFilter,
    out: W,
) -> StoreResult<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["exercise", "recorded_at", "tempo_bpm"])?;

    let mut written = 0usize;
    loop {
        let chunk = store.list(EXPORT_CHUNK, written, filter)?;
        if chunk.is_empty() {
            break;
        }
        for session in &chunk {
            let recorded_at = session.recorded_at.to_rfc3339();
            let tempo = session.tempo_bpm.to_string();
            writer.write_record([session.exercise.as_str(), recorded_at.as_str(), tempo.as_str()])?;
        }
        written += chunk.len();
        if chunk.len() < EXPORT_CHUNK {
            break;
        }
    }
    writer.flush()?;
    Ok(written)
}
