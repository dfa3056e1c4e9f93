/// The effective slice to fetch from the store after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub size: usize,
}

impl PageWindow {
    pub const EMPTY: PageWindow = PageWindow { offset: 0, size: 0 };

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Clamp a requested window against the current filtered total.
///
/// Requested offsets routinely go stale: the caller computes an offset
/// against one total, then the collection shrinks or grows before the query
/// runs. Clamping keeps the page as full as possible instead of silently
/// returning nothing when the tail of the collection moved.
///
/// Negative or zero sizes and negative offsets are reachable from ordinary
/// boundary arithmetic (a total dropping to zero mid-session) and resolve to
/// the empty window rather than an error.
pub fn resolve_window(requested_size: i64, requested_offset: i64, filtered_total: usize) -> PageWindow {
    if filtered_total == 0 || requested_size <= 0 {
        return PageWindow::EMPTY;
    }
    let size = (requested_size as usize).min(filtered_total);
    let max_offset = filtered_total - size;
    let offset = requested_offset.clamp(0, max_offset as i64) as usize;
    PageWindow { offset, size }
}
