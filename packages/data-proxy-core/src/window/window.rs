use serde::Serialize;

/// Displayed slice of absolute rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Window {
    /// Proxy row equals absolute row
    Direct,
    /// Proxy row `i` shows absolute row `mapping[i]`
    Mapped(Vec<usize>),
}

impl Window {
    pub fn is_direct(&self) -> bool {
        matches!(self, Window::Direct)
    }

    pub fn mapping(&self) -> Option<&[usize]> {
        match self {
            Window::Direct => None,
            Window::Mapped(rows) => Some(rows),
        }
    }

    /// Absolute row at `index`; `total` bounds a direct window when known.
    pub fn get(&self, index: usize, total: Option<usize>) -> Option<usize> {
        match self {
            Window::Direct => match total {
                Some(total) if index >= total => None,
                _ => Some(index),
            },
            Window::Mapped(rows) => rows.get(index).copied(),
        }
    }

    /// Number of rows shown, `None` for a direct window over an unknown count.
    pub fn len(&self, total: Option<usize>) -> Option<usize> {
        match self {
            Window::Direct => total,
            Window::Mapped(rows) => Some(rows.len()),
        }
    }

    pub fn is_empty(&self, total: Option<usize>) -> bool {
        self.len(total) == Some(0)
    }

    /// Index showing absolute row `abs`.
    pub fn position(&self, abs: usize, total: Option<usize>) -> Option<usize> {
        match self {
            Window::Direct => match total {
                Some(total) if abs >= total => None,
                _ => Some(abs),
            },
            Window::Mapped(rows) => rows.iter().position(|&r| r == abs),
        }
    }
}

/// Inputs of a window computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    /// Rows in the base table, `None` if unknown
    pub base_count: Option<usize>,
    /// Uncommitted new rows
    pub new_count: usize,
    /// Requested first base row of the page
    pub sample_start: usize,
    /// Rows per page (0 = unpaginated)
    pub sample_size: usize,
}

/// First and last base rows covered by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleBounds {
    pub first: usize,
    /// `None` when the page is empty
    pub last: Option<usize>,
}

/// Computes the window for the given paging parameters or filter result.
///
/// A filter result is used verbatim. Otherwise the page
/// `sample_start..=sample_end` is followed by every uncommitted new row; a
/// start past the end snaps to the beginning of the last page.
pub fn recompute(params: WindowParams, filtered_rows: Option<&[usize]>) -> (Window, SampleBounds) {
    if let Some(rows) = filtered_rows {
        let bounds = SampleBounds {
            first: 0,
            last: rows.len().checked_sub(1),
        };
        return (Window::Mapped(rows.to_vec()), bounds);
    }

    let Some(base_count) = params.base_count else {
        let last = match params.sample_size {
            0 => None,
            size => Some(params.sample_start.saturating_add(size - 1)),
        };
        let bounds = SampleBounds {
            first: params.sample_start,
            last,
        };
        return (Window::Direct, bounds);
    };

    if params.sample_size == 0 {
        let bounds = SampleBounds {
            first: 0,
            last: base_count.checked_sub(1),
        };
        return (Window::Direct, bounds);
    }

    let size = params.sample_size;
    let mut first = params.sample_start;
    if first >= base_count {
        first = match base_count {
            0 => 0,
            n => size * ((n - 1) / size),
        };
    }
    let end = first.saturating_add(size).min(base_count);
    let mut mapping: Vec<usize> = (first..end).collect();
    mapping.extend(base_count..base_count + params.new_count);

    let bounds = SampleBounds {
        first,
        last: end.checked_sub(1).filter(|&last| last >= first),
    };
    (Window::Mapped(mapping), bounds)
}
