use super::Window;

/// Row notification produced by a resync, as a window index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Inserted(usize),
    Updated(usize),
    Removed(usize),
}

/// Outcome of a resync step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncProgress {
    /// More steps are needed
    Pending,
    /// Displayed window equals the target
    Complete,
}

/// Target of a pending transition plus the diff cursor.
#[derive(Debug, Clone)]
struct Resync {
    target: Window,
    /// Indexes below the cursor already show the target rows
    cursor: usize,
    /// Row count of a direct current window while it is being rewritten
    direct_len: usize,
}

/// Displayed window and, while resynchronizing, its target.
///
/// For a mapped current window the rewrite happens in place, so the mapping
/// always reflects what subscribers have been told.
#[derive(Debug, Clone)]
pub struct WindowState {
    current: Window,
    resync: Option<Resync>,
}

impl WindowState {
    pub fn new(window: Window) -> Self {
        Self {
            current: window,
            resync: None,
        }
    }

    /// Displayed window; only meaningful when no resync is pending.
    pub fn current(&self) -> &Window {
        &self.current
    }

    pub fn is_resyncing(&self) -> bool {
        self.resync.is_some()
    }

    /// Replaces the displayed window without notifications.
    pub fn replace(&mut self, window: Window) {
        self.current = window;
        self.resync = None;
    }

    /// Absolute row displayed at `index`.
    pub fn get(&self, index: usize, total: Option<usize>) -> Option<usize> {
        match &self.resync {
            None => self.current.get(index, total),
            Some(r) if index < r.cursor => r.target.get(index, total),
            Some(r) => match &self.current {
                Window::Mapped(rows) => rows.get(index).copied(),
                Window::Direct => (index < r.direct_len).then_some(index),
            },
        }
    }

    /// Number of displayed rows.
    pub fn len(&self, total: Option<usize>) -> Option<usize> {
        match (&self.resync, &self.current) {
            (_, Window::Mapped(rows)) => Some(rows.len()),
            (Some(r), Window::Direct) => Some(r.direct_len),
            (None, Window::Direct) => total,
        }
    }

    pub fn is_empty(&self, total: Option<usize>) -> bool {
        self.len(total) == Some(0)
    }

    /// Index displaying absolute row `abs`.
    pub fn position(&self, abs: usize, total: Option<usize>) -> Option<usize> {
        if self.resync.is_none() {
            return self.current.position(abs, total);
        }
        let len = self.len(total)?;
        (0..len).find(|&i| self.get(i, total) == Some(abs))
    }

    /// Starts moving towards `target`.
    ///
    /// A pending transition is abandoned: what is displayed at this moment
    /// becomes the starting point. Returns `false` when nothing would change.
    pub fn begin(&mut self, target: Window, total: Option<usize>) -> bool {
        if self.resync.is_some() {
            let len = self.len(total).unwrap_or(0);
            let shown: Vec<usize> = (0..len).filter_map(|i| self.get(i, total)).collect();
            self.current = Window::Mapped(shown);
            self.resync = None;
        }
        if self.current == target {
            return false;
        }
        let direct_len = match self.current {
            Window::Direct => total.unwrap_or(0),
            Window::Mapped(_) => 0,
        };
        self.resync = Some(Resync {
            target,
            cursor: 0,
            direct_len,
        });
        true
    }

    /// Advances the pending transition by at most `max_items` positions.
    ///
    /// Notifications are appended to `changes` in ascending index order.
    pub fn step(
        &mut self,
        max_items: usize,
        total: Option<usize>,
        changes: &mut Vec<RowChange>,
    ) -> ResyncProgress {
        let Some(mut resync) = self.resync.take() else {
            return ResyncProgress::Complete;
        };

        for _ in 0..max_items {
            let index = resync.cursor;
            let old = match &self.current {
                Window::Mapped(rows) => rows.get(index).copied(),
                Window::Direct => (index < resync.direct_len).then_some(index),
            };
            let new = resync.target.get(index, total);

            match (old, new) {
                (Some(old), Some(new)) => {
                    if let Window::Mapped(rows) = &mut self.current {
                        rows[index] = new;
                    }
                    if old != new {
                        changes.push(RowChange::Updated(index));
                    }
                    resync.cursor += 1;
                }
                (Some(_), None) => {
                    match &mut self.current {
                        Window::Mapped(rows) => {
                            rows.remove(index);
                        }
                        Window::Direct => resync.direct_len -= 1,
                    }
                    changes.push(RowChange::Removed(index));
                }
                (None, Some(new)) => {
                    match &mut self.current {
                        Window::Mapped(rows) => rows.insert(index, new),
                        Window::Direct => resync.direct_len += 1,
                    }
                    changes.push(RowChange::Inserted(index));
                    resync.cursor += 1;
                }
                (None, None) => {
                    tracing::debug!("resync complete at index {}", index);
                    self.current = resync.target;
                    return ResyncProgress::Complete;
                }
            }
        }

        self.resync = Some(resync);
        ResyncProgress::Pending
    }

    /// Runs the pending transition to completion.
    pub fn finish(&mut self, total: Option<usize>, changes: &mut Vec<RowChange>) {
        while self.step(usize::MAX, total, changes) == ResyncProgress::Pending {}
    }

    /// Appends an absolute row to a mapped window; returns its index.
    ///
    /// A pending target that is mapped gets the row too.
    pub fn push(&mut self, abs: usize) -> Option<usize> {
        self.settle();
        if let Some(Resync {
            target: Window::Mapped(rows),
            ..
        }) = &mut self.resync
        {
            rows.push(abs);
        }
        match &mut self.current {
            Window::Mapped(rows) => {
                rows.push(abs);
                Some(rows.len() - 1)
            }
            Window::Direct => None,
        }
    }

    /// Renumbers after a row was inserted at absolute position `abs`.
    pub fn shift_up_from(&mut self, abs: usize) {
        self.remap(|r| if r >= abs { Some(r + 1) } else { Some(r) });
    }

    /// Drops absolute row `abs` and renumbers the rows after it.
    ///
    /// Returns the index it occupied in a mapped window.
    pub fn remove_abs(&mut self, abs: usize) -> Option<usize> {
        self.settle();
        let index = match &self.current {
            Window::Mapped(rows) => rows.iter().position(|&r| r == abs),
            Window::Direct => None,
        };
        self.remap(|r| match r {
            r if r == abs => None,
            r if r > abs => Some(r - 1),
            r => Some(r),
        });
        index
    }

    /// Makes `current` equal to what is displayed and restarts a pending
    /// diff at index 0.
    ///
    /// A mapped window already holds the target rows below the cursor.
    fn settle(&mut self) {
        let Some(resync) = &self.resync else {
            return;
        };
        if self.current.is_direct() {
            let len = resync.direct_len;
            let shown: Vec<usize> = (0..len).filter_map(|i| self.get(i, None)).collect();
            self.current = Window::Mapped(shown);
        }
        if let Some(r) = &mut self.resync {
            r.cursor = 0;
            r.direct_len = 0;
        }
    }

    /// Applies `f` to every displayed and pending absolute row, dropping rows
    /// mapped to `None`.
    pub fn remap(&mut self, f: impl Fn(usize) -> Option<usize>) {
        self.settle();
        if let Window::Mapped(rows) = &mut self.current {
            *rows = rows.iter().filter_map(|&r| f(r)).collect();
        }
        if let Some(Resync {
            target: Window::Mapped(rows),
            ..
        }) = &mut self.resync
        {
            *rows = rows.iter().filter_map(|&r| f(r)).collect();
        }
    }
}
