//! Detected event windows and the fixed-capacity list that holds them.

/// Index range `[left, right)` around a detected MUAP.
///
/// Always satisfies `right > left`; bounds checks against the sample buffer are
/// the detector's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventWindow {
    left: usize,
    right: usize,
}

impl EventWindow {
    /// Creates a window, or `None` if `right <= left`.
    ///
    /// # Example
    /// ```
    /// # use muapscan::EventWindow;
    /// let w = EventWindow::new(400, 1600).unwrap();
    /// assert_eq!(w.len(), 1200);
    /// assert!(EventWindow::new(10, 10).is_none());
    /// ```
    pub const fn new(left: usize, right: usize) -> Option<Self> {
        if right > left {
            Some(Self { left, right })
        } else {
            None
        }
    }

    #[inline]
    pub const fn left(&self) -> usize {
        self.left
    }

    #[inline]
    pub const fn right(&self) -> usize {
        self.right
    }

    /// Number of samples spanned.
    #[inline]
    pub const fn len(&self) -> usize {
        self.right - self.left
    }

    /// Returns true if the two windows share at least one sample.
    pub const fn overlaps(&self, other: &EventWindow) -> bool {
        self.left < other.right && other.left < self.right
    }
}

/// Outcome of [`EventList::push`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Window stored
    Appended,
    /// List full; window discarded and counted
    Dropped,
    /// Window starts before the previous one ends; discarded, not counted
    Rejected,
}

/// Ordered, non-overlapping event windows with a fixed capacity.
///
/// Storage lives inline, so a detection pass never allocates. Pushing past
/// capacity drops the window and bumps [`dropped`](EventList::dropped) instead
/// of overflowing.
///
/// # Example
/// ```
/// # use muapscan::{Append, EventList, EventWindow};
/// let mut events: EventList<2> = EventList::new();
/// let w = |l, r| EventWindow::new(l, r).unwrap();
///
/// assert_eq!(events.push(w(0, 10)), Append::Appended);
/// assert_eq!(events.push(w(5, 15)), Append::Rejected); // overlaps
/// assert_eq!(events.push(w(10, 20)), Append::Appended);
/// assert_eq!(events.push(w(30, 40)), Append::Dropped); // full
///
/// assert_eq!(events.len(), 2);
/// assert!(events.is_truncated());
/// ```
#[derive(Debug, Clone)]
pub struct EventList<const N: usize = { crate::config::DEFAULT_EVENT_CAPACITY }> {
    windows: [EventWindow; N],
    len: usize,
    dropped: usize,
}

impl<const N: usize> EventList<N> {
    const EMPTY: EventWindow = EventWindow { left: 0, right: 1 };

    pub const fn new() -> Self {
        Self {
            windows: [Self::EMPTY; N],
            len: 0,
            dropped: 0,
        }
    }

    /// Appends `window` if it keeps the list ordered and there is room.
    ///
    /// Ordering is checked first, so a full list still reports
    /// [`Append::Rejected`] for an overlapping window.
    pub fn push(&mut self, window: EventWindow) -> Append {
        if let Some(last) = self.last() {
            if window.left < last.right {
                return Append::Rejected;
            }
        }

        if self.len == N {
            self.dropped += 1;
            return Append::Dropped;
        }

        self.windows[self.len] = window;
        self.len += 1;
        Append::Appended
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Candidates discarded because the list was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns true if any candidate was dropped for lack of room.
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    pub fn as_slice(&self) -> &[EventWindow] {
        &self.windows[..self.len]
    }

    pub fn get(&self, index: usize) -> Option<&EventWindow> {
        self.as_slice().get(index)
    }

    pub fn last(&self) -> Option<&EventWindow> {
        self.as_slice().last()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, EventWindow> {
        self.as_slice().iter()
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.dropped = 0;
    }
}

impl<const N: usize> Default for EventList<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> IntoIterator for &'a EventList<N> {
    type Item = &'a EventWindow;
    type IntoIter = core::slice::Iter<'a, EventWindow>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
