use std::cell::RefCell;
use std::rc::Rc;

/// Records the order in which bound callables were called.
///
/// Clones share the same log, so a clone can be captured by every callable under test while
/// the test inspects the original.
///
/// # Example
///
/// ```rust
/// use testing::CallLog;
///
/// let log = CallLog::new();
/// let first = log.clone();
/// let second = log.clone();
///
/// first.record("first");
/// second.record("second");
///
/// assert_eq!(log.entries(), vec!["first", "second"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry to the log.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Returns a copy of all entries recorded so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Returns all entries recorded so far in sorted order.
    ///
    /// Useful when the order of calls is unspecified.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<String> {
        let mut entries = self.entries();
        entries.sort_unstable();
        entries
    }

    /// Number of entries recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
