use std::cell::Cell;
use std::rc::Rc;

/// Counts how many [`DropToken`]s created from it have been dropped.
///
/// Capture a token in a callable to observe when the callable (or a copy of it) is dropped.
///
/// # Example
///
/// ```rust
/// use testing::DropCounter;
///
/// let counter = DropCounter::new();
/// let held = vec![counter.token(), counter.token()];
/// assert_eq!(counter.dropped(), 0);
///
/// drop(held);
/// assert_eq!(counter.dropped(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    dropped: Rc<Cell<usize>>,
}

impl DropCounter {
    /// Creates a counter that has not seen any drops.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that increments the counter when dropped.
    ///
    /// Clones of the token are independent tokens: each one counts once when it is dropped.
    #[must_use]
    pub fn token(&self) -> DropToken {
        DropToken {
            dropped: Rc::clone(&self.dropped),
        }
    }

    /// Number of tokens dropped so far.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.get()
    }
}

/// Increments its [`DropCounter`] when dropped.
#[derive(Clone, Debug)]
pub struct DropToken {
    dropped: Rc<Cell<usize>>,
}

impl Drop for DropToken {
    fn drop(&mut self) {
        self.dropped.set(self.dropped.get().wrapping_add(1));
    }
}
