use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{MulticastDelegate, ReceiverPolicy};

/// Builder for creating an instance of [`MulticastDelegate`] or one of its aliases.
///
/// All settings are optional. A delegate built without changing any setting is identical to
/// one created via [`MulticastDelegate::new()`].
///
/// # Examples
///
/// ```
/// use auto_delegate::WeakDelegateContainer;
///
/// let on_resize = WeakDelegateContainer::<(u32, u32)>::builder()
///     .label("resize")
///     .capacity(16)
///     .build();
///
/// assert!(on_resize.is_empty());
/// ```
#[must_use]
pub struct MulticastDelegateBuilder<A, R, P> {
    label: Option<String>,
    capacity: usize,

    _types: PhantomData<(fn(A) -> R, P)>,
}

impl<A, R, P> MulticastDelegateBuilder<A, R, P>
where
    P: ReceiverPolicy,
{
    pub(crate) fn new() -> Self {
        Self {
            label: None,
            capacity: 0,
            _types: PhantomData,
        }
    }

    /// Sets a label that is attached to every tracing event emitted by the delegate.
    ///
    /// Useful to tell apart events of different delegates when diagnosing binding lifetimes.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Reserves storage for at least `capacity` bound slots up front.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the delegate with the specified configuration.
    #[must_use]
    pub fn build(self) -> MulticastDelegate<A, R, P> {
        MulticastDelegate::new_inner(self.label, self.capacity)
    }
}

impl<A, R, P> fmt::Debug for MulticastDelegateBuilder<A, R, P> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
