use std::any::type_name;
use std::fmt;
use std::pin::Pin;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use crate::{DelegateList, Invocable, Method, Receiver, Reflect, free_invoker};

/// A delegate with at most one bound target.
///
/// Binding a new target replaces the previous one. The target is a free callable or a method
/// bound to a receiver, with the same receiver kinds as
/// [`MulticastDelegate`][crate::MulticastDelegate]. A tracked receiver unbinds itself when it
/// is dropped; a weak receiver makes the delegate behave as unbound once it has expired.
///
/// # Examples
///
/// ```
/// use auto_delegate::Delegate;
///
/// let compare = Delegate::<(i32, i32), bool>::new();
/// assert!(!compare.is_bound());
///
/// compare.bind(|a: i32, b: i32| a < b);
/// assert!(compare.invoke((1, 2)));
///
/// compare.bind(|a: i32, b: i32| a > b);
/// assert_eq!(compare.try_invoke((1, 2)), Some(false));
///
/// compare.reset();
/// assert_eq!(compare.try_invoke((1, 2)), None);
/// ```
pub struct Delegate<A, R = ()> {
    list: Rc<DelegateList<A, R>>,
}

impl<A, R> Delegate<A, R> {
    /// Creates an unbound delegate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: Rc::new(DelegateList::new(None, 1)),
        }
    }

    /// Binds a closure or function, replacing any previous target.
    pub fn bind<F>(&self, callable: F)
    where
        F: Invocable<A, R> + 'static,
    {
        self.list.clear();
        self.list.insert(Receiver::Free, free_invoker(callable));
    }

    /// Binds a method of a pinned receiver, replacing any previous target.
    ///
    /// The delegate becomes unbound when the receiver is dropped.
    pub fn bind_tracked<T, M>(&self, receiver: Pin<&T>, method: M)
    where
        T: Reflect + 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.clear();
        self.list.insert_tracked(receiver, method);
    }

    /// Binds a method of a weakly referenced receiver, replacing any previous target.
    pub fn bind_weak<T, M>(&self, receiver: &Weak<T>, method: M)
    where
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.clear();
        self.list.insert_weak(receiver, method);
    }

    /// Binds a method of a receiver that the delegate keeps alive, replacing any previous
    /// target.
    pub fn bind_shared<T, M>(&self, receiver: &Rc<T>, method: M)
    where
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.clear();
        self.list.insert_shared(receiver, method);
    }

    /// Binds a method of a receiver whose lifetime the caller manages, replacing any previous
    /// target.
    ///
    /// # Safety
    ///
    /// The receiver must stay alive and must not be mutably borrowed for as long as it is
    /// bound.
    pub unsafe fn bind_raw<T, M>(&self, receiver: NonNull<T>, method: M)
    where
        M: Method<T, A, R> + 'static,
    {
        self.list.clear();

        // SAFETY: Forwarding the guarantee from our caller.
        unsafe {
            self.list.insert_raw(receiver, method);
        }
    }

    /// Unbinds the current target, if any.
    pub fn reset(&self) {
        self.list.clear();
    }

    /// Whether a target is bound and its receiver (if any) is still alive.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.list
            .first_key()
            .is_some_and(|key| self.list.is_live(key))
    }

    /// Calls the bound target.
    ///
    /// # Panics
    ///
    /// Panics if no target is bound, if the receiver of the target has expired or if the
    /// target is already executing further up the call stack.
    pub fn invoke(&self, args: A) -> R {
        self.try_invoke(args).expect(
            "invoked a Delegate without a callable target - check is_bound() or use try_invoke()",
        )
    }

    /// Calls the bound target, returning `None` if there is nothing that can be called.
    pub fn try_invoke(&self, args: A) -> Option<R> {
        self.list.call_first(args)
    }
}

impl<A, R> Default for Delegate<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> fmt::Debug for Delegate<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("list", &self.list)
            .finish()
    }
}
