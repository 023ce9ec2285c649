use std::any::type_name;
use std::fmt;

use crate::Invocable;

/// A callable that can report whether it is currently fit to be invoked.
///
/// Function values constructed via [`Function::new_validated()`][crate::Function::new_validated]
/// forward [`Function::validate()`][crate::Function::validate] and the checked
/// [`Function::try_invoke()`][crate::Function::try_invoke] path to this query. The query is
/// repeated on every call, never cached.
pub trait Validate {
    /// Returns `true` if the callable may be invoked right now.
    fn validate(&self) -> bool;
}

/// Pairs a callable with a predicate that decides whether the callable is valid.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use auto_delegate::{Function, Validated};
///
/// let enabled = Rc::new(Cell::new(true));
/// let gate = Rc::clone(&enabled);
///
/// let mut f = Function::<(i32,), i32>::new_validated(Validated::new(
///     |x: i32| x * 2,
///     move || gate.get(),
/// ));
///
/// assert_eq!(f.try_invoke((4,)), Some(8));
///
/// enabled.set(false);
/// assert_eq!(f.try_invoke((4,)), None);
/// ```
#[derive(Clone)]
pub struct Validated<F, P> {
    callable: F,
    predicate: P,
}

impl<F, P> Validated<F, P>
where
    P: Fn() -> bool,
{
    /// Creates a callable that is valid whenever `predicate` returns `true`.
    #[must_use]
    pub fn new(callable: F, predicate: P) -> Self {
        Self {
            callable,
            predicate,
        }
    }

    /// Returns the wrapped callable, discarding the predicate.
    #[must_use]
    pub fn into_inner(self) -> F {
        self.callable
    }
}

impl<F, P, A, R> Invocable<A, R> for Validated<F, P>
where
    F: Invocable<A, R>,
{
    #[inline]
    fn invoke(&mut self, args: A) -> R {
        self.callable.invoke(args)
    }
}

impl<F, P> Validate for Validated<F, P>
where
    P: Fn() -> bool,
{
    fn validate(&self) -> bool {
        (self.predicate)()
    }
}

impl<F, P> fmt::Debug for Validated<F, P> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>()).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn predicate_is_requeried() {
        let open = Cell::new(false);
        let validated = Validated::new(|| 1, || open.get());

        assert!(!validated.validate());
        open.set(true);
        assert!(validated.validate());
    }

    #[test]
    fn invocation_ignores_predicate() {
        let mut validated = Validated::new(|x: u8| x + 1, || false);

        assert_eq!(validated.invoke((1,)), 2);
        assert_eq!(validated.into_inner()(5), 6);
    }
}
