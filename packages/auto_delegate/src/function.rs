use std::any::{TypeId, type_name};
use std::fmt;
use std::mem;

use crate::{Invocable, RawFunction, Validate};

/// A type-erased callable with the signature `A -> R`, where `A` is the argument tuple.
///
/// Small callables (up to [`INLINE_CAPACITY`][crate::INLINE_CAPACITY] bytes, pointer-aligned)
/// are stored inside the `Function` itself. Larger ones are moved to the heap. Which of the two
/// is used is decided by the type of the callable and never changes afterwards.
///
/// A `Function` is move-only and accepts any callable. Use [`CloneableFunction`] if copies are
/// needed; it only accepts callables that are [`Clone`].
///
/// # Examples
///
/// ```
/// use auto_delegate::Function;
///
/// let base = 10;
/// let mut f = Function::<(i32, i32), i32>::new(move |a: i32, b: i32| base + a * b);
///
/// assert!(f.is_some());
/// assert_eq!(f.invoke((3, 4)), 22);
///
/// f.reset();
/// assert!(f.is_empty());
/// assert_eq!(f.try_invoke((3, 4)), None);
/// ```
///
/// # Thread safety
///
/// The type is single-threaded: it is neither [`Send`] nor [`Sync`] because the stored
/// callable is not required to be either.
pub struct Function<A, R> {
    raw: RawFunction<A, R>,
}

impl<A, R> Function<A, R> {
    /// Creates a function that holds no callable.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: RawFunction::empty(),
        }
    }

    /// Creates a function that stores `callable`.
    #[must_use]
    pub fn new<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + 'static,
    {
        Self {
            raw: RawFunction::plain(callable),
        }
    }

    /// Creates a function that stores `callable` and forwards [`validate()`][Self::validate]
    /// to its [`Validate`] implementation.
    #[must_use]
    pub fn new_validated<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Validate + 'static,
    {
        Self {
            raw: RawFunction::validated(callable),
        }
    }

    /// Replaces the stored callable, dropping the previous one before storing the new one.
    pub fn assign<F>(&mut self, callable: F)
    where
        F: Invocable<A, R> + 'static,
    {
        self.raw.reset();
        self.raw = RawFunction::plain(callable);
    }

    /// Calls the stored callable.
    ///
    /// # Panics
    ///
    /// Panics if the function is empty. Use [`try_invoke()`][Self::try_invoke] if emptiness is
    /// an expected condition.
    pub fn invoke(&mut self, args: A) -> R {
        self.raw
            .call(args)
            .expect("invoked an empty Function - check is_some() or use try_invoke()")
    }

    /// Calls the stored callable if there is one and it reports itself as valid.
    pub fn try_invoke(&mut self, args: A) -> Option<R> {
        if !self.raw.validate() {
            return None;
        }

        self.raw.call(args)
    }

    /// Whether the function can be invoked right now.
    ///
    /// An empty function is never valid. A function created via
    /// [`new_validated()`][Self::new_validated] asks the stored callable each time. Any other
    /// function is valid as long as it is not empty.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.raw.validate()
    }

    /// Whether no callable is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether a callable is stored.
    #[must_use]
    pub fn is_some(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Whether the stored callable lives inside the function value instead of on the heap.
    ///
    /// Returns `false` for an empty function.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.raw.is_inline()
    }

    /// The [`TypeId`] of the stored callable, if any.
    #[must_use]
    pub fn target_type(&self) -> Option<TypeId> {
        self.raw.target_type()
    }

    /// The name of the type of the stored callable, if any. Intended for diagnostics only.
    #[must_use]
    pub fn target_type_name(&self) -> Option<&'static str> {
        self.raw.target_type_name()
    }

    /// Exchanges the stored callables of two functions.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Drops the stored callable, leaving the function empty.
    pub fn reset(&mut self) {
        self.raw.reset();
    }

    /// Moves the stored callable into a new function, leaving this one empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            raw: self.raw.take(),
        }
    }
}

impl<A, R> Default for Function<A, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A, R> fmt::Debug for Function<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("raw", &self.raw)
            .finish()
    }
}

/// A type-erased callable that can be cloned.
///
/// Identical to [`Function`] except that it only accepts callables that implement [`Clone`]
/// and therefore implements [`Clone`] itself. Cloning deep-copies the stored callable, so the
/// copy keeps its own captured state. A `CloneableFunction` converts into a [`Function`] for
/// free.
///
/// # Examples
///
/// ```
/// use auto_delegate::CloneableFunction;
///
/// let mut counter = 0;
/// let mut f = CloneableFunction::<(), i32>::new(move || {
///     counter += 1;
///     counter
/// });
///
/// assert_eq!(f.invoke(()), 1);
///
/// let mut copy = f.clone();
/// assert_eq!(f.invoke(()), 2);
/// assert_eq!(copy.invoke(()), 2);
/// assert_eq!(copy.invoke(()), 3);
/// ```
pub struct CloneableFunction<A, R> {
    raw: RawFunction<A, R>,
}

impl<A, R> CloneableFunction<A, R> {
    /// Creates a function that holds no callable.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: RawFunction::empty(),
        }
    }

    /// Creates a function that stores `callable`.
    #[must_use]
    pub fn new<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Clone + 'static,
    {
        Self {
            raw: RawFunction::cloneable(callable),
        }
    }

    /// Creates a function that stores `callable` and forwards [`validate()`][Self::validate]
    /// to its [`Validate`] implementation.
    #[must_use]
    pub fn new_validated<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Validate + Clone + 'static,
    {
        Self {
            raw: RawFunction::cloneable_validated(callable),
        }
    }

    /// Replaces the stored callable, dropping the previous one before storing the new one.
    pub fn assign<F>(&mut self, callable: F)
    where
        F: Invocable<A, R> + Clone + 'static,
    {
        self.raw.reset();
        self.raw = RawFunction::cloneable(callable);
    }

    /// Calls the stored callable.
    ///
    /// # Panics
    ///
    /// Panics if the function is empty. Use [`try_invoke()`][Self::try_invoke] if emptiness is
    /// an expected condition.
    pub fn invoke(&mut self, args: A) -> R {
        self.raw
            .call(args)
            .expect("invoked an empty CloneableFunction - check is_some() or use try_invoke()")
    }

    /// Calls the stored callable if there is one and it reports itself as valid.
    pub fn try_invoke(&mut self, args: A) -> Option<R> {
        if !self.raw.validate() {
            return None;
        }

        self.raw.call(args)
    }

    /// Whether the function can be invoked right now. See [`Function::validate()`].
    #[must_use]
    pub fn validate(&self) -> bool {
        self.raw.validate()
    }

    /// Whether no callable is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether a callable is stored.
    #[must_use]
    pub fn is_some(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Whether the stored callable lives inside the function value instead of on the heap.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.raw.is_inline()
    }

    /// The [`TypeId`] of the stored callable, if any.
    #[must_use]
    pub fn target_type(&self) -> Option<TypeId> {
        self.raw.target_type()
    }

    /// The name of the type of the stored callable, if any. Intended for diagnostics only.
    #[must_use]
    pub fn target_type_name(&self) -> Option<&'static str> {
        self.raw.target_type_name()
    }

    /// Exchanges the stored callables of two functions.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Drops the stored callable, leaving the function empty.
    pub fn reset(&mut self) {
        self.raw.reset();
    }

    /// Moves the stored callable into a new function, leaving this one empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            raw: self.raw.take(),
        }
    }

    /// Converts into a move-only [`Function`] with the same callable.
    #[must_use]
    pub fn into_function(self) -> Function<A, R> {
        Function { raw: self.raw }
    }
}

impl<A, R> Clone for CloneableFunction<A, R> {
    fn clone(&self) -> Self {
        Self {
            raw: self
                .raw
                .try_clone()
                .expect("a CloneableFunction only ever stores cloneable callables"),
        }
    }
}

impl<A, R> Default for CloneableFunction<A, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A, R> From<CloneableFunction<A, R>> for Function<A, R> {
    fn from(value: CloneableFunction<A, R>) -> Self {
        value.into_function()
    }
}

impl<A, R> fmt::Debug for CloneableFunction<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("raw", &self.raw)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};
    use testing::DropCounter;

    use super::*;
    use crate::Validated;

    assert_not_impl_any!(Function<(u32,), u32>: Send, Sync, Clone);
    assert_impl_all!(CloneableFunction<(u32,), u32>: Clone, Default);
    assert_not_impl_any!(CloneableFunction<(u32,), u32>: Send, Sync);

    fn sum_of(values: &[u64]) -> u64 {
        values.iter().sum()
    }

    #[test]
    fn default_is_empty() {
        let f = Function::<(), ()>::default();

        assert!(f.is_empty());
        assert!(!f.is_some());
        assert!(!f.validate());
        assert_eq!(f.target_type(), None);
    }

    #[test]
    #[should_panic(expected = "invoked an empty Function")]
    fn invoke_empty_panics() {
        let mut f = Function::<(i32,), i32>::empty();
        f.invoke((1,));
    }

    #[test]
    fn try_invoke_empty_is_none() {
        let mut f = CloneableFunction::<(i32,), i32>::empty();

        assert_eq!(f.try_invoke((1,)), None);
    }

    #[test]
    fn inline_and_heap_match_direct_call() {
        let small = |a: u64, b: u64| a * 3 + b;
        let big_data = [7_u64; 12];
        let big = move |a: u64, b: u64| a * 3 + b + sum_of(&big_data);

        let mut boxed_small = Function::<(u64, u64), u64>::new(small);
        let mut boxed_big = Function::<(u64, u64), u64>::new(big);

        assert!(boxed_small.is_inline());
        assert!(!boxed_big.is_inline());

        for (a, b) in [(0, 0), (1, 2), (100, 7)] {
            assert_eq!(boxed_small.invoke((a, b)), small(a, b));
            assert_eq!(boxed_big.invoke((a, b)), big(a, b));
        }
    }

    #[test]
    fn moved_function_keeps_behavior() {
        let mut original = Function::<(i32,), i32>::new(|x: i32| x - 1);
        let mut moved = original.take();

        assert!(original.is_empty());
        assert_eq!(moved.invoke((10,)), 9);
    }

    // The copy keeps the captured state it had at the time of copying, even after the
    // original is reassigned to a different closure.
    #[test]
    fn clone_is_deep_copy_of_captured_state() {
        let first: [u64; 6] = [1, 2, 3, 4, 5, 6];
        let second: [u64; 7] = [1, 2, 3, 4, 5, 6, 7];
        let first_sum = sum_of(&first);
        let second_sum = sum_of(&second);

        let mut f4 =
            CloneableFunction::<(u64,), u64>::new(move |x: u64| x + sum_of(&first));
        let mut f5 = f4.clone();

        f4.assign(move |x: u64| x + sum_of(&second));

        assert_eq!(f5.invoke((123,)), first_sum + 123);
        assert_eq!(f4.invoke((123,)), second_sum + 123);
        assert_eq!(f4.target_type(), f4.clone().target_type());
        assert_ne!(f4.target_type(), f5.target_type());
    }

    #[test]
    fn clone_of_mutable_state_is_independent() {
        let mut total = 0;
        let mut original = CloneableFunction::<(i32,), i32>::new(move |x: i32| {
            total += x;
            total
        });

        assert_eq!(original.invoke((5,)), 5);
        let mut copy = original.clone();
        assert_eq!(original.invoke((5,)), 10);
        assert_eq!(copy.invoke((1,)), 6);
    }

    #[test]
    fn swap_exchanges_targets() {
        let mut a = Function::<(), &'static str>::new(|| "a");
        let padding = [0_u8; 64];
        let mut b = Function::<(), &'static str>::new(move || {
            let _keep = &padding;
            "b"
        });

        a.swap(&mut b);
        assert_eq!(a.invoke(()), "b");
        assert_eq!(b.invoke(()), "a");
        assert!(!a.is_inline());
        assert!(b.is_inline());

        let mut empty = Function::empty();
        a.swap(&mut empty);
        assert!(a.is_empty());
        assert_eq!(empty.invoke(()), "b");
    }

    #[test]
    fn target_type_reports_function_pointer() {
        let pointer: fn(&[u64]) -> u64 = sum_of;
        let f = Function::<(&[u64],), u64>::new(pointer);

        assert_eq!(f.target_type(), Some(TypeId::of::<fn(&[u64]) -> u64>()));
    }

    #[test]
    fn validate_follows_predicate() {
        let allowed = Rc::new(Cell::new(true));
        let gate = Rc::clone(&allowed);
        let mut f = Function::<(u8,), u8>::new_validated(Validated::new(
            |x: u8| x + 1,
            move || gate.get(),
        ));

        assert!(f.validate());
        assert_eq!(f.try_invoke((1,)), Some(2));

        allowed.set(false);
        assert!(!f.validate());
        assert_eq!(f.try_invoke((1,)), None);

        // The unchecked path does not consult the predicate.
        assert_eq!(f.invoke((1,)), 2);
    }

    #[test]
    fn cloneable_validated_keeps_predicate() {
        let f = CloneableFunction::<(), ()>::new_validated(Validated::new(|| (), || false));
        let copy = f.clone();

        assert!(!f.validate());
        assert!(!copy.validate());
    }

    #[test]
    fn assign_drops_previous_before_storing() {
        let counter = DropCounter::new();
        let token = counter.token();
        let mut f = Function::<(), ()>::new(move || {
            let _keep = &token;
        });

        let observed = counter.clone();
        f.assign(move || assert_eq!(observed.dropped(), 1));
        assert_eq!(counter.dropped(), 1);
        f.invoke(());
    }

    #[test]
    fn dropping_clone_and_original_drops_each_once() {
        let counter = DropCounter::new();
        let token = counter.token();
        let f = CloneableFunction::<(), ()>::new(move || {
            let _keep = &token;
        });
        let copy = f.clone();

        drop(f);
        assert_eq!(counter.dropped(), 1);
        drop(copy);
        assert_eq!(counter.dropped(), 2);
    }

    #[test]
    fn converts_into_move_only_function() {
        let cloneable = CloneableFunction::<(i32,), i32>::new(|x: i32| -x);
        let mut plain: Function<(i32,), i32> = cloneable.into();

        assert_eq!(plain.invoke((3,)), -3);
    }
}
