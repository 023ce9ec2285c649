use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomPinned;
use std::pin::Pin;
use std::process;
use std::ptr::{self, NonNull};

use tracing::{error, trace};

use crate::{DenseSlots, Eviction, OwnerRef, SlotKey, debug_assert_inline};

/// Lifetime notification point embedded in a receiver that wants to be tracked eagerly.
///
/// A receiver type opts into eager tracking by holding a `Reflector` as a field and
/// implementing [`Reflect`]. Every time one of its methods is bound to a container via a
/// tracked binding, the reflector is "charged" with a back-reference to the container slot.
/// When the receiver is dropped, the reflector visits every such back-reference and evicts
/// the corresponding slot immediately, so no container can ever call into a dropped receiver.
///
/// Embedding a `Reflector` makes the receiver [`!Unpin`][Unpin]. Tracked bindings take the
/// receiver as [`Pin<&T>`][std::pin::Pin], which guarantees that the receiver stays at the
/// same address until its destructor has run and notified every container. That guarantee
/// only holds while the receiver stays `!Unpin`, so a receiver type must never implement
/// [`Unpin`] (see [`Reflect`]). To move the bindings of a receiver to another one, use
/// [`relocate()`][Self::relocate].
///
/// Declare the reflector as the first field of the receiver. Fields are dropped in
/// declaration order and the bindings are removed when the reflector is dropped, so fields
/// declared before it are already gone while the receiver can still be called.
///
/// Cloning a reflector produces a fresh reflector with no charges: a copy of a receiver is a
/// new object that nothing is bound to yet.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::pin::pin;
///
/// use auto_delegate::{AutoDelegateContainer, Reflect, Reflector};
///
/// #[derive(Default)]
/// struct Gauge {
///     reflector: Reflector,
///     reading: Cell<u32>,
/// }
///
/// // SAFETY: The reflector is the first field of Gauge and Gauge does not implement Unpin.
/// unsafe impl Reflect for Gauge {
///     fn reflector(&self) -> &Reflector {
///         &self.reflector
///     }
/// }
///
/// let on_sample = AutoDelegateContainer::<(u32,)>::new();
///
/// {
///     let gauge = pin!(Gauge::default());
///     on_sample.bind_tracked(gauge.as_ref(), |g: &Gauge, value: u32| g.reading.set(value));
///     assert_eq!(gauge.reflector.charge_count(), 1);
///
///     on_sample.invoke((7,));
///     assert_eq!(gauge.reading.get(), 7);
/// }
///
/// // The gauge is gone and so is its binding.
/// assert!(on_sample.is_empty());
/// ```
pub struct Reflector {
    charges: RefCell<DenseSlots<Charge>>,

    // Number of bound methods of the receiver that are executing right now.
    active_calls: Cell<u32>,

    _requires_pinning: PhantomPinned,
}

/// One back-reference from a receiver to a container slot that targets it.
struct Charge {
    owner: OwnerRef,
    slot: SlotKey,
}

impl Reflector {
    /// Creates a reflector that is not referenced by any container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            charges: RefCell::new(DenseSlots::new()),
            active_calls: Cell::new(0),
            _requires_pinning: PhantomPinned,
        }
    }

    /// Number of container slots that currently hold a tracked binding to the receiver.
    #[must_use]
    pub fn charge_count(&self) -> usize {
        self.charges.borrow().len()
    }

    /// Moves every tracked binding of `from` over to `to`.
    ///
    /// Afterwards every container that called methods of `from` calls them on `to` instead and
    /// dropping `from` no longer affects those bindings. This is how the bindings follow a
    /// receiver whose state has been moved into a new value: pinned receivers cannot move
    /// themselves. Existing bindings of `to` are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cell::Cell;
    ///
    /// use auto_delegate::{AutoDelegateContainer, Reflect, Reflector};
    ///
    /// struct Counter {
    ///     reflector: Reflector,
    ///     count: Cell<u32>,
    /// }
    ///
    /// // SAFETY: The reflector is the first field of Counter and Counter does not implement
    /// // Unpin.
    /// unsafe impl Reflect for Counter {
    ///     fn reflector(&self) -> &Reflector {
    ///         &self.reflector
    ///     }
    /// }
    ///
    /// let on_tick = AutoDelegateContainer::<()>::new();
    ///
    /// let old = Box::pin(Counter {
    ///     reflector: Reflector::new(),
    ///     count: Cell::new(0),
    /// });
    /// on_tick.bind_tracked(old.as_ref(), |c: &Counter| c.count.set(c.count.get() + 1));
    ///
    /// let new = Box::pin(Counter {
    ///     reflector: Reflector::new(),
    ///     count: Cell::new(old.count.get()),
    /// });
    /// Reflector::relocate(old.as_ref(), new.as_ref());
    /// drop(old);
    ///
    /// on_tick.invoke(());
    /// assert_eq!(new.count.get(), 1);
    /// ```
    pub fn relocate<T>(from: Pin<&T>, to: Pin<&T>)
    where
        T: Reflect + 'static,
    {
        let from = from.get_ref();
        let to = to.get_ref();

        if ptr::eq(from, to) {
            return;
        }

        let source = from.reflector();
        let destination = to.reflector();
        debug_assert_inline(to, destination);

        let target = NonNull::from(to).cast::<()>();
        let reflector = NonNull::from(destination);
        let charges = source.charges.borrow_mut().drain();
        let mut relocated = 0_usize;

        for Charge { owner, slot } in charges {
            let charge = destination.charges.borrow_mut().insert(Charge { owner, slot });

            // Retargeting only touches the slot arena of the container, never a reflector.
            let retargeted = destination
                .charges
                .borrow()
                .get(charge)
                .is_some_and(|c| c.owner.retarget(slot, target, reflector, charge));

            if retargeted {
                relocated = relocated.wrapping_add(1);
            } else {
                destination.discharge(charge);
            }
        }

        trace!(relocated, "tracked bindings relocated");
    }

    /// Registers the back-reference from a container slot, returning the key under which the
    /// slot can later discharge itself.
    pub(crate) fn charge(&self, owner: OwnerRef, slot: SlotKey) -> SlotKey {
        let charge = self.charges.borrow_mut().insert(Charge { owner, slot });

        trace!(?slot, ?charge, "receiver charged");

        charge
    }

    /// Forgets a back-reference because the slot is going away for some other reason than the
    /// receiver being dropped.
    pub(crate) fn discharge(&self, charge: SlotKey) {
        let removed = self.charges.borrow_mut().remove(charge);

        if let Some(Charge { slot, .. }) = &removed {
            trace!(?slot, ?charge, "receiver discharged");
        }

        // The OwnerRef is released only after the borrow has ended.
        drop(removed);
    }

    /// Marks a bound method of the receiver as executing until the returned guard is dropped.
    pub(crate) fn enter_call(&self) -> ActiveCall {
        let active_calls = self
            .active_calls
            .get()
            .checked_add(1)
            .expect("nesting of bound method calls cannot exceed u32::MAX");
        self.active_calls.set(active_calls);

        ActiveCall {
            reflector: NonNull::from(self),
        }
    }

    #[cfg(test)]
    pub(crate) fn active_calls(&self) -> u32 {
        self.active_calls.get()
    }
}

impl Default for Reflector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Reflector {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for Reflector {
    #[cfg_attr(test, mutants::skip)] // Mutating the in-flight check aborts the test process.
    fn drop(&mut self) {
        let active_calls = self.active_calls.get();

        if active_calls != 0 {
            // A bound method of this receiver is still running and holds a reference to the
            // receiver. There is no way to continue without handing it a dangling reference.
            error!(
                active_calls,
                "tracked receiver dropped while one of its bound methods is executing"
            );
            process::abort();
        }

        let charges = self.charges.get_mut().drain();

        for Charge { owner, slot } in charges {
            if owner.evict(slot, Eviction::ReceiverDropped) {
                trace!(?slot, "slot evicted because its receiver was dropped");
            }
        }
    }
}

impl fmt::Debug for Reflector {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("charges", &self.charges.try_borrow().map(|c| c.len()).ok())
            .field("active_calls", &self.active_calls.get())
            .finish()
    }
}

/// A receiver that contains a [`Reflector`] and can therefore be tracked eagerly.
///
/// # Safety
///
/// The returned reflector must be stored inline in `self` (a field, or a field of a field) so
/// that it is dropped exactly when the receiver is dropped. The method must return the same
/// reflector every time it is called on the same receiver.
///
/// The type must not implement [`Unpin`]. The embedded reflector makes it `!Unpin` on its
/// own; an explicit `impl Unpin` would let safe code move a bound receiver through
/// [`Pin::new()`][std::pin::Pin::new] and leave its bindings pointing at the old address.
///
/// No field declared before the reflector may invoke, from its destructor, a delegate that
/// has this receiver bound. Declaring the reflector as the first field satisfies this.
pub unsafe trait Reflect {
    /// Returns the reflector embedded in the receiver.
    fn reflector(&self) -> &Reflector;
}

/// Guard registered for the duration of one call into a tracked receiver.
pub(crate) struct ActiveCall {
    reflector: NonNull<Reflector>,
}

impl Drop for ActiveCall {
    #[cfg_attr(test, mutants::skip)] // Mutating the count aborts the test process.
    fn drop(&mut self) {
        // SAFETY: The reflector aborts the process if it is dropped while any call guard
        // exists, so it is still alive here.
        let reflector = unsafe { self.reflector.as_ref() };

        reflector
            .active_calls
            .set(reflector.active_calls.get().wrapping_sub(1));
    }
}

impl fmt::Debug for ActiveCall {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("reflector", &self.reflector)
            .finish()
    }
}
