use std::any::type_name;
use std::fmt;
use std::pin::Pin;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};

use crate::{
    AcceptsStrong, AcceptsTracked, AcceptsWeak, DelegateHandle, Method, MulticastDelegate, Reflect,
};

/// Starts an explicit binding of a receiver method, to be completed with
/// [`method()`][Self::method] and handed to [`MulticastDelegate::attach()`].
///
/// This is an alternative spelling of the `bind_*` methods of the delegate that lets the
/// receiver, the method and the handle choice be assembled separately. Whether a delegate
/// accepts a binding is checked at compile time from its receiver policy.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use auto_delegate::{Binder, WeakDelegateContainer};
///
/// struct Meter {
///     total: Cell<u64>,
/// }
///
/// let on_bytes = WeakDelegateContainer::<(u64,)>::new();
/// let meter = Rc::new(Meter { total: Cell::new(0) });
///
/// let handle = on_bytes.attach(
///     Binder::weak(&Rc::downgrade(&meter))
///         .method(|m: &Meter, bytes: u64| m.total.set(m.total.get() + bytes))
///         .handled(),
/// );
///
/// on_bytes.invoke((512,));
/// assert_eq!(meter.total.get(), 512);
///
/// drop(handle);
/// assert!(on_bytes.is_empty());
/// ```
pub struct Binder<K> {
    receiver: K,
}

/// A pinned receiver that tracks its own bindings via a [`Reflector`][crate::Reflector].
pub struct Tracked<'r, T> {
    receiver: Pin<&'r T>,
}

/// A receiver referenced through a [`Weak`], polled for liveness.
pub struct WeakReceiver<T> {
    receiver: Weak<T>,
}

/// A receiver kept alive by the binding through an [`Rc`].
pub struct SharedReceiver<T> {
    receiver: Rc<T>,
}

/// A receiver whose lifetime is managed by the caller.
pub struct RawReceiver<T> {
    receiver: NonNull<T>,
}

impl<'r, T> Binder<Tracked<'r, T>>
where
    T: Reflect + 'static,
{
    /// Starts a binding with a pinned receiver that removes the binding when it is dropped.
    #[must_use]
    pub fn tracked(receiver: Pin<&'r T>) -> Self {
        Self {
            receiver: Tracked { receiver },
        }
    }
}

impl<T> Binder<WeakReceiver<T>>
where
    T: 'static,
{
    /// Starts a binding with a receiver that is skipped and swept once it has expired.
    #[must_use]
    pub fn weak(receiver: &Weak<T>) -> Self {
        Self {
            receiver: WeakReceiver {
                receiver: Weak::clone(receiver),
            },
        }
    }
}

impl<T> Binder<SharedReceiver<T>>
where
    T: 'static,
{
    /// Starts a binding with a receiver that the binding keeps alive.
    #[must_use]
    pub fn shared(receiver: &Rc<T>) -> Self {
        Self {
            receiver: SharedReceiver {
                receiver: Rc::clone(receiver),
            },
        }
    }
}

impl<T> Binder<RawReceiver<T>> {
    /// Starts a binding with a receiver whose lifetime the caller guarantees.
    ///
    /// # Safety
    ///
    /// The receiver must stay alive and must not be mutably borrowed for as long as the
    /// binding exists in any delegate it is attached to.
    #[must_use]
    pub unsafe fn raw(receiver: NonNull<T>) -> Self {
        Self {
            receiver: RawReceiver { receiver },
        }
    }
}

impl<K> Binder<K> {
    /// Supplies the method to call on the receiver.
    ///
    /// Any callable that takes `&T` followed by the delegate arguments works: a method path
    /// such as `Widget::on_click` or a closure taking the receiver first.
    #[must_use]
    pub fn method<M>(self, method: M) -> Binding<K, M> {
        Binding {
            receiver: self.receiver,
            method,
        }
    }
}

/// A receiver paired with its method, ready to be attached to a delegate.
///
/// Attaching it returns nothing; the binding lives until it is removed by other means.
#[must_use = "a binding does nothing until attached to a delegate"]
pub struct Binding<K, M> {
    receiver: K,
    method: M,
}

impl<K, M> Binding<K, M> {
    /// Requests a [`DelegateHandle`] for the binding when it is attached.
    pub fn handled(self) -> HandledBinding<K, M> {
        HandledBinding { binding: self }
    }
}

/// A binding that produces a [`DelegateHandle`] when attached to a delegate.
#[must_use = "a binding does nothing until attached to a delegate"]
pub struct HandledBinding<K, M> {
    binding: Binding<K, M>,
}

/// A binding that can be attached to a delegate with signature `A -> R` and receiver
/// policy `P`.
pub trait Attach<A, R, P> {
    /// What attaching the binding gives back: `()` or a [`DelegateHandle`].
    type Output;

    /// Adds the binding to `delegate`.
    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) -> Self::Output;
}

impl<A, R, P, T, M> Attach<A, R, P> for Binding<Tracked<'_, T>, M>
where
    P: AcceptsTracked,
    T: Reflect + 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = ();

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) {
        delegate.bind_tracked(self.receiver.receiver, self.method);
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for HandledBinding<Tracked<'_, T>, M>
where
    P: AcceptsTracked,
    T: Reflect + 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = DelegateHandle;

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) -> DelegateHandle {
        delegate.bind_tracked_handled(self.binding.receiver.receiver, self.binding.method)
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for Binding<WeakReceiver<T>, M>
where
    P: AcceptsWeak,
    T: 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = ();

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) {
        delegate.bind_weak(&self.receiver.receiver, self.method);
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for HandledBinding<WeakReceiver<T>, M>
where
    P: AcceptsWeak,
    T: 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = DelegateHandle;

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) -> DelegateHandle {
        delegate.bind_weak_handled(&self.binding.receiver.receiver, self.binding.method)
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for Binding<SharedReceiver<T>, M>
where
    P: AcceptsStrong,
    T: 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = ();

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) {
        delegate.bind_shared(&self.receiver.receiver, self.method);
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for HandledBinding<SharedReceiver<T>, M>
where
    P: AcceptsStrong,
    T: 'static,
    M: Method<T, A, R> + 'static,
{
    type Output = DelegateHandle;

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) -> DelegateHandle {
        delegate.bind_shared_handled(&self.binding.receiver.receiver, self.binding.method)
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for Binding<RawReceiver<T>, M>
where
    P: AcceptsStrong,
    M: Method<T, A, R> + 'static,
{
    type Output = ();

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) {
        // SAFETY: Whoever created the binder via Binder::raw() took on the obligation to keep
        // the receiver alive for as long as the binding exists.
        unsafe {
            delegate.bind_raw(self.receiver.receiver, self.method);
        }
    }
}

impl<A, R, P, T, M> Attach<A, R, P> for HandledBinding<RawReceiver<T>, M>
where
    P: AcceptsStrong,
    M: Method<T, A, R> + 'static,
{
    type Output = DelegateHandle;

    fn attach_to(self, delegate: &MulticastDelegate<A, R, P>) -> DelegateHandle {
        // SAFETY: Whoever created the binder via Binder::raw() took on the obligation to keep
        // the receiver alive for as long as the binding exists.
        unsafe { delegate.bind_raw_handled(self.binding.receiver.receiver, self.binding.method) }
    }
}

impl<K> fmt::Debug for Binder<K> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>()).finish_non_exhaustive()
    }
}

impl<K, M> fmt::Debug for Binding<K, M> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>()).finish_non_exhaustive()
    }
}

impl<K, M> fmt::Debug for HandledBinding<K, M> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>()).finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Tracked<'_, T> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("receiver", &ptr::from_ref(self.receiver.get_ref()))
            .finish()
    }
}

impl<T> fmt::Debug for WeakReceiver<T> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("live", &(self.receiver.strong_count() > 0))
            .finish()
    }
}

impl<T> fmt::Debug for SharedReceiver<T> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("receiver", &Rc::as_ptr(&self.receiver))
            .finish()
    }
}

impl<T> fmt::Debug for RawReceiver<T> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("receiver", &self.receiver)
            .finish()
    }
}
