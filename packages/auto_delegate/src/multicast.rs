use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};

use crate::{
    AcceptsStrong, AcceptsTracked, AcceptsWeak, AnyRef, Attach, AutoRef, DelegateHandle,
    DelegateList, Error, Invocable, Method, MulticastDelegateBuilder, OwnerRef, Receiver,
    ReceiverPolicy, Reflect, Result, SlotKey, WeakRef, free_invoker,
};

/// A list of bound callables that are all called when the delegate is invoked.
///
/// The delegate stores any number of bindings. A binding is a free callable (closure or
/// function) or a method bound to a receiver. The receiver policy `P` decides which kinds of
/// receivers the delegate accepts and how their lifetime is followed:
///
/// * Tracked receivers embed a [`Reflector`][crate::Reflector] and are bound via `Pin<&T>`.
///   Their bindings are removed the moment the receiver is dropped.
/// * Weak receivers are bound via [`Weak<T>`]. Bindings to expired receivers are skipped and
///   swept away before every invocation.
/// * Shared receivers are bound via [`Rc<T>`] and are kept alive by the binding.
/// * Raw receivers are bound via [`NonNull<T>`]; the caller guarantees their lifetime.
///
/// See [`AutoDelegateContainer`] and [`WeakDelegateContainer`] for the restricted variants.
///
/// All operations take `&self`, so bound callables may bind, unbind and invoke the same
/// delegate while it is being invoked. Invocation visits the bindings present when it starts;
/// a binding removed by an earlier callback is skipped and bindings added during the
/// invocation are visited by the next one. The order in which bindings are called is
/// unspecified.
///
/// Moving the delegate is always safe, also while receivers are bound to it: the bindings live
/// in shared storage that does not move.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use auto_delegate::MulticastDelegate;
///
/// struct Window {
///     area: Cell<u32>,
/// }
///
/// impl Window {
///     fn on_resize(&self, width: u32, height: u32) {
///         self.area.set(width * height);
///     }
/// }
///
/// let on_resize = MulticastDelegate::<(u32, u32)>::new();
///
/// let window = Rc::new(Window { area: Cell::new(0) });
/// on_resize.bind_weak(&Rc::downgrade(&window), Window::on_resize);
/// on_resize.bind(|width: u32, height: u32| println!("resized to {width}x{height}"));
///
/// on_resize.invoke((640, 480));
/// assert_eq!(window.area.get(), 640 * 480);
/// ```
pub struct MulticastDelegate<A, R = (), P = AnyRef> {
    list: Rc<DelegateList<A, R>>,

    _policy: PhantomData<P>,
}

/// A multicast delegate that accepts free callables and tracked receivers.
///
/// Tracked receivers remove their bindings when they are dropped, so the delegate never has to
/// poll for expired receivers.
pub type AutoDelegateContainer<A, R = ()> = MulticastDelegate<A, R, AutoRef>;

/// A multicast delegate that accepts free callables and weakly referenced receivers.
///
/// Bindings to expired receivers are removed at the start of every invocation.
pub type WeakDelegateContainer<A, R = ()> = MulticastDelegate<A, R, WeakRef>;

impl<A, R, P> MulticastDelegate<A, R, P>
where
    P: ReceiverPolicy,
{
    /// Creates an empty delegate.
    #[must_use]
    pub fn new() -> Self {
        Self::new_inner(None, 0)
    }

    /// Starts building a delegate with custom settings.
    pub fn builder() -> MulticastDelegateBuilder<A, R, P> {
        MulticastDelegateBuilder::new()
    }

    pub(crate) fn new_inner(label: Option<String>, capacity: usize) -> Self {
        Self {
            list: Rc::new(DelegateList::new(label, capacity)),
            _policy: PhantomData,
        }
    }

    /// The label given to the delegate via its builder, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.list.label()
    }

    /// Binds a closure or function that is called with the delegate arguments.
    pub fn bind<F>(&self, callable: F)
    where
        F: Invocable<A, R> + 'static,
    {
        self.list.insert(Receiver::Free, free_invoker(callable));
    }

    /// Binds a closure or function and returns a handle that unbinds it when dropped.
    pub fn bind_handled<F>(&self, callable: F) -> DelegateHandle
    where
        F: Invocable<A, R> + 'static,
    {
        let key = self.list.insert(Receiver::Free, free_invoker(callable));
        self.handle(key)
    }

    /// Binds a method of a pinned receiver that removes the binding when it is dropped.
    ///
    /// The same receiver may be bound any number of times, to any number of delegates.
    ///
    /// The receiver type must be `'static`. A pinned receiver can be leaked without ever
    /// running its destructor, which would leave the binding pointing at whatever the
    /// receiver borrowed after the borrow has ended:
    ///
    /// ```compile_fail
    /// use std::pin::pin;
    ///
    /// use auto_delegate::{AutoDelegateContainer, Reflect, Reflector};
    ///
    /// struct Borrower<'a> {
    ///     value: &'a u64,
    ///     reflector: Reflector,
    /// }
    ///
    /// // SAFETY: The reflector is a field of the borrower.
    /// unsafe impl Reflect for Borrower<'_> {
    ///     fn reflector(&self) -> &Reflector {
    ///         &self.reflector
    ///     }
    /// }
    ///
    /// let on_read = AutoDelegateContainer::<()>::new();
    /// let value = 5;
    /// let borrower = pin!(Borrower {
    ///     value: &value,
    ///     reflector: Reflector::new(),
    /// });
    ///
    /// on_read.bind_tracked(borrower.as_ref(), |b: &Borrower<'_>| assert_eq!(*b.value, 5));
    /// ```
    pub fn bind_tracked<T, M>(&self, receiver: Pin<&T>, method: M)
    where
        P: AcceptsTracked,
        T: Reflect + 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.insert_tracked(receiver, method);
    }

    /// Binds a method of a pinned receiver and returns a handle that unbinds it when dropped.
    pub fn bind_tracked_handled<T, M>(&self, receiver: Pin<&T>, method: M) -> DelegateHandle
    where
        P: AcceptsTracked,
        T: Reflect + 'static,
        M: Method<T, A, R> + 'static,
    {
        let key = self.list.insert_tracked(receiver, method);
        self.handle(key)
    }

    /// Binds a method of a weakly referenced receiver.
    ///
    /// Once the last strong reference to the receiver is dropped, the binding is no longer
    /// called and is removed by the next invocation or [`sweep()`][Self::sweep]. An already
    /// expired receiver is accepted and removed the same way.
    pub fn bind_weak<T, M>(&self, receiver: &Weak<T>, method: M)
    where
        P: AcceptsWeak,
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.insert_weak(receiver, method);
    }

    /// Binds a method of a weakly referenced receiver and returns a handle that unbinds it
    /// when dropped.
    pub fn bind_weak_handled<T, M>(&self, receiver: &Weak<T>, method: M) -> DelegateHandle
    where
        P: AcceptsWeak,
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        let key = self.list.insert_weak(receiver, method);
        self.handle(key)
    }

    /// Binds a method of a receiver that the binding keeps alive.
    pub fn bind_shared<T, M>(&self, receiver: &Rc<T>, method: M)
    where
        P: AcceptsStrong,
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        self.list.insert_shared(receiver, method);
    }

    /// Binds a method of a receiver that the binding keeps alive and returns a handle that
    /// unbinds it when dropped.
    pub fn bind_shared_handled<T, M>(&self, receiver: &Rc<T>, method: M) -> DelegateHandle
    where
        P: AcceptsStrong,
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        let key = self.list.insert_shared(receiver, method);
        self.handle(key)
    }

    /// Binds a method of a receiver whose lifetime the caller manages.
    ///
    /// # Safety
    ///
    /// The receiver must stay alive and must not be mutably borrowed for as long as the
    /// binding exists.
    pub unsafe fn bind_raw<T, M>(&self, receiver: NonNull<T>, method: M)
    where
        P: AcceptsStrong,
        M: Method<T, A, R> + 'static,
    {
        // SAFETY: Forwarding the guarantee from our caller.
        unsafe {
            self.list.insert_raw(receiver, method);
        }
    }

    /// Binds a method of a receiver whose lifetime the caller manages and returns a handle
    /// that unbinds it when dropped.
    ///
    /// # Safety
    ///
    /// The receiver must stay alive and must not be mutably borrowed for as long as the
    /// binding exists.
    pub unsafe fn bind_raw_handled<T, M>(&self, receiver: NonNull<T>, method: M) -> DelegateHandle
    where
        P: AcceptsStrong,
        M: Method<T, A, R> + 'static,
    {
        // SAFETY: Forwarding the guarantee from our caller.
        let key = unsafe { self.list.insert_raw(receiver, method) };
        self.handle(key)
    }

    /// Adds a binding assembled via [`Binder`][crate::Binder].
    ///
    /// Returns a [`DelegateHandle`] if the binding was marked as handled, otherwise nothing.
    pub fn attach<B>(&self, binding: B) -> B::Output
    where
        B: Attach<A, R, P>,
    {
        binding.attach_to(self)
    }

    /// Removes one binding whose receiver is `receiver`, identified by address.
    ///
    /// If the receiver is bound more than once, only one of its bindings is removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBound`] if no binding targets the receiver.
    pub fn unbind_receiver<T>(&self, receiver: &T) -> Result<()> {
        let address = ptr::from_ref(receiver).addr();

        if self.list.remove_by_address(address) {
            Ok(())
        } else {
            Err(Error::NotBound { address })
        }
    }

    /// Calls every binding with a clone of `args`, discarding the results.
    ///
    /// Panics raised by a bound callable propagate to the caller after the delegate has been
    /// restored to a consistent state. Bindings that were not yet called are not called.
    pub fn invoke(&self, args: A)
    where
        A: Clone,
    {
        self.list.for_each(args, P::POLLS_LIVENESS, drop);
    }

    /// Calls every binding with a clone of `args`, handing each result to `visitor`.
    ///
    /// # Examples
    ///
    /// ```
    /// use auto_delegate::MulticastDelegate;
    ///
    /// let vote = MulticastDelegate::<(u32,), bool>::new();
    /// vote.bind(|n: u32| n > 10);
    /// vote.bind(|n: u32| n % 2 == 0);
    ///
    /// let mut ayes = 0;
    /// vote.for_each_invoke((12,), |aye| ayes += u32::from(aye));
    /// assert_eq!(ayes, 2);
    /// ```
    pub fn for_each_invoke(&self, args: A, visitor: impl FnMut(R))
    where
        A: Clone,
    {
        self.list.for_each(args, P::POLLS_LIVENESS, visitor);
    }

    /// Number of bindings, including bindings to expired weak receivers that have not yet been
    /// swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the delegate has no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Removes every binding.
    pub fn clear(&self) {
        self.list.clear();
    }

    /// Removes the bindings of expired weak receivers, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.list.sweep()
    }

    /// Reserves capacity for at least `additional` more bindings.
    pub fn reserve(&self, additional: usize) {
        self.list.reserve(additional);
    }

    fn handle(&self, key: SlotKey) -> DelegateHandle {
        DelegateHandle::new(OwnerRef::new(Rc::downgrade(&self.list)), key)
    }
}

impl<A, R, P> Default for MulticastDelegate<A, R, P>
where
    P: ReceiverPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R, P> fmt::Debug for MulticastDelegate<A, R, P> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("list", &self.list)
            .finish()
    }
}
