use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::pin::Pin;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    DenseSlots, Eviction, Function, Invocable, Method, OwnerRef, Receiver, Reflect, Reflector,
    SlotKey,
};

/// Number of slot keys a traversal can snapshot without allocating.
const INLINE_TRAVERSAL: usize = 16;

/// Erased call target of a slot: receives the resolved receiver (null for free callables)
/// followed by the arguments of the delegate.
pub(crate) type Invoker<A, R> = Function<(*const (), A), R>;

/// Wraps a free callable into an invoker that ignores the receiver.
pub(crate) fn free_invoker<F, A, R>(mut callable: F) -> Invoker<A, R>
where
    F: Invocable<A, R> + 'static,
{
    Function::new(move |_receiver: *const (), args: A| callable.invoke(args))
}

/// Wraps a method into an invoker that calls it on the resolved receiver.
///
/// # Safety
///
/// The invoker must only ever be called with a pointer to a live `T`.
pub(crate) unsafe fn method_invoker<T, M, A, R>(mut method: M) -> Invoker<A, R>
where
    M: Method<T, A, R> + 'static,
{
    Function::new(move |receiver: *const (), args: A| {
        // SAFETY: Forwarding the guarantee from the creator of the invoker. The receiver was
        // resolved right before the call and is kept alive until the call returns.
        let receiver = unsafe { &*receiver.cast::<T>() };

        method.call_method(receiver, args)
    })
}

/// One bound target in a container.
pub(crate) struct Slot<A, R> {
    // Declared first so the reflector link is severed before the invoker is dropped.
    receiver: Receiver,

    // Empty while the invoker is executing.
    invoker: Invoker<A, R>,
}

/// The shared core of all single and multicast delegates.
///
/// Lives behind an `Rc` so that receivers and handles can reach it through weak references
/// without caring where the delegate value itself is moved. No borrow of the slot arena is
/// ever held while user code runs: invokers are moved out of their slot for the duration of
/// a call, and removed slots are dropped only after the arena borrow has ended.
pub(crate) struct DelegateList<A, R> {
    slots: RefCell<DenseSlots<Slot<A, R>>>,
    label: Option<String>,
}

impl<A, R> DelegateList<A, R> {
    pub(crate) fn new(label: Option<String>, capacity: usize) -> Self {
        Self {
            slots: RefCell::new(DenseSlots::with_capacity(capacity)),
            label,
        }
    }

    pub(crate) fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn trace_label(&self) -> &str {
        self.label().unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    #[cfg_attr(test, mutants::skip)] // Capacity is not observable through the API.
    pub(crate) fn reserve(&self, additional: usize) {
        self.slots.borrow_mut().reserve(additional);
    }

    pub(crate) fn contains(&self, key: SlotKey) -> bool {
        self.slots.borrow().contains(key)
    }

    /// Whether the slot exists and its receiver has not expired.
    pub(crate) fn is_live(&self, key: SlotKey) -> bool {
        self.slots
            .borrow()
            .get(key)
            .is_some_and(|slot| slot.receiver.is_live())
    }

    /// Key of an arbitrary slot, used by single-target delegates that hold at most one.
    pub(crate) fn first_key(&self) -> Option<SlotKey> {
        self.slots.borrow().keys().next()
    }

    pub(crate) fn insert(&self, receiver: Receiver, invoker: Invoker<A, R>) -> SlotKey {
        let key = self.slots.borrow_mut().insert(Slot { receiver, invoker });

        trace!(label = self.trace_label(), slot = ?key, "bound");

        key
    }

    /// Binds a method of a pinned receiver that evicts the slot when it is dropped.
    pub(crate) fn insert_tracked<T, M>(self: &Rc<Self>, receiver: Pin<&T>, method: M) -> SlotKey
    where
        T: Reflect + 'static,
        M: Method<T, A, R> + 'static,
    {
        let receiver = receiver.get_ref();
        let reflector = receiver.reflector();

        // SAFETY: The slot is removed by the reflector before the pinned receiver is dropped.
        let invoker = unsafe { method_invoker::<T, M, A, R>(method) };
        let key = self.insert(Receiver::tracked(receiver, reflector), invoker);

        let charge = reflector.charge(OwnerRef::new(Rc::downgrade(self)), key);

        if let Some(slot) = self.slots.borrow_mut().get_mut(key) {
            slot.receiver.set_charge(charge);
        }

        key
    }

    /// Binds a method of a receiver that is polled for liveness.
    pub(crate) fn insert_weak<T, M>(&self, receiver: &Weak<T>, method: M) -> SlotKey
    where
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        // SAFETY: The receiver is upgraded to a strong reference for the duration of each call.
        let invoker = unsafe { method_invoker::<T, M, A, R>(method) };

        self.insert(Receiver::weak(receiver), invoker)
    }

    /// Binds a method of a receiver that the slot keeps alive.
    pub(crate) fn insert_shared<T, M>(&self, receiver: &Rc<T>, method: M) -> SlotKey
    where
        T: 'static,
        M: Method<T, A, R> + 'static,
    {
        // SAFETY: The slot owns a strong reference to the receiver.
        let invoker = unsafe { method_invoker::<T, M, A, R>(method) };

        self.insert(Receiver::shared(receiver), invoker)
    }

    /// # Safety
    ///
    /// The receiver must stay alive and must not be mutably borrowed while the slot exists.
    pub(crate) unsafe fn insert_raw<T, M>(&self, receiver: NonNull<T>, method: M) -> SlotKey
    where
        M: Method<T, A, R> + 'static,
    {
        // SAFETY: Forwarding the guarantee from our caller.
        let invoker = unsafe { method_invoker::<T, M, A, R>(method) };

        self.insert(Receiver::Raw(receiver.cast()), invoker)
    }

    /// Removes a slot on behalf of a handle or a dropped receiver.
    pub(crate) fn evict(&self, key: SlotKey, reason: Eviction) -> bool {
        let removed = self.slots.borrow_mut().remove(key);

        let Some(mut slot) = removed else {
            return false;
        };

        if reason == Eviction::ReceiverDropped {
            slot.receiver.forget_charge();
        }

        trace!(label = self.trace_label(), slot = ?key, ?reason, "evicted");

        drop(slot);
        true
    }

    /// Points a tracked slot at a receiver that took over from the previous one.
    pub(crate) fn retarget(
        &self,
        key: SlotKey,
        target: NonNull<()>,
        reflector: NonNull<Reflector>,
        charge: SlotKey,
    ) -> bool {
        let retargeted = self
            .slots
            .borrow_mut()
            .get_mut(key)
            .is_some_and(|slot| slot.receiver.retarget(target, reflector, charge));

        if retargeted {
            trace!(label = self.trace_label(), slot = ?key, "receiver relocated");
        }

        retargeted
    }

    /// Removes the first slot whose receiver lives at `address`.
    pub(crate) fn remove_by_address(&self, address: usize) -> bool {
        let key = self
            .slots
            .borrow()
            .iter()
            .find(|(_, slot)| slot.receiver.address() == Some(address))
            .map(|(key, _)| key);

        let Some(key) = key else {
            return false;
        };

        let removed = self.slots.borrow_mut().remove(key);

        trace!(label = self.trace_label(), slot = ?key, address, "unbound by receiver identity");

        drop(removed);
        true
    }

    /// Removes every slot whose receiver has expired, returning how many were removed.
    pub(crate) fn sweep(&self) -> usize {
        let expired = self
            .slots
            .borrow_mut()
            .remove_where(|slot| !slot.receiver.is_live());

        let count = expired.len();

        if count > 0 {
            debug!(label = self.trace_label(), count, "swept expired receivers");
        }

        release(expired);
        count
    }

    pub(crate) fn clear(&self) {
        let slots = self.slots.borrow_mut().drain();

        trace!(label = self.trace_label(), count = slots.len(), "cleared");

        release(slots);
    }

    /// Calls one slot, returning `None` if the slot is gone, its receiver has expired or the
    /// slot is already executing further up the stack.
    pub(crate) fn call(&self, key: SlotKey, args: A) -> Option<R> {
        let (invoker, receiver) = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.get_mut(key)?;

            if slot.invoker.is_empty() {
                return None;
            }

            let receiver = slot.receiver.resolve()?;

            (slot.invoker.take(), receiver)
        };

        // Puts the invoker back even if it panics. If the slot was removed in the meantime,
        // the invoker is dropped instead, outside of any borrow.
        let mut invoker = scopeguard::guard(invoker, |invoker| self.restore(key, invoker));

        let result = invoker.invoke((receiver.target(), args));

        drop(invoker);
        drop(receiver);

        Some(result)
    }

    fn restore(&self, key: SlotKey, invoker: Invoker<A, R>) {
        let displaced = {
            let mut slots = self.slots.borrow_mut();

            match slots.get_mut(key) {
                Some(slot) => {
                    slot.invoker = invoker;
                    None
                }
                None => Some(invoker),
            }
        };

        drop(displaced);
    }

    /// Calls every slot that is bound when the traversal starts, handing each result to
    /// `visit`.
    ///
    /// Slots removed by an earlier call of the same traversal are skipped. Slots added during
    /// the traversal are left for the next one.
    pub(crate) fn for_each(&self, args: A, sweep: bool, mut visit: impl FnMut(R))
    where
        A: Clone,
    {
        if sweep {
            self.sweep();
        }

        let keys: SmallVec<[SlotKey; INLINE_TRAVERSAL]> = self.slots.borrow().keys().collect();

        for key in keys {
            if let Some(result) = self.call(key, args.clone()) {
                visit(result);
            }
        }
    }

    /// Calls the only slot of a single-target delegate.
    pub(crate) fn call_first(&self, args: A) -> Option<R> {
        let key = self.first_key()?;
        self.call(key, args)
    }
}

/// Drops removed slots, first severing every reflector link among them.
///
/// Dropping an invoker may drop a tracked receiver whose own slot is also in `slots`. Its
/// reflector must not be discharged after that, so all links are severed before any invoker
/// is dropped.
fn release<A, R>(mut slots: Vec<Slot<A, R>>) {
    for slot in &mut slots {
        slot.receiver.detach();
    }

    drop(slots);
}

impl<A, R> Drop for DelegateList<A, R> {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().drain();

        if !slots.is_empty() {
            debug!(label = self.trace_label(), count = slots.len(), "dropping bound slots");
        }

        release(slots);
    }
}

impl<A, R> fmt::Debug for DelegateList<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("label", &self.label)
            .field("len", &self.slots.try_borrow().map(|slots| slots.len()).ok())
            .finish()
    }
}

impl<A, R> fmt::Debug for Slot<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("receiver", &self.receiver)
            .field("invoker", &self.invoker)
            .finish()
    }
}
