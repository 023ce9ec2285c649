use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::rc::Weak;

use crate::{DelegateList, Reflector, SlotKey};

/// Why a slot is being removed on behalf of somebody outside the container.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Eviction {
    /// A handle asked for its slot to be unbound.
    Unbound,

    /// The tracked receiver of the slot is being dropped. Its reflector has already forgotten
    /// the slot, so the slot must not try to discharge itself from the reflector.
    ReceiverDropped,
}

/// Operations on the container behind an [`OwnerRef`], with the container type erased.
struct OwnerVTable {
    evict: unsafe fn(NonNull<()>, SlotKey, Eviction) -> bool,
    contains: unsafe fn(NonNull<()>, SlotKey) -> bool,
    retarget: unsafe fn(NonNull<()>, SlotKey, NonNull<()>, NonNull<Reflector>, SlotKey) -> bool,
    release: unsafe fn(NonNull<()>),
}

struct OwnerThunks<A, R> {
    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> OwnerThunks<A, R> {
    const VTABLE: OwnerVTable = OwnerVTable {
        evict: evict::<A, R>,
        contains: contains::<A, R>,
        retarget: retarget::<A, R>,
        release: release::<A, R>,
    };
}

/// A weak reference to the container core that owns some slot, with the signature of the
/// container erased.
///
/// Receivers use this to tell containers that they are going away and handles use it to
/// unbind their slot. Neither knows (or needs to know) the call signature of the container.
/// The reference does not keep the container alive; all operations do nothing once the
/// container has been dropped.
pub(crate) struct OwnerRef {
    // Obtained from Weak::<DelegateList<A, R>>::into_raw().
    list: NonNull<()>,
    vtable: &'static OwnerVTable,
}

impl OwnerRef {
    pub(crate) fn new<A, R>(list: Weak<DelegateList<A, R>>) -> Self {
        let raw = Weak::into_raw(list).cast_mut().cast::<()>();

        Self {
            // SAFETY: Weak::into_raw() never returns null, not even for a dangling Weak.
            list: unsafe { NonNull::new_unchecked(raw) },
            vtable: &OwnerThunks::<A, R>::VTABLE,
        }
    }

    /// Removes `slot` from the container, returning whether the slot was still present.
    pub(crate) fn evict(&self, slot: SlotKey, reason: Eviction) -> bool {
        // SAFETY: The vtable was chosen for the same A and R as the Weak we hold.
        unsafe { (self.vtable.evict)(self.list, slot, reason) }
    }

    /// Whether the container still exists and still holds `slot`.
    pub(crate) fn contains(&self, slot: SlotKey) -> bool {
        // SAFETY: The vtable was chosen for the same A and R as the Weak we hold.
        unsafe { (self.vtable.contains)(self.list, slot) }
    }

    /// Points the tracked receiver of `slot` at a new receiver and reflector, recording
    /// `charge` as its back-reference in the new reflector.
    ///
    /// Returns whether the container still exists and still holds a tracked `slot`.
    pub(crate) fn retarget(
        &self,
        slot: SlotKey,
        target: NonNull<()>,
        reflector: NonNull<Reflector>,
        charge: SlotKey,
    ) -> bool {
        // SAFETY: The vtable was chosen for the same A and R as the Weak we hold.
        unsafe { (self.vtable.retarget)(self.list, slot, target, reflector, charge) }
    }
}

impl Drop for OwnerRef {
    fn drop(&mut self) {
        // SAFETY: The vtable was chosen for the same A and R as the Weak we hold and this is
        // the only place that gives the Weak back.
        unsafe {
            (self.vtable.release)(self.list);
        }
    }
}

impl fmt::Debug for OwnerRef {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("list", &self.list)
            .finish_non_exhaustive()
    }
}

/// Borrows the `Weak` behind an erased pointer without taking over its reference count.
///
/// # Safety
///
/// `list` must come from `Weak::<DelegateList<A, R>>::into_raw()` and the reference count
/// it represents must not have been given back yet.
unsafe fn borrow_weak<A, R>(list: NonNull<()>) -> ManuallyDrop<Weak<DelegateList<A, R>>> {
    let raw = list.as_ptr().cast_const().cast::<DelegateList<A, R>>();

    // SAFETY: Forwarding guarantees from the caller. ManuallyDrop keeps the count intact.
    ManuallyDrop::new(unsafe { Weak::from_raw(raw) })
}

unsafe fn evict<A, R>(list: NonNull<()>, slot: SlotKey, reason: Eviction) -> bool {
    // SAFETY: OwnerRef only calls this with the pointer it was created from.
    let weak = unsafe { borrow_weak::<A, R>(list) };

    weak.upgrade().is_some_and(|list| list.evict(slot, reason))
}

unsafe fn contains<A, R>(list: NonNull<()>, slot: SlotKey) -> bool {
    // SAFETY: OwnerRef only calls this with the pointer it was created from.
    let weak = unsafe { borrow_weak::<A, R>(list) };

    weak.upgrade().is_some_and(|list| list.contains(slot))
}

unsafe fn retarget<A, R>(
    list: NonNull<()>,
    slot: SlotKey,
    target: NonNull<()>,
    reflector: NonNull<Reflector>,
    charge: SlotKey,
) -> bool {
    // SAFETY: OwnerRef only calls this with the pointer it was created from.
    let weak = unsafe { borrow_weak::<A, R>(list) };

    weak.upgrade()
        .is_some_and(|list| list.retarget(slot, target, reflector, charge))
}

unsafe fn release<A, R>(list: NonNull<()>) {
    let raw = list.as_ptr().cast_const().cast::<DelegateList<A, R>>();

    // SAFETY: OwnerRef only calls this once, from its destructor, with the pointer it was
    // created from.
    drop(unsafe { Weak::from_raw(raw) });
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{Receiver, free_invoker};

    fn list_with_one_slot() -> (Rc<DelegateList<(), ()>>, SlotKey) {
        let list = Rc::new(DelegateList::new(None, 0));
        let key = list.insert(Receiver::Free, free_invoker(|| ()));
        (list, key)
    }

    #[test]
    fn evicts_through_erased_reference() {
        let (list, key) = list_with_one_slot();
        let owner = OwnerRef::new(Rc::downgrade(&list));

        assert!(owner.contains(key));
        assert!(owner.evict(key, Eviction::Unbound));
        assert!(!owner.contains(key));
        assert!(!owner.evict(key, Eviction::Unbound));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn does_nothing_after_container_is_gone() {
        let (list, key) = list_with_one_slot();
        let owner = OwnerRef::new(Rc::downgrade(&list));

        drop(list);

        assert!(!owner.contains(key));
        assert!(!owner.evict(key, Eviction::Unbound));
    }

    #[test]
    fn releases_weak_count_on_drop() {
        let (list, _key) = list_with_one_slot();
        let owner = OwnerRef::new(Rc::downgrade(&list));

        assert_eq!(Rc::weak_count(&list), 1);
        drop(owner);
        assert_eq!(Rc::weak_count(&list), 0);
    }
}
