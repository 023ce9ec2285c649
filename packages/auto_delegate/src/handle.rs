use std::any::type_name;
use std::fmt;

use tracing::trace;

use crate::{Error, Eviction, OwnerRef, Result, SlotKey};

/// Unbinds one delegate slot when dropped.
///
/// Returned by the `*_handled` binding methods. Exactly one handle exists per handled slot;
/// the handle cannot be cloned. Call [`release()`][Self::release] to keep the slot bound
/// after the handle is gone.
///
/// The handle does not keep the delegate alive. If the delegate has been dropped or the slot
/// has been removed by other means (for example because its tracked receiver was dropped),
/// dropping the handle does nothing.
///
/// # Examples
///
/// ```
/// use auto_delegate::MulticastDelegate;
///
/// let on_tick = MulticastDelegate::<(u32,)>::new();
///
/// let handle = on_tick.bind_handled(|_tick: u32| {});
/// on_tick.bind(|_tick: u32| {});
/// assert_eq!(on_tick.len(), 2);
///
/// drop(handle);
/// assert_eq!(on_tick.len(), 1);
/// ```
#[must_use = "dropping a DelegateHandle immediately unbinds its slot; use release() to keep it"]
pub struct DelegateHandle {
    // `None` once the handle has given up its duty.
    owner: Option<OwnerRef>,
    slot: SlotKey,
}

impl DelegateHandle {
    pub(crate) fn new(owner: OwnerRef, slot: SlotKey) -> Self {
        Self {
            owner: Some(owner),
            slot,
        }
    }

    /// Whether the slot of this handle is still bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| owner.contains(self.slot))
    }

    /// Unbinds the slot now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detached`] if the slot was already gone.
    pub fn unbind(mut self) -> Result<()> {
        let owner = self.owner.take().ok_or(Error::Detached)?;

        if owner.evict(self.slot, Eviction::Unbound) {
            Ok(())
        } else {
            Err(Error::Detached)
        }
    }

    /// Lets go of the handle while keeping the slot bound.
    ///
    /// The slot stays bound until the delegate is cleared or dropped, or until its receiver
    /// goes away.
    pub fn release(mut self) {
        if self.owner.take().is_some() {
            trace!(slot = ?self.slot, "handle released");
        }
    }
}

impl Drop for DelegateHandle {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.evict(self.slot, Eviction::Unbound);
        }
    }
}

impl fmt::Debug for DelegateHandle {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("slot", &self.slot)
            .field("bound", &self.is_bound())
            .finish()
    }
}
