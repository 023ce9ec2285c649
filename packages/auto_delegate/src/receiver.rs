use std::any::{Any, type_name};
use std::fmt;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};

use crate::{ActiveCall, Reflector, SlotKey};

/// The object a container slot calls its method on, together with the way its lifetime is
/// known to the container.
pub(crate) enum Receiver {
    /// No receiver; the slot holds a free function or a self-contained closure.
    Free,

    /// A receiver the caller promised to keep alive for as long as the slot exists.
    Raw(NonNull<()>),

    /// A receiver kept alive by the slot itself.
    Shared(Rc<dyn Any>),

    /// A receiver whose liveness is polled before every call and before every traversal.
    Weak(Weak<dyn Any>),

    /// A pinned receiver that evicts the slot from its destructor.
    Tracked {
        target: NonNull<()>,
        reflector: NonNull<Reflector>,

        // Key of our back-reference in the reflector. `None` once the reflector no longer
        // knows about this slot (or before it has been charged).
        charge: Option<SlotKey>,
    },
}

/// Checks that `reflector` lies inside `target`, as `Reflect` implementations promise.
pub(crate) fn debug_assert_inline<T>(target: &T, reflector: &Reflector) {
    let target_address = ptr::from_ref(target).addr();
    let reflector_address = ptr::from_ref(reflector).addr();

    debug_assert!(
        reflector_address >= target_address
            && reflector_address < target_address.wrapping_add(size_of::<T>()),
        "Reflect::reflector() must return a reflector stored inside the receiver"
    );
}

/// A receiver that has been checked to be alive and is kept alive until this is dropped.
pub(crate) struct Resolved {
    target: *const (),

    _strong: Option<Rc<dyn Any>>,
    _call: Option<ActiveCall>,
}

impl Resolved {
    pub(crate) fn target(&self) -> *const () {
        self.target
    }
}

impl Receiver {
    pub(crate) fn shared<T: 'static>(receiver: &Rc<T>) -> Self {
        let receiver: Rc<dyn Any> = Rc::<T>::clone(receiver);
        Self::Shared(receiver)
    }

    pub(crate) fn weak<T: 'static>(receiver: &Weak<T>) -> Self {
        let receiver: Weak<dyn Any> = Weak::<T>::clone(receiver);
        Self::Weak(receiver)
    }

    pub(crate) fn tracked<T>(target: &T, reflector: &Reflector) -> Self {
        debug_assert_inline(target, reflector);

        Self::Tracked {
            target: NonNull::from(target).cast(),
            reflector: NonNull::from(reflector),
            charge: None,
        }
    }

    /// The address of the receiver, used to find slots by receiver identity.
    pub(crate) fn address(&self) -> Option<usize> {
        match self {
            Self::Free => None,
            Self::Raw(target) | Self::Tracked { target, .. } => Some(target.addr().get()),
            Self::Shared(receiver) => Some(Rc::as_ptr(receiver).cast::<()>().addr()),
            Self::Weak(receiver) => Some(receiver.as_ptr().cast::<()>().addr()),
        }
    }

    /// Whether the receiver may still be called. Only weak receivers can expire on their own;
    /// tracked receivers remove their slots before they disappear.
    pub(crate) fn is_live(&self) -> bool {
        match self {
            Self::Weak(receiver) => receiver.strong_count() > 0,
            Self::Free | Self::Raw(_) | Self::Shared(_) | Self::Tracked { .. } => true,
        }
    }

    /// Checks the receiver is alive and pins it alive for the duration of one call.
    pub(crate) fn resolve(&self) -> Option<Resolved> {
        let resolved = match self {
            Self::Free => Resolved {
                target: ptr::null(),
                _strong: None,
                _call: None,
            },
            Self::Raw(target) => Resolved {
                target: target.as_ptr().cast_const(),
                _strong: None,
                _call: None,
            },
            Self::Shared(receiver) => Resolved {
                target: Rc::as_ptr(receiver).cast::<()>(),
                _strong: Some(Rc::clone(receiver)),
                _call: None,
            },
            Self::Weak(receiver) => {
                let receiver = receiver.upgrade()?;

                Resolved {
                    target: Rc::as_ptr(&receiver).cast::<()>(),
                    _strong: Some(receiver),
                    _call: None,
                }
            }
            Self::Tracked {
                target, reflector, ..
            } => {
                // SAFETY: A charged reflector evicts our slot before it is dropped, so as long as
                // the slot exists the reflector is alive.
                let reflector = unsafe { reflector.as_ref() };

                Resolved {
                    target: target.as_ptr().cast_const(),
                    _strong: None,
                    _call: Some(reflector.enter_call()),
                }
            }
        };

        Some(resolved)
    }

    pub(crate) fn set_charge(&mut self, key: SlotKey) {
        if let Self::Tracked { charge, .. } = self {
            *charge = Some(key);
        }
    }

    /// Moves a tracked receiver to a new address. The previous reflector must already have
    /// forgotten the slot. Returns `false` for other kinds of receivers.
    pub(crate) fn retarget(
        &mut self,
        new_target: NonNull<()>,
        new_reflector: NonNull<Reflector>,
        new_charge: SlotKey,
    ) -> bool {
        let Self::Tracked {
            target,
            reflector,
            charge,
        } = self
        else {
            return false;
        };

        *target = new_target;
        *reflector = new_reflector;
        *charge = Some(new_charge);
        true
    }

    /// Forgets the back-reference without touching the reflector, which is already gone or
    /// going away.
    pub(crate) fn forget_charge(&mut self) {
        if let Self::Tracked { charge, .. } = self {
            *charge = None;
        }
    }

    /// Severs the link between the slot and the reflector of a tracked receiver.
    pub(crate) fn detach(&mut self) {
        let Self::Tracked {
            reflector, charge, ..
        } = self
        else {
            return;
        };

        let Some(key) = charge.take() else {
            return;
        };

        // SAFETY: A charged reflector evicts our slot before it is dropped, so as long as
        // we hold a charge the reflector is alive.
        let reflector = unsafe { reflector.as_ref() };

        reflector.discharge(key);
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Receiver {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            Self::Free => "free",
            Self::Raw(_) => "raw",
            Self::Shared(_) => "shared",
            Self::Weak(_) => "weak",
            Self::Tracked { .. } => "tracked",
        };

        f.debug_struct(type_name::<Self>())
            .field("mode", &mode)
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    struct Sensor {
        value: u32,
        reflector: Reflector,
    }

    #[test]
    fn free_has_no_address_and_null_target() {
        let receiver = Receiver::Free;
        let resolved = receiver.resolve().unwrap();

        assert_eq!(receiver.address(), None);
        assert!(resolved.target().is_null());
        assert!(receiver.is_live());
    }

    #[test]
    fn shared_keeps_receiver_alive() {
        let value = Rc::new(5_u32);
        let receiver = Receiver::shared(&value);
        let address = Rc::as_ptr(&value).addr();

        drop(value);

        let resolved = receiver.resolve().unwrap();
        assert_eq!(receiver.address(), Some(address));
        // SAFETY: The slot holds a strong reference, so the value is alive.
        assert_eq!(unsafe { *resolved.target().cast::<u32>() }, 5);
    }

    #[test]
    fn weak_expires_with_last_strong_reference() {
        let value = Rc::new(String::from("weak"));
        let receiver = Receiver::weak(&Rc::downgrade(&value));
        let address = Rc::as_ptr(&value).addr();

        assert!(receiver.is_live());
        assert_eq!(receiver.address(), Some(address));

        {
            let resolved = receiver.resolve().unwrap();
            // The resolved receiver holds a strong reference of its own during the call.
            assert_eq!(Rc::strong_count(&value), 2);
            assert_eq!(resolved.target().addr(), address);
        }

        drop(value);

        assert!(!receiver.is_live());
        assert!(receiver.resolve().is_none());
        assert_eq!(receiver.address(), Some(address));
    }

    #[test]
    fn tracked_resolution_registers_active_call() {
        let sensor = Sensor {
            value: 11,
            reflector: Reflector::new(),
        };
        let receiver = Receiver::tracked(&sensor, &sensor.reflector);

        let resolved = receiver.resolve().unwrap();
        assert_eq!(sensor.reflector.active_calls(), 1);
        // SAFETY: The sensor outlives the resolved receiver.
        assert_eq!(unsafe { (*resolved.target().cast::<Sensor>()).value }, 11);

        drop(resolved);
        assert_eq!(sensor.reflector.active_calls(), 0);
        assert_eq!(receiver.address(), Some(ptr::from_ref(&sensor).addr()));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must return a reflector stored inside the receiver")]
    fn tracked_rejects_foreign_reflector() {
        let sensor = Sensor {
            value: 0,
            reflector: Reflector::new(),
        };
        let elsewhere = Reflector::new();

        drop(Receiver::tracked(&sensor, &elsewhere));
    }
}
