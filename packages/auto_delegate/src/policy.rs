use crate::Sealed;

/// Decides which kinds of receivers a [`MulticastDelegate`][crate::MulticastDelegate]
/// accepts and how it learns that a receiver is gone.
///
/// This trait is sealed. The available policies are [`AnyRef`], [`AutoRef`] and [`WeakRef`].
#[expect(private_bounds, reason = "intentional - sealed trait")]
pub trait ReceiverPolicy: Sealed {
    /// Whether expired receivers have to be swept out before every traversal.
    const POLLS_LIVENESS: bool;
}

/// Marks policies that accept pinned receivers tracked through a [`Reflector`][crate::Reflector].
pub trait AcceptsTracked: ReceiverPolicy {}

/// Marks policies that accept receivers held through [`std::rc::Weak`].
pub trait AcceptsWeak: ReceiverPolicy {}

/// Marks policies that accept receivers kept alive by the delegate (shared ownership) or
/// kept alive by the caller (raw pointers).
pub trait AcceptsStrong: ReceiverPolicy {}

/// Accepts every kind of receiver: tracked, weak, shared and raw.
///
/// Expired weak receivers are swept out before every traversal.
#[derive(Debug)]
#[non_exhaustive]
pub struct AnyRef;

/// Accepts tracked receivers only (besides free callables). Receivers evict their slots
/// eagerly when dropped, so traversals never need to sweep.
#[derive(Debug)]
#[non_exhaustive]
pub struct AutoRef;

/// Accepts weak receivers only (besides free callables). Liveness is polled and expired
/// receivers are swept out before every traversal.
#[derive(Debug)]
#[non_exhaustive]
pub struct WeakRef;

impl Sealed for AnyRef {}
impl Sealed for AutoRef {}
impl Sealed for WeakRef {}

impl ReceiverPolicy for AnyRef {
    const POLLS_LIVENESS: bool = true;
}

impl ReceiverPolicy for AutoRef {
    const POLLS_LIVENESS: bool = false;
}

impl ReceiverPolicy for WeakRef {
    const POLLS_LIVENESS: bool = true;
}

impl AcceptsTracked for AnyRef {}
impl AcceptsWeak for AnyRef {}
impl AcceptsStrong for AnyRef {}

impl AcceptsTracked for AutoRef {}

impl AcceptsWeak for WeakRef {}
