#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Type-erased single and multicast delegates that follow the lifetime of their receivers.
//!
//! A delegate stores callables: closures, functions and methods bound to a receiver object.
//! Invoking the delegate calls what is stored. This crate provides:
//!
//! - [`Function<A, R>`] and [`CloneableFunction<A, R>`]: a single type-erased callable with a
//!   small-buffer optimization. Callables up to [`INLINE_CAPACITY`] bytes are stored inline.
//! - [`Delegate<A, R>`]: one bound target, replaced on every bind.
//! - [`MulticastDelegate<A, R, P>`] with the aliases [`AutoDelegateContainer`] and
//!   [`WeakDelegateContainer`]: any number of bound targets, all called on invoke.
//! - [`DelegateHandle`]: unbinds one target when dropped.
//!
//! Call signatures are written as an argument tuple `A` and a return type `R`. A delegate for
//! `fn(u32, &str) -> bool` is a `MulticastDelegate<(u32, &str), bool>`.
//!
//! # Receiver lifetimes
//!
//! Binding a method to a receiver raises the question of what happens when the receiver goes
//! away while the delegate still refers to it. The answer depends on how the receiver is bound:
//!
//! - **Tracked**: the receiver embeds a [`Reflector`] and implements [`Reflect`]. It is bound
//!   through `Pin<&T>`, so it cannot move, and its reflector removes every binding to it from
//!   every delegate when it is dropped. Nothing ever calls into a dropped receiver and nothing
//!   has to be polled. The receiver type must be `'static` and must not implement [`Unpin`].
//!   [`Reflector::relocate()`] moves the bindings of one receiver to another.
//! - **Weak**: the receiver lives in an [`Rc`][std::rc::Rc] and is bound through a
//!   [`Weak`][std::rc::Weak]. Expired receivers are skipped and swept out lazily.
//! - **Shared**: the binding keeps the receiver alive through an [`Rc`][std::rc::Rc].
//! - **Raw**: the caller guarantees the receiver outlives the binding (`unsafe`).
//!
//! The receiver policy of a multicast delegate decides which of these it accepts, checked at
//! compile time.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::pin::pin;
//!
//! use auto_delegate::{AutoDelegateContainer, Reflect, Reflector};
//!
//! // The reflector comes first and Label does not implement Unpin.
//! struct Label {
//!     reflector: Reflector,
//!     text_len: Cell<usize>,
//! }
//!
//! impl Label {
//!     fn on_text_changed(&self, text: &str) {
//!         self.text_len.set(text.len());
//!     }
//! }
//!
//! // SAFETY: The reflector is the first field of the label and the label is not Unpin.
//! unsafe impl Reflect for Label {
//!     fn reflector(&self) -> &Reflector {
//!         &self.reflector
//!     }
//! }
//!
//! let on_text_changed = AutoDelegateContainer::<(&str,)>::new();
//!
//! {
//!     let label = pin!(Label {
//!         reflector: Reflector::new(),
//!         text_len: Cell::new(0),
//!     });
//!
//!     on_text_changed.bind_tracked(label.as_ref(), Label::on_text_changed);
//!     on_text_changed.invoke(("hello",));
//!     assert_eq!(label.text_len.get(), 5);
//! }
//!
//! // The label has been dropped, taking its binding with it.
//! assert!(on_text_changed.is_empty());
//! on_text_changed.invoke(("nobody is listening",));
//! ```
//!
//! # Thread safety
//!
//! All types in this crate are single-threaded: they are neither [`Send`] nor [`Sync`].

mod binder;
mod builder;
mod delegate;
mod error;
mod function;
mod handle;
mod list;
mod multicast;
mod owner;
mod policy;
mod receiver;
mod reflector;
mod signature;
mod slots;
mod storage;
mod validate;

pub use binder::*;
pub use builder::*;
pub use delegate::*;
pub use error::*;
pub use function::*;
pub use handle::*;
pub(crate) use list::*;
pub use multicast::*;
pub(crate) use owner::*;
pub use policy::*;
pub(crate) use receiver::*;
pub use reflector::*;
pub use signature::*;
pub(crate) use slots::*;
pub use storage::*;
pub use validate::*;

trait Sealed {}
