use std::any::{self, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

use crate::{Invocable, Validate};

const INLINE_WORDS: usize = 4;

/// Number of bytes a callable may occupy to be stored inside a function value itself,
/// without a separate heap allocation.
///
/// Callables that are larger than this, or that require stricter alignment than a pointer,
/// are moved to the heap and only a pointer to them is stored inline.
pub const INLINE_CAPACITY: usize = INLINE_WORDS * size_of::<usize>();

/// Whether a callable of type `F` is stored inside the buffer instead of on the heap.
#[must_use]
pub(crate) const fn fits_inline<F>() -> bool {
    size_of::<F>() <= INLINE_CAPACITY && align_of::<F>() <= align_of::<usize>()
}

/// Word-aligned bytes holding either a callable or a pointer to a boxed callable.
///
/// The buffer itself has no idea what it contains; the operation table installed next to it
/// in [`RawFunction`] knows how to interpret, clone and drop the contents.
struct Buffer {
    words: [MaybeUninit<usize>; INLINE_WORDS],
}

impl Buffer {
    const fn uninit() -> Self {
        Self {
            words: [MaybeUninit::uninit(); INLINE_WORDS],
        }
    }

    fn store<F>(callable: F) -> Self {
        let mut buffer = Self::uninit();
        let start = buffer.start_mut();

        if fits_inline::<F>() {
            // SAFETY: fits_inline() guarantees that F fits into the buffer and that the
            // buffer (aligned to usize) satisfies the alignment requirement of F.
            unsafe {
                start.cast::<F>().write(callable);
            }
        } else {
            let boxed = NonNull::from(Box::leak(Box::new(callable)));

            // SAFETY: A pointer is exactly one word, which always fits into the buffer.
            unsafe {
                start.cast::<NonNull<F>>().write(boxed);
            }
        }

        buffer
    }

    fn start(&self) -> NonNull<()> {
        NonNull::from(&self.words).cast()
    }

    fn start_mut(&mut self) -> NonNull<()> {
        NonNull::from(&mut self.words).cast()
    }
}

/// Resolves the location of the `F` stored in a buffer, whichever way it was stored.
///
/// # Safety
///
/// The buffer at `start` must have been filled by `Buffer::store::<F>()` and not yet dropped.
unsafe fn payload<F>(start: NonNull<()>) -> NonNull<F> {
    if fits_inline::<F>() {
        start.cast()
    } else {
        // SAFETY: Forwarding guarantees from the caller; heap mode stores a NonNull<F>.
        unsafe { start.cast::<NonNull<F>>().read() }
    }
}

/// Static table of type-specific operations for one callable type.
///
/// One table exists per (callable type, capability set). An empty function has no table.
pub(crate) struct VTable<A, R> {
    invoke: unsafe fn(NonNull<()>, A) -> R,
    validate: unsafe fn(NonNull<()>) -> bool,
    clone: Option<unsafe fn(NonNull<()>) -> Buffer>,
    drop: unsafe fn(NonNull<()>),
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    inline: bool,
}

/// The operations the vtable of `F` points to.
struct Thunks<F, A, R> {
    _callable: PhantomData<F>,
    _signature: PhantomData<fn(A) -> R>,
}

impl<F, A, R> Thunks<F, A, R>
where
    F: Invocable<A, R> + 'static,
{
    const PLAIN: VTable<A, R> = VTable {
        invoke: invoke_payload::<F, A, R>,
        validate: always_valid,
        clone: None,
        drop: drop_payload::<F>,
        type_id: TypeId::of::<F>,
        type_name: any::type_name::<F>,
        inline: fits_inline::<F>(),
    };
}

impl<F, A, R> Thunks<F, A, R>
where
    F: Invocable<A, R> + Validate + 'static,
{
    const VALIDATED: VTable<A, R> = VTable {
        validate: validate_payload::<F>,
        ..Self::PLAIN
    };
}

impl<F, A, R> Thunks<F, A, R>
where
    F: Invocable<A, R> + Clone + 'static,
{
    const CLONEABLE: VTable<A, R> = VTable {
        clone: Some(clone_payload::<F>),
        ..Self::PLAIN
    };
}

impl<F, A, R> Thunks<F, A, R>
where
    F: Invocable<A, R> + Validate + Clone + 'static,
{
    const CLONEABLE_VALIDATED: VTable<A, R> = VTable {
        clone: Some(clone_payload::<F>),
        ..Self::VALIDATED
    };
}

unsafe fn invoke_payload<F: Invocable<A, R>, A, R>(start: NonNull<()>, args: A) -> R {
    // SAFETY: The vtable of F is only ever installed next to a buffer holding an F.
    let callable = unsafe { payload::<F>(start) };

    // SAFETY: The caller derived `start` from an exclusive borrow of the buffer.
    let callable = unsafe { &mut *callable.as_ptr() };

    callable.invoke(args)
}

unsafe fn validate_payload<F: Validate>(start: NonNull<()>) -> bool {
    // SAFETY: The vtable of F is only ever installed next to a buffer holding an F.
    let callable = unsafe { payload::<F>(start) };

    // SAFETY: Only shared access happens while validating.
    let callable = unsafe { callable.as_ref() };

    callable.validate()
}

unsafe fn always_valid(_start: NonNull<()>) -> bool {
    true
}

unsafe fn clone_payload<F: Clone>(start: NonNull<()>) -> Buffer {
    // SAFETY: The vtable of F is only ever installed next to a buffer holding an F.
    let callable = unsafe { payload::<F>(start) };

    // SAFETY: Only shared access happens while cloning.
    let callable = unsafe { callable.as_ref() };

    Buffer::store(callable.clone())
}

unsafe fn drop_payload<F>(start: NonNull<()>) {
    if fits_inline::<F>() {
        // SAFETY: The buffer holds an initialized F that nobody will touch again.
        unsafe {
            ptr::drop_in_place(start.cast::<F>().as_ptr());
        }
    } else {
        // SAFETY: The buffer holds a pointer to a boxed F that nobody will touch again.
        let boxed = unsafe { payload::<F>(start) };

        // SAFETY: Heap mode stores the pointer we obtained from Box::leak() in Buffer::store().
        drop(unsafe { Box::from_raw(boxed.as_ptr()) });
    }
}

/// Type-erased storage for one callable plus the table of operations that apply to it.
///
/// This is the engine under `Function` and `CloneableFunction`, which add the type-level
/// capability rules (whether copying is possible) on top. Moving a `RawFunction` is a plain
/// bitwise move of the buffer and the table pointer; no thunks are involved.
pub(crate) struct RawFunction<A, R> {
    buffer: Buffer,

    // A raw pointer instead of a `&'static` reference, so that signatures containing
    // borrowed arguments do not need to be `'static`. Always points to a promoted constant.
    vtable: Option<NonNull<VTable<A, R>>>,

    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> RawFunction<A, R> {
    pub(crate) const fn empty() -> Self {
        Self {
            buffer: Buffer::uninit(),
            vtable: None,
            _signature: PhantomData,
        }
    }

    pub(crate) fn plain<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + 'static,
    {
        // SAFETY: The table is a promoted constant, valid for the rest of the program.
        unsafe { Self::with_vtable(callable, &Thunks::<F, A, R>::PLAIN) }
    }

    pub(crate) fn validated<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Validate + 'static,
    {
        // SAFETY: The table is a promoted constant, valid for the rest of the program.
        unsafe { Self::with_vtable(callable, &Thunks::<F, A, R>::VALIDATED) }
    }

    pub(crate) fn cloneable<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Clone + 'static,
    {
        // SAFETY: The table is a promoted constant, valid for the rest of the program.
        unsafe { Self::with_vtable(callable, &Thunks::<F, A, R>::CLONEABLE) }
    }

    pub(crate) fn cloneable_validated<F>(callable: F) -> Self
    where
        F: Invocable<A, R> + Validate + Clone + 'static,
    {
        // SAFETY: The table is a promoted constant, valid for the rest of the program.
        unsafe { Self::with_vtable(callable, &Thunks::<F, A, R>::CLONEABLE_VALIDATED) }
    }

    /// # Safety
    ///
    /// `vtable` must be the table generated for `F` and must remain valid for as long as any
    /// function value created from it exists.
    unsafe fn with_vtable<F>(callable: F, vtable: &VTable<A, R>) -> Self {
        Self {
            buffer: Buffer::store(callable),
            vtable: Some(NonNull::from(vtable)),
            _signature: PhantomData,
        }
    }

    fn vtable(&self) -> Option<&VTable<A, R>> {
        // SAFETY: Every installed table is a promoted constant (see with_vtable()).
        self.vtable.map(|vtable| unsafe { vtable.as_ref() })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.vtable.is_none()
    }

    pub(crate) fn is_inline(&self) -> bool {
        self.vtable().is_some_and(|vtable| vtable.inline)
    }

    #[cfg(test)]
    pub(crate) fn is_cloneable(&self) -> bool {
        self.vtable().is_some_and(|vtable| vtable.clone.is_some())
    }

    /// Calls the stored callable or returns `None` if there is none.
    pub(crate) fn call(&mut self, args: A) -> Option<R> {
        let invoke = self.vtable()?.invoke;
        let start = self.buffer.start_mut();

        // SAFETY: The table was installed together with the callable it describes and the
        // buffer is borrowed exclusively for the duration of the call.
        Some(unsafe { invoke(start, args) })
    }

    pub(crate) fn validate(&self) -> bool {
        let Some(vtable) = self.vtable() else {
            return false;
        };

        // SAFETY: The table was installed together with the callable it describes.
        unsafe { (vtable.validate)(self.buffer.start()) }
    }

    /// Deep-copies the stored callable into a new function value.
    ///
    /// Returns `None` if the stored callable was not registered as cloneable.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        let Some(vtable) = self.vtable() else {
            return Some(Self::empty());
        };

        let clone = vtable.clone?;

        Some(Self {
            // SAFETY: The table was installed together with the callable it describes.
            buffer: unsafe { clone(self.buffer.start()) },
            vtable: self.vtable,
            _signature: PhantomData,
        })
    }

    pub(crate) fn target_type(&self) -> Option<TypeId> {
        self.vtable().map(|vtable| (vtable.type_id)())
    }

    pub(crate) fn target_type_name(&self) -> Option<&'static str> {
        self.vtable().map(|vtable| (vtable.type_name)())
    }

    pub(crate) fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }

    pub(crate) fn reset(&mut self) {
        drop(self.take());
    }
}

impl<A, R> Drop for RawFunction<A, R> {
    fn drop(&mut self) {
        let Some(drop_fn) = self.vtable().map(|vtable| vtable.drop) else {
            return;
        };

        // Clear the table first so a panicking destructor cannot lead to a second drop.
        self.vtable = None;

        // SAFETY: The table was installed together with the callable it describes and we
        // just made sure nothing will use the buffer contents afterwards.
        unsafe {
            drop_fn(self.buffer.start_mut());
        }
    }
}

impl<A, R> fmt::Debug for RawFunction<A, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(any::type_name::<Self>())
            .field("target", &self.target_type_name())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}
