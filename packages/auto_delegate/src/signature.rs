/// A callable that accepts its arguments packed into the tuple `A` and returns `R`.
///
/// The crate expresses a call signature `fn(A0, A1, ..) -> R` as the argument tuple
/// `(A0, A1, ..)` plus the return type `R`. This trait is implemented for every `FnMut`
/// closure, function item and function pointer taking up to eight arguments, so most code
/// never needs to name it. Implement it directly for types that need to carry extra
/// capabilities alongside the call, such as [`Validate`][crate::Validate].
///
/// # Examples
///
/// ```
/// use auto_delegate::Invocable;
///
/// let mut add = |a: i32, b: i32| a + b;
/// assert_eq!(add.invoke((2, 3)), 5);
/// ```
pub trait Invocable<A, R> {
    /// Calls the target with the unpacked argument tuple.
    fn invoke(&mut self, args: A) -> R;
}

/// A callable that is invoked on a receiver of type `T` with the arguments packed into `A`.
///
/// Implemented for every `FnMut(&T, A0, A1, ..) -> R`, which covers method paths such as
/// `Button::on_click` as well as closures that take the receiver as their first parameter.
///
/// # Examples
///
/// ```
/// use auto_delegate::Method;
///
/// struct Counter {
///     step: u32,
/// }
///
/// impl Counter {
///     fn advance(&self, from: u32) -> u32 {
///         from + self.step
///     }
/// }
///
/// let counter = Counter { step: 2 };
/// let mut method = Counter::advance;
/// assert_eq!(method.call_method(&counter, (40,)), 42);
/// ```
pub trait Method<T: ?Sized, A, R> {
    /// Calls the target on `receiver` with the unpacked argument tuple.
    fn call_method(&mut self, receiver: &T, args: A) -> R;
}

macro_rules! impl_signature {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> Invocable<($($arg,)*), R> for F
        where
            F: FnMut($($arg),*) -> R,
        {
            #[inline]
            #[allow(non_snake_case, reason = "argument names are reused type parameter names")]
            fn invoke(&mut self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }
        }

        impl<F, T, R, $($arg,)*> Method<T, ($($arg,)*), R> for F
        where
            T: ?Sized,
            F: FnMut(&T, $($arg),*) -> R,
        {
            #[inline]
            #[allow(non_snake_case, reason = "argument names are reused type parameter names")]
            fn call_method(&mut self, receiver: &T, ($($arg,)*): ($($arg,)*)) -> R {
                self(receiver, $($arg),*)
            }
        }
    };
}

impl_signature!();
impl_signature!(A0);
impl_signature!(A0, A1);
impl_signature!(A0, A1, A2);
impl_signature!(A0, A1, A2, A3);
impl_signature!(A0, A1, A2, A3, A4);
impl_signature!(A0, A1, A2, A3, A4, A5);
impl_signature!(A0, A1, A2, A3, A4, A5, A6);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7);

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn sum3(a: u8, b: u16, c: u32) -> u64 {
        u64::from(a) + u64::from(b) + u64::from(c)
    }

    struct Scale(i64);

    impl Scale {
        fn apply(&self, value: i64) -> i64 {
            self.0 * value
        }
    }

    #[test]
    fn zero_arity_closure() {
        let mut calls = 0;
        let mut count = || {
            calls += 1;
            calls
        };

        assert_eq!(count.invoke(()), 1);
        assert_eq!(count.invoke(()), 2);
    }

    #[test]
    fn function_item_unpacks_tuple() {
        let mut f = sum3;
        assert_eq!(f.invoke((1, 2, 3)), 6);
    }

    #[test]
    fn eight_arguments() {
        let mut f = |a: u8, b: u8, c: u8, d: u8, e: u8, g: u8, h: u8, i: u8| {
            [a, b, c, d, e, g, h, i].iter().map(|x| u32::from(*x)).sum::<u32>()
        };

        assert_eq!(f.invoke((1, 1, 1, 1, 1, 1, 1, 1)), 8);
    }

    #[test]
    fn reference_arguments_pass_through() {
        let value = String::from("hello");
        let mut len = |s: &String| s.len();

        assert_eq!(len.invoke((&value,)), 5);
    }

    #[test]
    fn method_path_receives_receiver() {
        let scale = Scale(3);
        let mut method = Scale::apply;

        assert_eq!(method.call_method(&scale, (7,)), 21);
    }

    #[test]
    fn closure_taking_receiver_first() {
        let scale = Scale(-2);
        let mut method = |s: &Scale, a: i64, b: i64| s.apply(a) + b;

        assert_eq!(method.call_method(&scale, (5, 1)), -9);
    }
}
