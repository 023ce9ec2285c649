//! Shows where `Function` keeps its callable and how cloneable functions are copied.

use auto_delegate::{CloneableFunction, Function, INLINE_CAPACITY, Validated};

fn main() {
    println!("Inline capacity: {INLINE_CAPACITY} bytes");
    println!();

    let offset = 5_i64;
    let small = Function::<(i64,), i64>::new(move |x: i64| x.wrapping_add(offset));
    println!(
        "Small closure: inline = {}, type = {:?}",
        small.is_inline(),
        small.target_type_name()
    );

    let table = [1_i64; 16];
    let mut large =
        Function::<(usize,), i64>::new(move |i: usize| table.get(i).copied().unwrap_or_default());
    println!("Large closure: inline = {}", large.is_inline());
    println!("Large closure result: {}", large.invoke((3,)));
    println!();

    let mut original = CloneableFunction::<(), String>::new(|| String::from("hello"));
    let mut copy = original.clone();
    println!("Original: {}, copy: {}", original.invoke(()), copy.invoke(()));

    original.reset();
    println!("Original after reset is empty: {}", original.is_empty());
    println!("Copy still works: {}", copy.invoke(()));
    println!();

    let mut guarded =
        Function::<(u8,), u8>::new_validated(Validated::new(|x: u8| x.wrapping_mul(2), || false));
    println!("Validated function says it is valid: {}", guarded.validate());
    println!("Checked invocation: {:?}", guarded.try_invoke((4,)));
}
