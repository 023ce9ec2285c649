//! Demonstrates delegates that follow the lifetime of their receivers.
//!
//! A window raises resize events. Panels subscribe to them in three different ways and the
//! example shows what each subscription does once its panel goes away.

use std::cell::Cell;
use std::pin::pin;
use std::rc::Rc;

use auto_delegate::{
    AutoDelegateContainer, Delegate, MulticastDelegate, Reflect, Reflector, WeakDelegateContainer,
};

struct Panel {
    reflector: Reflector,
    name: &'static str,
    area: Cell<u32>,
}

impl Panel {
    fn new(name: &'static str) -> Self {
        Self {
            reflector: Reflector::new(),
            name,
            area: Cell::new(0),
        }
    }

    fn on_resize(&self, width: u32, height: u32) {
        self.area.set(width.saturating_mul(height));
        println!("  {} now covers {} pixels", self.name, self.area.get());
    }
}

// SAFETY: The reflector is the first field of the panel and the panel is not Unpin.
unsafe impl Reflect for Panel {
    fn reflector(&self) -> &Reflector {
        &self.reflector
    }
}

fn main() {
    println!("=== Tracked receivers ===");

    let on_resize = AutoDelegateContainer::<(u32, u32)>::builder()
        .label("window.resize")
        .build();

    {
        let sidebar = pin!(Panel::new("sidebar"));
        on_resize.bind_tracked(sidebar.as_ref(), Panel::on_resize);
        on_resize.bind(|width: u32, height: u32| println!("  resized to {width}x{height}"));

        println!("Invoking with the sidebar alive:");
        on_resize.invoke((800, 600));
        println!("Bindings: {}", on_resize.len());
    }

    println!("Invoking after the sidebar was dropped:");
    on_resize.invoke((1024, 768));
    println!("Bindings: {}", on_resize.len());
    println!();

    println!("=== Weak receivers ===");

    let on_scroll = WeakDelegateContainer::<(u32, u32)>::new();
    let toolbar = Rc::new(Panel::new("toolbar"));
    on_scroll.bind_weak(&Rc::downgrade(&toolbar), Panel::on_resize);

    drop(toolbar);
    println!("Bindings before invoking: {}", on_scroll.len());
    on_scroll.invoke((10, 10));
    println!("Bindings after invoking: {}", on_scroll.len());
    println!();

    println!("=== Handles ===");

    let on_close = MulticastDelegate::<()>::new();
    let handle = on_close.bind_handled(|| println!("  closing"));
    on_close.invoke(());

    drop(handle);
    println!("Bindings after dropping the handle: {}", on_close.len());
    println!();

    println!("=== Single target ===");

    let hit_test = Delegate::<(i32, i32), bool>::new();
    hit_test.bind(|x: i32, y: i32| x >= 0 && y >= 0);
    println!("Hit at (3, 4): {}", hit_test.invoke((3, 4)));

    hit_test.reset();
    println!("Hit after reset: {:?}", hit_test.try_invoke((3, 4)));
}
