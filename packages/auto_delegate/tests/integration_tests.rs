//! Integration tests for `auto_delegate` that exercise delegates the way an application would:
//! receivers that come and go while delegates are being invoked, moved and dropped.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::{Pin, pin};
use std::rc::Rc;

use auto_delegate::{
    AutoDelegateContainer, Binder, Delegate, Error, MulticastDelegate, Reflect, Reflector,
    WeakDelegateContainer,
};
use static_assertions::assert_not_impl_any;
use testing::{CallLog, DropCounter};

struct Button {
    reflector: Reflector,
    name: &'static str,
    log: CallLog,
}

assert_not_impl_any!(Button: Unpin);

impl Button {
    fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            reflector: Reflector::new(),
            name,
            log: log.clone(),
        }
    }

    fn on_click(&self, x: i32, y: i32) {
        self.log.record(format!("{} {x},{y}", self.name));
    }
}

// SAFETY: The reflector is the first field of the button and the button is not Unpin.
unsafe impl Reflect for Button {
    fn reflector(&self) -> &Reflector {
        &self.reflector
    }
}

#[test]
fn dropped_tracked_receiver_is_never_called() {
    let log = CallLog::new();
    let on_click = AutoDelegateContainer::<(i32, i32)>::new();

    {
        let button = pin!(Button::new("ok", &log));
        on_click.bind_tracked(button.as_ref(), Button::on_click);
    }

    on_click.invoke((1, 2));

    assert!(log.is_empty());
    assert!(on_click.is_empty());
}

#[test]
fn same_receiver_bound_twice_is_called_twice() {
    let log = CallLog::new();
    let on_click = AutoDelegateContainer::<(i32, i32)>::new();
    let button = pin!(Button::new("ok", &log));

    on_click.bind_tracked(button.as_ref(), Button::on_click);
    on_click.bind_tracked(button.as_ref(), Button::on_click);

    on_click.invoke((3, 4));

    assert_eq!(log.entries(), vec!["ok 3,4", "ok 3,4"]);
    assert_eq!(button.reflector.charge_count(), 2);
}

#[test]
fn one_receiver_in_many_delegates() {
    let log = CallLog::new();
    let first = AutoDelegateContainer::<(i32, i32)>::new();
    let second = MulticastDelegate::<(i32, i32)>::new();

    {
        let button = pin!(Button::new("shared", &log));
        first.bind_tracked(button.as_ref(), Button::on_click);
        second.bind_tracked(button.as_ref(), Button::on_click);
        assert_eq!(button.reflector.charge_count(), 2);

        // Dropping one delegate releases only its own binding.
        drop(first);
        assert_eq!(button.reflector.charge_count(), 1);
    }

    assert!(second.is_empty());
}

#[test]
fn weak_expiry_shrinks_after_one_pass() {
    let log = CallLog::new();
    let on_click = WeakDelegateContainer::<(i32, i32)>::new();

    let alive = Rc::new(Button::new("alive", &log));
    let doomed = Rc::new(Button::new("doomed", &log));

    on_click.bind_weak(&Rc::downgrade(&alive), Button::on_click);
    on_click.bind_weak(&Rc::downgrade(&doomed), Button::on_click);
    drop(doomed);

    // Expiry is only noticed when the delegate looks.
    assert_eq!(on_click.len(), 2);

    on_click.invoke((0, 0));

    assert_eq!(on_click.len(), 1);
    assert_eq!(log.entries(), vec!["alive 0,0"]);
}

#[test]
fn receiver_dropped_mid_pass_is_skipped() {
    let log = CallLog::new();
    let on_tick = AutoDelegateContainer::<(i32, i32)>::new();

    // The first callback drops the button in the holder before that button gets its turn.
    let holder: Rc<RefCell<Option<Pin<Box<Button>>>>> = Rc::new(RefCell::new(None));

    let buttons = [Box::pin(Button::new("a", &log)), Box::pin(Button::new("b", &log))];
    let [first, second] = buttons;

    let dropper_log = log.clone();
    let dropper_holder = Rc::clone(&holder);
    on_tick.bind(move |_x: i32, _y: i32| {
        dropper_log.record("dropper");
        let button = dropper_holder.borrow_mut().take();
        drop(button);
    });

    on_tick.bind_tracked(first.as_ref(), Button::on_click);
    on_tick.bind_tracked(second.as_ref(), Button::on_click);
    *holder.borrow_mut() = Some(second);

    on_tick.invoke((7, 7));

    let entries = log.entries();
    assert!(entries.contains(&"dropper".to_owned()));
    assert!(entries.contains(&"a 7,7".to_owned()));
    assert!(!entries.contains(&"b 7,7".to_owned()));
    assert_eq!(on_tick.len(), 2);

    on_tick.invoke((8, 8));
    assert!(log.entries().contains(&"a 8,8".to_owned()));
    assert!(!log.entries().contains(&"b 8,8".to_owned()));

    drop(first);
    assert_eq!(on_tick.len(), 1);
}

#[test]
fn delegate_can_be_moved_while_receivers_are_bound() {
    let log = CallLog::new();
    let button = pin!(Button::new("moved", &log));

    let mut delegates = Vec::new();
    let delegate = AutoDelegateContainer::<(i32, i32)>::new();
    delegate.bind_tracked(button.as_ref(), Button::on_click);
    delegates.push(delegate);

    // Force the vector to reallocate, moving the delegate again.
    delegates.reserve(64);

    for delegate in &delegates {
        delegate.invoke((5, 6));
    }

    assert_eq!(log.entries(), vec!["moved 5,6"]);

    delegates.clear();
    assert_eq!(button.reflector.charge_count(), 0);
}

#[test]
fn handles_unbind_and_release() {
    let on_change = MulticastDelegate::<(u32,)>::new();
    let log = CallLog::new();

    let kept_log = log.clone();
    let kept = on_change.bind_handled(move |v: u32| kept_log.record(format!("kept {v}")));

    let dropped_log = log.clone();
    let dropped = on_change.bind_handled(move |v: u32| dropped_log.record(format!("dropped {v}")));

    kept.release();
    drop(dropped);

    on_change.invoke((1,));

    assert_eq!(log.entries(), vec!["kept 1"]);
    assert_eq!(on_change.len(), 1);
}

#[test]
fn handle_unbind_reports_detached_after_receiver_drop() {
    let log = CallLog::new();
    let on_click = AutoDelegateContainer::<(i32, i32)>::new();

    let handle = {
        let button = pin!(Button::new("gone", &log));
        on_click.bind_tracked_handled(button.as_ref(), Button::on_click)
    };

    assert!(!handle.is_bound());
    assert!(matches!(handle.unbind(), Err(Error::Detached)));
}

#[test]
fn unbind_receiver_reports_not_bound() {
    let log = CallLog::new();
    let on_click = MulticastDelegate::<(i32, i32)>::new();
    let button = pin!(Button::new("never", &log));

    let error = on_click.unbind_receiver(&*button).unwrap_err();

    assert!(matches!(error, Error::NotBound { .. }));
    assert!(error.to_string().contains("no slot is bound"));
}

#[test]
fn results_are_visited() {
    let vote = MulticastDelegate::<(&str,), usize>::new();
    vote.bind(|s: &str| s.len());
    vote.bind(|s: &str| s.matches('a').count());

    let mut results = Vec::new();
    vote.for_each_invoke(("banana",), |r| results.push(r));
    results.sort_unstable();

    assert_eq!(results, vec![3, 6]);
}

#[test]
fn reference_arguments_reach_every_binding() {
    let counter = Cell::new(0);

    let on_frame = MulticastDelegate::<(&Cell<u32>,)>::new();
    on_frame.bind(|counter: &Cell<u32>| counter.set(counter.get() + 1));
    on_frame.bind(|counter: &Cell<u32>| counter.set(counter.get() + 10));

    on_frame.invoke((&counter,));

    assert_eq!(counter.get(), 11);
}

#[test]
fn binder_respects_policy() {
    let log = CallLog::new();
    let on_click = MulticastDelegate::<(i32, i32)>::new();
    let shared = Rc::new(Button::new("shared", &log));

    let handle = on_click.attach(Binder::shared(&shared).method(Button::on_click).handled());
    on_click.attach(Binder::weak(&Rc::downgrade(&shared)).method(Button::on_click));

    on_click.invoke((9, 9));
    assert_eq!(log.len(), 2);

    handle.unbind().unwrap();
    drop(shared);

    on_click.invoke((9, 9));
    assert_eq!(log.len(), 2);
    assert!(on_click.is_empty());
}

#[test]
fn single_delegate_follows_receiver() {
    let log = CallLog::new();
    let on_click = Delegate::<(i32, i32)>::new();

    {
        let button = pin!(Button::new("single", &log));
        on_click.bind_tracked(button.as_ref(), Button::on_click);
        on_click.invoke((1, 1));
    }

    assert!(!on_click.is_bound());
    assert_eq!(on_click.try_invoke((1, 1)), None);
    assert_eq!(log.entries(), vec!["single 1,1"]);
}

#[test]
fn panicking_binding_leaves_delegate_usable() {
    let on_value = MulticastDelegate::<(i32,)>::new();
    let calls = Rc::new(Cell::new(0));

    on_value.bind(|v: i32| assert!(v >= 0, "negative value"));

    let outcome = catch_unwind(AssertUnwindSafe(|| on_value.invoke((-1,))));
    assert!(outcome.is_err());

    let counted = Rc::clone(&calls);
    on_value.bind(move |_v: i32| counted.set(counted.get() + 1));
    on_value.invoke((1,));

    assert_eq!(calls.get(), 1);
    assert_eq!(on_value.len(), 2);
}

#[test]
fn dropping_delegate_drops_callables() {
    let counter = DropCounter::new();
    let on_event = WeakDelegateContainer::<()>::new();

    for _ in 0..3 {
        let token = counter.token();
        on_event.bind(move || {
            let _keep = &token;
        });
    }

    assert_eq!(counter.dropped(), 0);

    drop(on_event);
    assert_eq!(counter.dropped(), 3);
}

#[test]
fn bindings_follow_relocated_receiver() {
    let log = CallLog::new();
    let on_click = AutoDelegateContainer::<(i32, i32)>::new();

    let first = Box::pin(Button::new("first", &log));
    let second = Box::pin(Button::new("second", &log));
    on_click.bind_tracked(first.as_ref(), Button::on_click);
    on_click.bind_tracked(second.as_ref(), Button::on_click);

    on_click.invoke((1, 1));
    assert_eq!(log.sorted_entries(), vec!["first 1,1", "second 1,1"]);

    // Move the state of the first button into a new value and let the bindings follow.
    let moved = Box::pin(Button::new(first.name, &first.log));
    Reflector::relocate(first.as_ref(), moved.as_ref());
    drop(first);

    log.clear();
    on_click.invoke((2, 2));
    assert_eq!(log.sorted_entries(), vec!["first 2,2", "second 2,2"]);
    assert_eq!(moved.reflector.charge_count(), 1);

    drop(second);

    log.clear();
    on_click.invoke((3, 3));
    assert_eq!(log.entries(), vec!["first 3,3"]);

    drop(moved);
    assert!(on_click.is_empty());
}

#[test]
fn relocated_single_target_follows_receiver() {
    let log = CallLog::new();
    let on_click = Delegate::<(i32, i32)>::new();

    let original = Box::pin(Button::new("single", &log));
    on_click.bind_tracked(original.as_ref(), Button::on_click);

    let replacement = Box::pin(Button::new("replacement", &log));
    Reflector::relocate(original.as_ref(), replacement.as_ref());
    drop(original);

    assert!(on_click.is_bound());
    on_click.invoke((4, 4));
    assert_eq!(log.entries(), vec!["replacement 4,4"]);

    drop(replacement);
    assert!(!on_click.is_bound());
}

/// Invokes a delegate from its destructor.
struct InvokeOnDrop {
    delegate: Rc<AutoDelegateContainer<()>>,
}

impl Drop for InvokeOnDrop {
    fn drop(&mut self) {
        self.delegate.invoke(());
    }
}

struct Widget {
    reflector: Reflector,
    on_teardown: InvokeOnDrop,
    log: CallLog,
}

impl Widget {
    fn teardown(&self) {
        self.log.record("teardown");
    }
}

// SAFETY: The reflector is the first field of the widget and the widget is not Unpin.
unsafe impl Reflect for Widget {
    fn reflector(&self) -> &Reflector {
        &self.reflector
    }
}

#[test]
fn field_destructors_after_reflector_do_not_reach_receiver() {
    let log = CallLog::new();
    let on_teardown = Rc::new(AutoDelegateContainer::<()>::new());

    {
        let widget = pin!(Widget {
            reflector: Reflector::new(),
            on_teardown: InvokeOnDrop {
                delegate: Rc::clone(&on_teardown),
            },
            log: log.clone(),
        });
        on_teardown.bind_tracked(widget.as_ref(), Widget::teardown);

        on_teardown.invoke(());
        assert_eq!(log.entries(), vec!["teardown"]);
    }

    // The binding was gone before the field invoked the delegate.
    assert_eq!(log.entries(), vec!["teardown"]);
    assert!(on_teardown.is_empty());
}
