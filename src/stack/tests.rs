use crate::frame::{CallSite, Frame, Scope};
use std::{sync::Arc, thread};

use crate::stack::{Context, HookKey};

static OUTER: CallSite = CallSite::new("lib.rs", 10, "outer");
static MIDDLE: CallSite = CallSite::new("lib.rs", 20, "middle");
static INNER: CallSite = CallSite::new("lib.rs", 30, "inner");

const KEY: HookKey = HookKey {
    hook: 1,
    generation: 1,
};

fn methods(frames: &[Frame]) -> Vec<&'static str> {
    frames.iter().map(Frame::method_id).collect()
}

#[test]
fn push_and_pop_nest() {
    let mut context = Context::default();
    let stack = context.stack_mut(KEY);

    stack.push(1, Frame::new(&OUTER, Scope::Empty));
    stack.push(2, Frame::new(&MIDDLE, Scope::Empty));
    assert_eq!(methods(&stack.frames()), ["middle", "outer"]);

    assert_eq!(stack.pop(2), 1);
    assert_eq!(stack.pop(1), 1);
    assert_eq!(stack.depth(), 0);
}

#[test]
fn skipped_returns_are_popped_with_their_caller() {
    let mut context = Context::default();
    let stack = context.stack_mut(KEY);

    stack.push(1, Frame::new(&OUTER, Scope::Empty));
    stack.push(2, Frame::new(&MIDDLE, Scope::Empty));
    stack.push(3, Frame::new(&INNER, Scope::Empty));

    // the returns of `inner` and `middle` never arrive
    assert_eq!(stack.pop(1), 3);
    assert_eq!(stack.depth(), 0);
}

#[test]
fn unknown_returns_are_ignored() {
    let mut context = Context::default();
    let stack = context.stack_mut(KEY);

    stack.push(5, Frame::new(&OUTER, Scope::Empty));
    assert_eq!(stack.pop(4), 0);
    assert_eq!(methods(&stack.frames()), ["outer"]);
}

#[test]
fn recursion_pops_the_innermost_activation() {
    let mut context = Context::default();
    let stack = context.stack_mut(KEY);

    stack.push(1, Frame::new(&OUTER, Scope::Empty));
    stack.push(2, Frame::new(&OUTER, Scope::Empty));
    stack.push(3, Frame::new(&OUTER, Scope::Empty));

    assert_eq!(stack.pop(3), 1);
    assert_eq!(stack.depth(), 2);
}

#[test]
fn new_generation_starts_empty() {
    let mut context = Context::default();
    context
        .stack_mut(KEY)
        .push(1, Frame::new(&OUTER, Scope::Empty));

    let next = HookKey {
        generation: 2,
        ..KEY
    };
    assert!(context.stack(next).is_none());
    assert_eq!(context.stack_mut(next).depth(), 0);
    assert!(context.stack(KEY).is_none());
}

#[test]
fn stale_stacks_are_pruned() {
    let mut context = Context::default();
    context
        .stack_mut(KEY)
        .push(1, Frame::new(&OUTER, Scope::Empty));

    let other = HookKey {
        hook: 2,
        generation: 1,
    };
    context.stack_mut(other);
    context.prune(|key| key != KEY);

    assert!(context.stack(KEY).is_none());
    assert!(context.stack(other).is_some());
}

#[test]
fn discard_only_drops_one_hook() {
    let mut context = Context::default();
    let other = HookKey {
        hook: 2,
        generation: 7,
    };
    context.stack_mut(KEY);
    context.stack_mut(other);

    context.discard(KEY.hook);

    assert!(context.stack(KEY).is_none());
    assert!(context.existing_mut(other).is_some());
}

#[test]
fn returns_posted_elsewhere_are_applied_on_settle() {
    let mut context = Context::default();
    let stack = context.stack_mut(KEY);
    stack.push(1, Frame::new(&OUTER, Scope::Empty));
    stack.push(2, Frame::new(&MIDDLE, Scope::Empty));

    let returns = Arc::clone(context.returns());
    thread::spawn(move || returns.post(2)).join().unwrap();
    assert_eq!(context.stack(KEY).map(|stack| stack.depth()), Some(2));

    context.settle();
    assert_eq!(methods(&context.stack(KEY).unwrap().frames()), ["outer"]);
}

#[test]
fn contexts_own_only_their_returns() {
    let context = Context::default();
    let other = Context::default();
    assert!(context.owns(context.returns()));
    assert!(!context.owns(other.returns()));
}
