//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested source and deep Mini-LISP recursion both recurse on the
//! host stack. Wrapping the recursive entry points in [`ensure_sufficient_stack`]
//! lets the configured call-depth limit, not the thread's stack size, decide
//! when a program is too deep.

/// If less than this much stack remains, grow before recursing.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
