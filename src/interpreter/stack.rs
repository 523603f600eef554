//! Stack safety for the recursive tree-walker.
//!
//! Evaluation recurses once per nested node and once per call, so the native stack use of a
//! program grows with both its nesting and its call depth. `stacker` moves evaluation onto a
//! fresh heap-allocated segment whenever the current one runs low.

/// Minimum stack space to keep available before recursing.
const RED_ZONE: usize = 128 * 1024;

/// Size of each additional stack segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, growing the stack first if less than [`RED_ZONE`] is left.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
