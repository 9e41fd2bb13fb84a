//! Stack growth for the recursive walks over types and values.
//!
//! Recursive types can nest values arbitrarily deep, so every recursive
//! encode/decode/reconcile step runs through [`ensure_sufficient_stack`].

/// If less than this remains, we grow the stack.
const RED_ZONE: usize = 64 * 1024;

/// Stack space to allocate per growth.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
