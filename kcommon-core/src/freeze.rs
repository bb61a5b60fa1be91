//! One-way freeze flag consulted by every registry mutation

use std::sync::atomic::{AtomicBool, Ordering};

/// Monotonic `false -> true` flag
///
/// Once frozen a guard never thaws. The release half of `freeze` pairs with
/// the acquire load in `is_frozen`, so a thread observing `true` also
/// observes every mutation that completed before the freeze.
#[derive(Debug, Default)]
pub struct FreezeGuard {
    frozen: AtomicBool,
}

impl FreezeGuard {
    pub const fn new() -> Self {
        Self {
            frozen: AtomicBool::new(false),
        }
    }

    /// Freeze the guard. Returns `true` only for the call that performed
    /// the transition.
    pub fn freeze(&self) -> bool {
        !self.frozen.swap(true, Ordering::AcqRel)
    }

    /// Whether the guard has been frozen
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}
