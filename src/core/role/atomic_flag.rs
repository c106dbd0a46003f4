use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Linearizable boolean cell.
///
/// All accesses are `SeqCst`, so an observer that reads `true` after a
/// successful [`AtomicFlag::set_with_cond`] sees every write that preceded it.
#[derive(Debug, Default)]
pub struct AtomicFlag(AtomicBool);

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(
        &self,
        value: bool,
    ) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn set_true(&self) {
        self.set(true);
    }

    pub fn set_false(&self) {
        self.set(false);
    }

    /// Stores `new` only if the flag currently equals `expected`.
    ///
    /// Returns whether this call performed the transition.
    pub fn set_with_cond(
        &self,
        expected: bool,
        new: bool,
    ) -> bool {
        self.0
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
