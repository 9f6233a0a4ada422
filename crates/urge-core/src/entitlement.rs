//! Paid-feature gate.

use std::sync::Arc;

/// Read-only answer to "is the paid feature unlocked". Purchases and
/// receipt checks live outside the core.
pub trait EntitlementOracle {
    fn is_unlocked(&self) -> bool;
}

/// A fixed answer, e.g. from the `premium.unlocked` config flag.
impl EntitlementOracle for bool {
    fn is_unlocked(&self) -> bool {
        *self
    }
}

impl<E: EntitlementOracle + ?Sized> EntitlementOracle for Arc<E> {
    fn is_unlocked(&self) -> bool {
        (**self).is_unlocked()
    }
}
