#[cfg(test)]
mod wipe_test;

use zeroize::Zeroize;

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(test)]
pub(crate) static WIPE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Securely erases sensitive data from memory.
///
/// Use this to wipe key material after you don't need it anymore. The write
/// is performed through `zeroize`, which places a compiler fence after the
/// volatile stores so the erasure cannot be optimized out.
pub fn wipe(data: &mut [u8]) {
    data.zeroize();
    #[cfg(test)]
    WIPE_COUNT.fetch_add(1, Ordering::SeqCst);
}
