use std::sync::atomic::{AtomicBool, Ordering};

/// Holds a loading flag up for as long as it lives.
pub(super) struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    pub(super) fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
