use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts outstanding remote calls. A guard holds one slot until it is
/// dropped, so a cancelled call still releases the busy flag.
#[derive(Debug, Default)]
pub(crate) struct InFlight(AtomicUsize);

impl InFlight {
    pub(crate) fn enter(&self) -> InFlightGuard<'_> {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(&self.0)
    }

    /// Takes the only slot, or `None` if anything is already in flight.
    pub(crate) fn try_enter(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

pub(crate) struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
