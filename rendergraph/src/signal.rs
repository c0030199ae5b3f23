//! Signal & wait.

use crate::error::{Error, Result, RuntimeError};
use std::cell::Cell;
use std::time::Duration;

pub type SignalId = u32;

/// Lifecycle state of one `Signal`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalState {
    /// Linked into the IR but not yet part of a submitted chain.
    Disarmed,
    /// Submitted; a device/host wait can observe completion.
    Synchronizable,
    /// The device (or host, for `eHost` work) has finished; the owning
    /// resource may be reclaimed by the `Allocator`.
    HostAvailable,
}

/// The host/device synchronization object associated with one IR output.
///
/// Every node that may be observed externally owns one of these.
/// `wait`/`poll`/`get` on a `Value<T>` are thin wrappers that drive
/// compilation + submission and then block or peek on this.
pub struct Signal {
    state: Cell<SignalState>,
    /// Timeline value this signal corresponds to once armed; used by
    /// later acquirers to compute synchronization (a weak back-reference,
    /// never dereferenced — only used to order waits).
    timeline_value: Cell<u64>,
}

impl Signal {
    pub fn new() -> Signal {
        Signal {
            state: Cell::new(SignalState::Disarmed),
            timeline_value: Cell::new(0),
        }
    }

    pub fn state(&self) -> SignalState {
        self.state.get()
    }

    /// Called when this signal's node is linked into the IR. Resets a
    /// previously consumed signal back to `Disarmed` so the same
    /// `Signal` slot can back a fresh node on the next compile.
    pub fn arm(&self) {
        self.timeline_value.set(0);
        self.state.set(SignalState::Disarmed);
    }

    /// Raised to `Synchronizable` by `submit()`.
    pub fn mark_submitted(&self, timeline_value: u64) {
        self.timeline_value.set(timeline_value);
        self.state.set(SignalState::Synchronizable);
    }

    /// Observed by the executor once the corresponding timeline/semaphore
    /// value has been reached on the device (or the host callback for
    /// `eHost` work has returned).
    pub fn mark_host_available(&self) {
        self.state.set(SignalState::HostAvailable);
    }

    pub fn timeline_value(&self) -> u64 {
        self.timeline_value.get()
    }

    /// Non-blocking peek.
    pub fn poll(&self) -> bool {
        self.state.get() == SignalState::HostAvailable
    }

    /// Blocks until `HostAvailable`, or returns `Timeout` if `timeout` is
    /// `Some` and elapses first. On timeout the signal remains pending and
    /// the caller may re-wait.
    ///
    /// The actual blocking primitive (a device semaphore wait or a host
    /// condvar) lives in the executor that drives this signal to
    /// `HostAvailable`; this method is the public surface callers see,
    /// matching `vuk::Result`'s contract that a failed wait leaves the
    /// value in the `Synchronizable` state.
    pub fn wait(&self, poll_fn: impl Fn() -> bool, timeout: Option<Duration>) -> Result<()> {
        if self.state.get() == SignalState::Disarmed {
            return Err(Error::InvalidState(crate::error::InvalidState::ValueAlreadyConsumed));
        }
        let start = std::time::Instant::now();
        loop {
            if poll_fn() {
                self.mark_host_available();
                return Ok(());
            }
            if let Some(t) = timeout {
                if start.elapsed() >= t {
                    return Err(Error::Runtime(RuntimeError::Timeout));
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Signal::new()
    }
}
