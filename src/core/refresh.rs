use std::fmt;

use crate::catalog::ControlId;
use crate::control::fmt_value;
use crate::ports::TimerHandle;

/// Outstanding-request state for rendering fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// No request outstanding.
    Idle,
    /// One request outstanding, nothing queued behind it.
    InFlight,
    /// One request outstanding and at least one edit arrived while it was
    /// out; completion issues exactly one follow-up.
    InFlightPending,
}

/// Decides when a rendering fetch actually goes out.
///
/// One instance per page session, never torn down, reset only by a full
/// reload. A burst of N edits during one in-flight request collapses to a
/// single follow-up, and a completion (success or failure alike) always
/// releases the in-flight slot.
#[derive(Debug)]
pub struct RefreshCoordinator {
    state: RefreshState,

    // Set while displayed values are being programmatically resynchronized.
    // Triggers arriving then are dropped, not coalesced.
    updating: bool,

    timer: Option<TimerHandle>,
    interval_secs: u32,

    nonce: u64,
}

impl RefreshCoordinator {
    pub fn new(nonce_seed: u64) -> Self {
        RefreshCoordinator {
            state: RefreshState::Idle,
            updating: false,
            timer: None,
            interval_secs: 0,
            nonce: nonce_seed,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// A value-changed or timer trigger. True means the caller issues a
    /// request now; false means it was coalesced behind the in-flight
    /// request, or dropped by the updating guard.
    pub fn trigger(&mut self) -> bool {
        if self.updating {
            return false;
        }
        match self.state {
            RefreshState::Idle => {
                self.state = RefreshState::InFlight;
                true
            }
            RefreshState::InFlight => {
                self.state = RefreshState::InFlightPending;
                false
            }
            RefreshState::InFlightPending => false,
        }
    }

    /// A request completion, successful or not. True means an edit arrived
    /// while the request was out and the caller issues the follow-up now
    /// (the coordinator is already back in flight for it).
    pub fn complete(&mut self) -> bool {
        match self.state {
            // A completion nothing asked for (reordered transport). Absorb.
            RefreshState::Idle => false,
            RefreshState::InFlight => {
                self.state = RefreshState::Idle;
                false
            }
            RefreshState::InFlightPending => {
                self.state = RefreshState::InFlight;
                true
            }
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn begin_update(&mut self) {
        self.updating = true;
    }

    pub fn end_update(&mut self) {
        self.updating = false;
    }

    /// Cache-defeating nonce for the next request. Strictly increasing
    /// within a session.
    pub fn next_nonce(&mut self) -> u64 {
        self.nonce = self.nonce.wrapping_add(1);
        self.nonce
    }

    // Timer bookkeeping. The coordinator owns the handle so at most one
    // recurring trigger can exist; scheduling itself happens at the ports.

    pub fn take_timer(&mut self) -> Option<TimerHandle> {
        self.interval_secs = 0;
        self.timer.take()
    }

    pub fn store_timer(&mut self, handle: TimerHandle, secs: u32) {
        self.timer = Some(handle);
        self.interval_secs = secs;
    }

    pub fn active_timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }
}

/// Query for one rendered artifact: the active system identifier, every live
/// control's value keyed by its identifier, and the nonce.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderQuery {
    pub system: String,
    pub params: Vec<(ControlId, f64)>,
    pub nonce: u64,
}

impl fmt::Display for RenderQuery {
    /// Wire encoding: `systemName` first, one pair per control in display
    /// order, the nonce (`t`) last.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "systemName={}", self.system)?;
        for (id, v) in &self.params {
            write!(f, "&{}={}", id, fmt_value(*v))?;
        }
        write!(f, "&t={}", self.nonce)
    }
}
