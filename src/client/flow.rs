//! The per-call retry-once state machine.
//!
//! ```text
//!  Sending ──401 (business)──► AwaitingRefresh ──refreshed──► Retrying
//!     │                              │                           │
//!     │ settled / failed             │ refresh failed            │ settled / failed
//!     ▼                              ▼                           ▼
//!   Done ◄───────────────────────── Done ◄────────────────────── Done
//! ```
//!
//! Every transition moves strictly forward, so one call can request at most
//! one refresh and at most one retry. The machine knows nothing about HTTP;
//! the client feeds it events and executes the actions it returns.

use crate::models::request::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The original request is in flight.
    Sending,
    /// The original request got a 401 and the refresh leg is running.
    AwaitingRefresh,
    /// The original request is being re-issued with a renewed token.
    Retrying,
    /// An outcome has been decided.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A leg produced an HTTP response.
    Settled { unauthorized: bool },
    /// A leg produced no response (transport failure, cancellation, bad body).
    Failed,
    /// The refresh leg finished.
    Refreshed { ok: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hand the current outcome to the caller.
    Return,
    /// Run the refresh leg.
    Refresh,
    /// Re-issue the original request.
    Retry,
    /// Tear the session down, then hand the current outcome to the caller.
    Logout,
}

#[derive(Debug, Clone)]
pub struct RequestFlow {
    route: Route,
    phase: Phase,
}

impl RequestFlow {
    pub fn new(route: Route) -> Self {
        RequestFlow {
            route,
            phase: Phase::Sending,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Applies `event` and returns what the client must do next.
    pub fn advance(&mut self, event: Event) -> Action {
        let (next, action) = match (self.phase, event) {
            (Phase::Sending, Event::Settled { unauthorized: true }) => match self.route {
                Route::Business => (Phase::AwaitingRefresh, Action::Refresh),
                Route::Login | Route::Refresh => (Phase::Done, Action::Logout),
                Route::Verify => (Phase::Done, Action::Return),
            },
            (Phase::Sending, _) => (Phase::Done, Action::Return),

            (Phase::AwaitingRefresh, Event::Refreshed { ok: true }) => {
                (Phase::Retrying, Action::Retry)
            }
            (Phase::AwaitingRefresh, Event::Refreshed { ok: false }) => {
                (Phase::Done, Action::Logout)
            }
            (Phase::AwaitingRefresh, _) => (Phase::Done, Action::Return),

            (Phase::Retrying, Event::Settled { unauthorized: true }) => {
                (Phase::Done, Action::Logout)
            }
            (Phase::Retrying, _) => (Phase::Done, Action::Return),

            (Phase::Done, _) => (Phase::Done, Action::Return),
        };
        self.phase = next;
        action
    }
}
