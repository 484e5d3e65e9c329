//! Per-navigation lifecycle.

use crate::request::NavigationId;
use crate::request::NavigationRequest;
use core::fmt;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::time::Instant;

/// `Idle -> Pending -> {Settled, TimedOut} -> Resolved`, with `TimedOut -> Settled` when the
/// response arrives after the loading affordance was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    /// Request in flight, affordance not shown.
    Pending,
    /// Request in flight and the affordance is visible.
    TimedOut,
    /// Response or failure received; timer cancelled.
    Settled,
    /// Patch, fallback, or supersession applied.
    Resolved,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::TimedOut => "timed-out",
            Self::Settled => "settled",
            Self::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationAttempt {
    id: NavigationId,
    request: NavigationRequest,
    state: AttemptState,
    /// Whether the loading affordance was shown at any point.
    showed_busy: bool,
    started_at: Option<Instant>,
}

impl NavigationAttempt {
    pub fn new(id: NavigationId, request: NavigationRequest) -> Self {
        Self {
            id,
            request,
            state: AttemptState::Idle,
            showed_busy: false,
            started_at: None,
        }
    }

    pub fn id(&self) -> NavigationId {
        self.id
    }

    pub fn request(&self) -> &NavigationRequest {
        &self.request
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn showed_busy(&self) -> bool {
        self.showed_busy
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn start(&mut self, now: Instant) -> SpliceResult<()> {
        self.transition(&[AttemptState::Idle], AttemptState::Pending)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn time_out(&mut self) -> SpliceResult<()> {
        self.transition(&[AttemptState::Pending], AttemptState::TimedOut)?;
        self.showed_busy = true;
        Ok(())
    }

    pub fn settle(&mut self) -> SpliceResult<()> {
        self.transition(
            &[AttemptState::Pending, AttemptState::TimedOut],
            AttemptState::Settled,
        )
    }

    pub fn resolve(&mut self) -> SpliceResult<()> {
        self.transition(&[AttemptState::Settled], AttemptState::Resolved)
    }

    fn transition(&mut self, from: &[AttemptState], to: AttemptState) -> SpliceResult<()> {
        if !from.contains(&self.state) {
            return Err(SpliceError::new(
                "nav.attempt.invalid_transition",
                format!("{} cannot move from {} to {to}", self.id, self.state),
            ));
        }
        self.state = to;
        Ok(())
    }
}
