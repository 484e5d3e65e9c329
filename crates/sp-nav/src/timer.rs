//! Debounced loading affordance.

use crate::request::NavigationId;
use std::time::Duration;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedSlot {
    navigation: NavigationId,
    deadline: Instant,
}

/// Single-slot debounce timer.
///
/// Arming replaces whatever was armed before; cancellation only clears the slot when it
/// still belongs to the given navigation.
#[derive(Debug, Clone)]
pub struct LoadingTimer {
    delay: Duration,
    slot: Option<ArmedSlot>,
}

impl LoadingTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, slot: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms for `navigation`, returning the navigation whose timer was displaced, if any.
    pub fn arm(&mut self, navigation: NavigationId, now: Instant) -> Option<NavigationId> {
        let displaced = self.slot.map(|slot| slot.navigation);
        self.slot = Some(ArmedSlot {
            navigation,
            deadline: now + self.delay,
        });
        displaced
    }

    pub fn cancel(&mut self, navigation: NavigationId) -> bool {
        match self.slot {
            Some(slot) if slot.navigation == navigation => {
                self.slot = None;
                true
            }
            _ => false,
        }
    }

    /// Fires the armed timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<NavigationId> {
        let slot = self.slot?;
        if now < slot.deadline {
            return None;
        }
        self.slot = None;
        Some(slot.navigation)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.map(|slot| slot.deadline)
    }

    pub fn armed_for(&self) -> Option<NavigationId> {
        self.slot.map(|slot| slot.navigation)
    }
}
