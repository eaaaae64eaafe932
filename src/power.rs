//! Reference-counted runtime power with deferred release.

use std::time::{Duration, Instant};

use crate::traits::{PowerControl, Result};

/// Counted power handle over a [`PowerControl`].
///
/// Dropping the last reference does not power the sensor down immediately; it
/// arms an idle deadline instead. [`RuntimePower::suspend_if_idle`] is the
/// idle-timeout callback that performs the power-down once the deadline has
/// passed without the reference being re-acquired.
#[derive(Debug)]
pub struct RuntimePower<P> {
    power: P,
    usage: u32,
    active: bool,
    autosuspend_delay: Duration,
    idle_deadline: Option<Instant>,
}

impl<P: PowerControl> RuntimePower<P> {
    /// Wrap a powered-off collaborator.
    pub const fn new(power: P, autosuspend_delay: Duration) -> Self {
        Self {
            power,
            usage: 0,
            active: false,
            autosuspend_delay,
            idle_deadline: None,
        }
    }

    /// Take a reference, powering up if needed. On failure no reference is held.
    pub fn resume_and_get(&mut self) -> Result<()> {
        if !self.active {
            if let Err(err) = self.power.power_on() {
                log::error!("Failed to power on sensor: {err}");
                return Err(err);
            }
            self.active = true;
        }
        self.usage += 1;
        self.idle_deadline = None;
        Ok(())
    }

    /// Take a reference only if already powered.
    pub fn get_if_active(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.usage += 1;
        true
    }

    /// Drop a reference; the last one arms the idle deadline.
    pub fn put_autosuspend(&mut self) {
        self.put_autosuspend_at(Instant::now());
    }

    /// As [`RuntimePower::put_autosuspend`], with the last-busy time supplied.
    pub fn put_autosuspend_at(&mut self, now: Instant) {
        if self.usage == 0 {
            log::warn!("Unbalanced runtime power release");
            return;
        }
        self.usage -= 1;
        if self.usage == 0 {
            self.idle_deadline = Some(now + self.autosuspend_delay);
        }
    }

    /// Idle-timeout callback: power down if unreferenced past the deadline.
    ///
    /// Returns whether the sensor was powered down.
    pub fn suspend_if_idle(&mut self, now: Instant) -> bool {
        let expired = self
            .idle_deadline
            .is_some_and(|deadline| now >= deadline);
        if !self.active || self.usage > 0 || !expired {
            return false;
        }

        self.idle_deadline = None;
        self.active = false;
        if let Err(err) = self.power.power_off() {
            log::warn!("Failed to power off sensor: {err}");
        }
        true
    }

    /// Power down regardless of references, e.g. on teardown or failed probe.
    pub fn force_off(&mut self) {
        self.usage = 0;
        self.idle_deadline = None;
        if self.active {
            self.active = false;
            if let Err(err) = self.power.power_off() {
                log::warn!("Failed to power off sensor: {err}");
            }
        }
    }

    /// Whether the sensor is currently powered.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Number of references currently held.
    pub const fn usage(&self) -> u32 {
        self.usage
    }

    /// When the sensor will power down if nothing re-acquires it.
    pub const fn idle_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    /// The wrapped collaborator.
    pub const fn inner(&self) -> &P {
        &self.power
    }

    /// Give back the wrapped collaborator.
    pub fn into_inner(self) -> P {
        self.power
    }
}
