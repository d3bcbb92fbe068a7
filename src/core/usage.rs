use chrono::{DateTime, Local, TimeDelta};

use crate::{
    core::window::Window,
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts, time::Hours},
};

pub type DeviceId = String;

/// One power-on session of a device.
///
/// At most one open session exists per device at any time. The store owning
/// the toggle operation is responsible for that invariant; the reconstructor
/// would double-count if it were violated.
#[derive(Clone, Debug)]
#[must_use]
pub struct UsageInterval {
    pub device_id: DeviceId,
    pub started_at: DateTime<Local>,
    pub state: IntervalState,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum IntervalState {
    /// The device is still on.
    Open,

    /// The session ended; duration and energy were fixed at close time using
    /// the wattage in effect during that session.
    Closed {
        duration: TimeDelta,
        energy: KilowattHours,
    },
}

impl UsageInterval {
    pub fn open(device_id: DeviceId, started_at: DateTime<Local>) -> Self {
        Self { device_id, started_at, state: IntervalState::Open }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, IntervalState::Open)
    }

    /// Close the session, fixing its duration and energy.
    ///
    /// This is the only mutation point for interval data. A session that
    /// ends before it starts is clamped to zero duration rather than
    /// rejected, to tolerate clock skew between event sources.
    pub fn close(&mut self, ended_at: DateTime<Local>, wattage: Watts) {
        if !self.is_open() {
            warn!(device_id = %self.device_id, "ignoring close of an already closed session");
            return;
        }
        let mut duration = ended_at - self.started_at;
        if duration < TimeDelta::zero() {
            warn!(
                device_id = %self.device_id,
                started_at = %self.started_at,
                ended_at = %ended_at,
                "session ends before it starts, clamping the duration to zero",
            );
            duration = TimeDelta::zero();
        }
        let energy = sanitize(wattage) * Hours::from(duration);
        self.state = IntervalState::Closed { duration, energy };
    }
}

/// Reconstruct the energy a single device consumed within the window.
///
/// Closed sessions that started within the window contribute the energy fixed
/// at close time. The open session, if any, is prorated from
/// `max(started_at, window.start)` up to `window.end` using the device's
/// *current* wattage. That means the open contribution drifts if the rating is
/// edited mid-session; closed sessions are immune since they carry close-time
/// energy.
///
/// Deterministic for a pinned `window.end`. Never negative.
pub fn accumulated_energy(
    wattage: Watts,
    intervals: &[UsageInterval],
    window: Window,
) -> KilowattHours {
    let wattage = sanitize(wattage);
    let mut total = KilowattHours::zero();
    for interval in intervals {
        match interval.state {
            IntervalState::Closed { energy, .. } => {
                if interval.started_at >= window.start && interval.started_at <= window.end {
                    total += energy;
                }
            }
            IntervalState::Open => {
                let effective_start = interval.started_at.max(window.start);
                let duration = (window.end - effective_start).max(TimeDelta::zero());
                total += wattage * Hours::from(duration);
            }
        }
    }
    total
}

/// Coerce a malformed rating to zero: the result feeds a user-facing
/// estimate, so availability wins over strict validation.
fn sanitize(wattage: Watts) -> Watts {
    if wattage.0.is_finite() && wattage.0 >= 0.0 {
        wattage
    } else {
        warn!(wattage = wattage.0, "malformed wattage, treating as zero");
        Watts::zero()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    fn closed(started_at: DateTime<Local>, ended_at: DateTime<Local>, wattage: Watts) -> UsageInterval {
        let mut interval = UsageInterval::open("heater".to_string(), started_at);
        interval.close(ended_at, wattage);
        interval
    }

    #[test]
    fn test_one_hour_at_one_kilowatt() {
        let intervals = [closed(at(8, 0), at(9, 0), Watts(1000.0))];
        let energy = accumulated_energy(Watts(1000.0), &intervals, Window::new(at(0, 0), at(12, 0)));
        assert_abs_diff_eq!(energy.0, 1.0);
    }

    #[test]
    fn test_open_session_clipped_to_window() {
        // Started 2 hours before the window end, but the window only covers the last hour.
        let intervals = [UsageInterval::open("fan".to_string(), at(10, 0))];
        let energy = accumulated_energy(Watts(500.0), &intervals, Window::new(at(11, 0), at(12, 0)));
        assert_abs_diff_eq!(energy.0, 0.5);
    }

    #[test]
    fn test_open_session_inside_window_is_not_clipped() {
        let intervals = [UsageInterval::open("fan".to_string(), at(11, 30))];
        let energy = accumulated_energy(Watts(500.0), &intervals, Window::new(at(10, 0), at(12, 0)));
        assert_abs_diff_eq!(energy.0, 0.25);
    }

    #[test]
    fn test_session_starting_after_window_end_contributes_nothing() {
        let closed_log = [closed(at(13, 0), at(14, 0), Watts(1000.0))];
        let open_log = [UsageInterval::open("fan".to_string(), at(13, 0))];
        let window = Window::new(at(8, 0), at(12, 0));
        assert_eq!(accumulated_energy(Watts(1000.0), &closed_log, window), KilowattHours::zero());
        assert_eq!(accumulated_energy(Watts(1000.0), &open_log, window), KilowattHours::zero());
    }

    #[test]
    fn test_closed_session_started_before_window_is_skipped() {
        // Closed sessions are attributed to the window their start falls into.
        let intervals = [closed(at(7, 0), at(9, 0), Watts(1000.0))];
        let energy = accumulated_energy(Watts(1000.0), &intervals, Window::new(at(8, 0), at(12, 0)));
        assert_eq!(energy, KilowattHours::zero());
    }

    #[test]
    fn test_no_intervals_means_zero() {
        assert_eq!(
            accumulated_energy(Watts(1000.0), &[], Window::new(at(0, 0), at(12, 0))),
            KilowattHours::zero(),
        );
    }

    #[test]
    fn test_close_clamps_clock_skew() {
        let mut interval = UsageInterval::open("heater".to_string(), at(9, 0));
        interval.close(at(8, 0), Watts(2000.0));
        assert_eq!(
            interval.state,
            IntervalState::Closed { duration: TimeDelta::zero(), energy: KilowattHours::zero() },
        );
    }

    #[test]
    fn test_close_is_the_single_mutation_point() {
        let mut interval = UsageInterval::open("heater".to_string(), at(8, 0));
        interval.close(at(9, 0), Watts(1000.0));
        let state = interval.state;
        // A second close must not retouch the fixed values.
        interval.close(at(11, 0), Watts(9000.0));
        assert_eq!(interval.state, state);
    }

    #[test]
    fn test_malformed_wattage_is_coerced_to_zero() {
        let intervals = [UsageInterval::open("fan".to_string(), at(10, 0))];
        let window = Window::new(at(10, 0), at(12, 0));
        assert_eq!(accumulated_energy(Watts(f64::NAN), &intervals, window), KilowattHours::zero());
        assert_eq!(accumulated_energy(Watts(-500.0), &intervals, window), KilowattHours::zero());
    }

    #[test]
    fn test_monotone_in_window_end() {
        let intervals = [
            closed(at(8, 0), at(9, 0), Watts(1000.0)),
            UsageInterval::open("fan".to_string(), at(10, 0)),
        ];
        let mut previous = KilowattHours::zero();
        for hour in 9..18 {
            let energy =
                accumulated_energy(Watts(750.0), &intervals, Window::new(at(7, 0), at(hour, 0)));
            assert!(energy >= previous, "energy must be non-decreasing in the window end");
            previous = energy;
        }
    }

    #[test]
    fn test_additive_over_adjacent_windows() {
        // Split only affects the open session: closed sessions are attributed
        // by their start, so pick a split point after the closed one started.
        let intervals = [
            closed(at(8, 30), at(9, 30), Watts(1200.0)),
            UsageInterval::open("fan".to_string(), at(8, 0)),
        ];
        let wattage = Watts(600.0);
        let whole = accumulated_energy(wattage, &intervals, Window::new(at(8, 0), at(12, 0)));
        let first = accumulated_energy(wattage, &intervals, Window::new(at(8, 0), at(10, 0)));
        let second = accumulated_energy(wattage, &intervals, Window::new(at(10, 0), at(12, 0)));
        assert_abs_diff_eq!(whole.0, (first + second).0, epsilon = 1e-9);
    }
}
