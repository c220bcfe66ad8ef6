/// Coherence metrics: bounded scalars advanced once per completed step.
///
/// The update is a fixed recurrence. It does not look at prompt or
/// response content.
use serde::{Deserialize, Serialize};

/// Energy mass term fed to the stability band.
pub const ENERGY_MASS: f64 = 1.0;

/// Floor for `tension_capacity`.
pub const MIN_TENSION: f64 = 0.1;

/// Starting `tension_capacity` for a fresh session.
pub const INITIAL_TENSION: f64 = 100.0;

/// Tension spent per step.
pub const TENSION_STEP: f64 = 5.0;

/// Snapshot of the coherence axes after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricState {
    /// S(r): agreement between behaviour and phase.
    pub signal_alignment: f64,
    /// F(r): ability to integrate contradiction.
    pub feedback_responsiveness: f64,
    /// B(r): identity consistency.
    pub bounded_integrity: f64,
    /// τ(r): contradiction buffer, spent down each step.
    pub tension_capacity: f64,
    pub phase_vector: [f64; 4],
    /// Change in coherence relative to the previous snapshot.
    pub coherence_motion: f64,
    /// Tolerated rate of coherence change.
    pub stability_band: f64,
}

impl Default for MetricState {
    fn default() -> Self {
        let mut state = Self {
            signal_alignment: 1.0,
            feedback_responsiveness: 1.0,
            bounded_integrity: 1.0,
            tension_capacity: INITIAL_TENSION,
            phase_vector: [1.0, 0.0, 0.0, 0.0],
            coherence_motion: 0.0,
            stability_band: 0.0,
        };
        state.stability_band = stability_band(
            state.tension_capacity,
            state.feedback_responsiveness,
            state.bounded_integrity,
            ENERGY_MASS,
        );
        state
    }
}

impl MetricState {
    /// Φ'(r) = S · F · B · τ
    pub fn coherence(&self) -> f64 {
        self.signal_alignment
            * self.feedback_responsiveness
            * self.bounded_integrity
            * self.tension_capacity
    }

    /// Produce the snapshot that follows `prev`.
    ///
    /// The first step of a session has no predecessor and yields the
    /// defaults, so its coherence motion is zero.
    pub fn tick(prev: Option<&MetricState>) -> MetricState {
        let Some(prev) = prev else {
            return MetricState::default();
        };

        let signal_alignment = (prev.signal_alignment * 0.95 + 0.03).min(1.0);
        let feedback_responsiveness = (prev.feedback_responsiveness * 0.97 + 0.02).min(1.0);
        let bounded_integrity = (prev.bounded_integrity * 0.98 + 0.01).min(1.0);
        let tension_capacity = (prev.tension_capacity - TENSION_STEP).max(MIN_TENSION);

        let mut next = MetricState {
            signal_alignment,
            feedback_responsiveness,
            bounded_integrity,
            tension_capacity,
            phase_vector: prev.phase_vector,
            coherence_motion: 0.0,
            stability_band: stability_band(
                tension_capacity,
                feedback_responsiveness,
                bounded_integrity,
                ENERGY_MASS,
            ),
        };
        next.coherence_motion = next.coherence() - prev.coherence();
        next
    }

    /// Stable while coherence moves no faster than `band / τ`.
    pub fn is_stable(&self) -> bool {
        let v_max = self.stability_band / self.tension_capacity;
        self.coherence_motion.abs() <= v_max
    }
}

/// B_β = sqrt(F · B) · τ / (τ + m)
///
/// Increases with tension, responsiveness and integrity; decreases with
/// energy mass. Stays within [0, 1) for inputs in their valid ranges.
pub fn stability_band(
    tension_capacity: f64,
    feedback_responsiveness: f64,
    bounded_integrity: f64,
    energy_mass: f64,
) -> f64 {
    let axes = (feedback_responsiveness * bounded_integrity).max(0.0).sqrt();
    let headroom = tension_capacity / (tension_capacity + energy_mass);
    axes * headroom
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(steps: usize) -> Vec<MetricState> {
        let mut out: Vec<MetricState> = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = MetricState::tick(out.last());
            out.push(next);
        }
        out
    }

    #[test]
    fn first_tick_is_default_with_zero_motion() {
        let first = MetricState::tick(None);
        assert_eq!(first, MetricState::default());
        assert_eq!(first.coherence_motion, 0.0);
        assert!((first.coherence() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn second_tick_matches_recurrence() {
        let states = run(2);
        let s = &states[1];
        assert!((s.signal_alignment - 0.98).abs() < 1e-12);
        assert!((s.feedback_responsiveness - 0.99).abs() < 1e-12);
        assert!((s.bounded_integrity - 0.99).abs() < 1e-12);
        assert!((s.tension_capacity - 95.0).abs() < 1e-12);

        let expected = 0.98 * 0.99 * 0.99 * 95.0;
        assert!((s.coherence() - expected).abs() < 1e-9);
        assert!((s.coherence_motion - (expected - 100.0)).abs() < 1e-9);
    }

    #[test]
    fn tension_floors() {
        let states = run(40);
        assert!((states[39].tension_capacity - MIN_TENSION).abs() < 1e-12);
        assert!(states.iter().all(|s| s.tension_capacity >= MIN_TENSION));
    }

    #[test]
    fn default_band_value() {
        let s = MetricState::default();
        assert!((s.stability_band - 100.0 / 101.0).abs() < 1e-12);
        assert!(s.is_stable());
    }

    #[test]
    fn large_motion_is_unstable() {
        let states = run(2);
        // Coherence drops by roughly 8.8 against a tolerance near 0.01.
        assert!(!states[1].is_stable());
    }

    #[test]
    fn stability_band_is_monotone() {
        let base = stability_band(50.0, 0.9, 0.9, ENERGY_MASS);
        assert!(stability_band(60.0, 0.9, 0.9, ENERGY_MASS) > base);
        assert!(stability_band(50.0, 0.95, 0.9, ENERGY_MASS) > base);
        assert!(stability_band(50.0, 0.9, 0.95, ENERGY_MASS) > base);
        assert!(stability_band(50.0, 0.9, 0.9, 2.0) < base);
    }

    proptest! {
        #[test]
        fn tension_never_increases(steps in 1usize..60) {
            let states = run(steps);
            for pair in states.windows(2) {
                prop_assert!(pair[1].tension_capacity <= pair[0].tension_capacity);
                prop_assert!(pair[1].tension_capacity >= MIN_TENSION);
            }
        }

        #[test]
        fn bounded_axes_stay_in_range(steps in 1usize..200) {
            let states = run(steps);
            for s in &states {
                prop_assert!(s.signal_alignment <= 1.0 && s.signal_alignment >= 0.6 - 1e-9);
                prop_assert!(s.feedback_responsiveness <= 1.0 && s.feedback_responsiveness >= 2.0 / 3.0 - 1e-9);
                prop_assert!(s.bounded_integrity <= 1.0 && s.bounded_integrity >= 0.5 - 1e-9);
            }
            for pair in states.windows(2) {
                prop_assert!(pair[1].signal_alignment <= pair[0].signal_alignment);
                prop_assert!(pair[1].feedback_responsiveness <= pair[0].feedback_responsiveness);
                prop_assert!(pair[1].bounded_integrity <= pair[0].bounded_integrity);
            }
        }

        #[test]
        fn recurrence_from_arbitrary_state_is_capped(
            s in 0.0f64..1.0, f in 0.0f64..1.0, b in 0.0f64..1.0, t in 0.1f64..100.0
        ) {
            let prev = MetricState {
                signal_alignment: s,
                feedback_responsiveness: f,
                bounded_integrity: b,
                tension_capacity: t,
                ..MetricState::default()
            };
            let next = MetricState::tick(Some(&prev));
            prop_assert!(next.signal_alignment <= 1.0);
            prop_assert!(next.feedback_responsiveness <= 1.0);
            prop_assert!(next.bounded_integrity <= 1.0);
            prop_assert!(next.tension_capacity >= MIN_TENSION);
            prop_assert!((next.coherence_motion - (next.coherence() - prev.coherence())).abs() < 1e-9);
        }
    }
}
