//! Spring-damped animated values
//!
//! Every animated item property is a `{target, current}` pair: mutators move
//! the target synchronously, and the current value eases toward it once per
//! frame tick. The tick transition is pure (no wall clock), so animation is
//! deterministic and replayable in tests.

/// Default snap distance; current values this close to the target settle
pub const DEFAULT_SETTLE_EPSILON: f64 = 1e-4;

/// Outcome of one [`Spring::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpringStep {
    /// The current value moved during this tick
    pub changed: bool,
    /// This tick is the first on which the spring reached its target
    pub settled: bool,
}

/// A single animated scalar with exponential damping.
///
/// Each tick closes `1 - exp(-stiffness * elapsed)` of the remaining gap, so
/// the error decays geometrically and the value snaps exactly onto the
/// target once within epsilon; there is no residual oscillation.
#[derive(Debug, Clone)]
pub struct Spring {
    target: f64,
    current: f64,
    stiffness: f64,
    epsilon: f64,
}

impl Spring {
    pub fn new(value: f64, stiffness: f64) -> Self {
        Self {
            target: value,
            current: value,
            stiffness,
            epsilon: DEFAULT_SETTLE_EPSILON,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Target by default, eased current value when `current` is true
    pub fn value(&self, current: bool) -> f64 {
        if current {
            self.current
        } else {
            self.target
        }
    }

    /// Updates the target immediately; the current value is untouched
    pub fn set_target(&mut self, value: f64) {
        self.target = value;
    }

    /// Moves both target and current; used for non-animated placement
    pub fn jump_to(&mut self, value: f64) {
        self.target = value;
        self.current = value;
    }

    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() <= self.epsilon
    }

    /// Advances the current value by one frame of `elapsed` fractional time.
    ///
    /// `changed` is reported on every tick in which the value moved, and
    /// `settled` exactly once per approach, on the tick that reaches the
    /// target.
    pub fn tick(&mut self, elapsed: f64) -> SpringStep {
        if self.is_settled() {
            if self.current != self.target {
                // within epsilon from a prior set_target; snap silently
                self.current = self.target;
            }
            return SpringStep::default();
        }
        if elapsed <= 0.0 {
            return SpringStep::default();
        }

        let step = 1.0 - (-self.stiffness * elapsed).exp();
        self.current += (self.target - self.current) * step;

        if (self.current - self.target).abs() <= self.epsilon {
            self.current = self.target;
            SpringStep {
                changed: true,
                settled: true,
            }
        } else {
            SpringStep {
                changed: true,
                settled: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_and_settles_once() {
        let mut spring = Spring::new(0.0, 6.5);
        spring.set_target(10.0);

        let mut settle_count = 0;
        let mut ticks = 0;
        while !spring.is_settled() {
            let step = spring.tick(1.0);
            assert!(step.changed);
            if step.settled {
                settle_count += 1;
            }
            ticks += 1;
            assert!(ticks < 100, "spring failed to settle");
        }

        assert_eq!(spring.current(), 10.0);
        assert_eq!(settle_count, 1);

        // Further ticks are inert
        let step = spring.tick(1.0);
        assert!(!step.changed);
        assert!(!step.settled);
    }

    #[test]
    fn test_target_moves_current_does_not() {
        let mut spring = Spring::new(1.0, 6.5);
        spring.set_target(5.0);

        assert_eq!(spring.target(), 5.0);
        assert_eq!(spring.current(), 1.0);
        assert_eq!(spring.value(false), 5.0);
        assert_eq!(spring.value(true), 1.0);
    }

    #[test]
    fn test_retarget_mid_flight() {
        let mut spring = Spring::new(0.0, 6.5);
        spring.set_target(10.0);
        spring.tick(0.1);
        let mid = spring.current();
        assert!(mid > 0.0 && mid < 10.0);

        spring.set_target(-10.0);
        spring.tick(0.1);
        assert!(spring.current() < mid);
    }

    #[test]
    fn test_jump_to_settles_immediately() {
        let mut spring = Spring::new(0.0, 6.5);
        spring.jump_to(3.0);
        assert!(spring.is_settled());
        assert_eq!(spring.current(), 3.0);
        assert!(!spring.tick(1.0).changed);
    }

    #[test]
    fn test_stiffer_settles_faster() {
        let mut slow = Spring::new(0.0, 2.0);
        let mut fast = Spring::new(0.0, 100.0);
        slow.set_target(1.0);
        fast.set_target(1.0);

        let mut slow_ticks = 0;
        while !slow.is_settled() {
            slow.tick(0.5);
            slow_ticks += 1;
        }
        let mut fast_ticks = 0;
        while !fast.is_settled() {
            fast.tick(0.5);
            fast_ticks += 1;
        }

        assert!(fast_ticks < slow_ticks);
    }
}
