//! Backoff delay computation with optional jitter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::BackoffKind;

/// Floor applied to jittered delays, in seconds.
pub const MIN_JITTERED_DELAY_SECS: f64 = 0.1;

/// Caller-supplied delay function: attempt number → delay in seconds.
pub type DelayFn = Arc<dyn Fn(u32) -> f64 + Send + Sync>;

/// How the delay grows with the attempt number.
#[derive(Clone)]
pub enum BackoffStrategy {
    /// `base`
    Fixed,
    /// `base * attempt`
    Linear,
    /// `base * exponential_base^(attempt - 1)`
    Exponential,
    /// `base * fib(attempt)` with fib(1) = fib(2) = 1
    Fibonacci,
    /// Arbitrary pure function of the attempt number.
    Custom(DelayFn),
}

impl fmt::Debug for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffStrategy::Fixed => f.write_str("Fixed"),
            BackoffStrategy::Linear => f.write_str("Linear"),
            BackoffStrategy::Exponential => f.write_str("Exponential"),
            BackoffStrategy::Fibonacci => f.write_str("Fibonacci"),
            BackoffStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<BackoffKind> for BackoffStrategy {
    fn from(kind: BackoffKind) -> Self {
        match kind {
            BackoffKind::Fixed => BackoffStrategy::Fixed,
            BackoffKind::Linear => BackoffStrategy::Linear,
            BackoffKind::Exponential => BackoffStrategy::Exponential,
            BackoffKind::Fibonacci => BackoffStrategy::Fibonacci,
        }
    }
}

/// Parameters of the delay curve.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub strategy: BackoffStrategy,
    /// Seconds.
    pub base_delay: f64,
    /// Seconds.
    pub max_delay: f64,
    pub exponential_base: f64,
    pub jitter: bool,
    /// Fraction of the delay used as the jitter amplitude.
    pub jitter_range: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
            jitter: true,
            jitter_range: 0.1,
        }
    }
}

impl Backoff {
    /// Raw delay in seconds before clamping and jitter.
    fn raw_delay(&self, attempt: u32) -> f64 {
        let attempt = attempt.max(1);
        match &self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay * attempt as f64,
            BackoffStrategy::Exponential => {
                let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
                self.base_delay * self.exponential_base.powi(exponent)
            }
            BackoffStrategy::Fibonacci => self.base_delay * fibonacci(attempt),
            BackoffStrategy::Custom(f) => f(attempt),
        }
    }

    /// Delay to sleep before the retry that follows `attempt`.
    ///
    /// Clamped to `[0, max_delay]`; with jitter enabled the result is
    /// perturbed by up to `±delay * jitter_range` and kept within
    /// `[0.1, max_delay]`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let max_delay = self.max_delay.max(0.0);
        let raw = self.raw_delay(attempt);
        let mut delay = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, max_delay) };

        if self.jitter {
            let amplitude = delay * self.jitter_range.clamp(0.0, 1.0);
            let offset = if amplitude > 0.0 {
                rand::thread_rng().gen_range(-amplitude..=amplitude)
            } else {
                0.0
            };
            delay = (delay + offset).max(MIN_JITTERED_DELAY_SECS).min(max_delay);
        }

        Duration::try_from_secs_f64(delay).unwrap_or(Duration::ZERO)
    }
}

/// fib(1) = fib(2) = 1, saturating into f64 range for large attempts.
fn fibonacci(n: u32) -> f64 {
    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    for _ in 2..n {
        let next = a + b;
        a = b;
        b = next;
        if b.is_infinite() {
            break;
        }
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(strategy: BackoffStrategy) -> Backoff {
        Backoff {
            strategy,
            base_delay: 0.5,
            max_delay: 10.0,
            exponential_base: 2.0,
            jitter: false,
            jitter_range: 0.1,
        }
    }

    fn secs(b: &Backoff, attempt: u32) -> f64 {
        b.calculate_delay(attempt).as_secs_f64()
    }

    #[test]
    fn test_fixed_and_linear() {
        let fixed = backoff(BackoffStrategy::Fixed);
        assert_eq!(secs(&fixed, 1), 0.5);
        assert_eq!(secs(&fixed, 7), 0.5);

        let linear = backoff(BackoffStrategy::Linear);
        assert_eq!(secs(&linear, 1), 0.5);
        assert_eq!(secs(&linear, 4), 2.0);
    }

    #[test]
    fn test_exponential() {
        let b = backoff(BackoffStrategy::Exponential);
        assert_eq!(secs(&b, 1), 0.5);
        assert_eq!(secs(&b, 2), 1.0);
        assert_eq!(secs(&b, 3), 2.0);
        // 0.5 * 2^9 = 256, clamped
        assert_eq!(secs(&b, 10), 10.0);
        assert_eq!(secs(&b, u32::MAX), 10.0);
    }

    #[test]
    fn test_fibonacci() {
        let b = backoff(BackoffStrategy::Fibonacci);
        let delays: Vec<f64> = (1..=6).map(|n| secs(&b, n)).collect();
        assert_eq!(delays, vec![0.5, 0.5, 1.0, 1.5, 2.5, 4.0]);
        assert_eq!(secs(&b, 2000), 10.0);
    }

    #[test]
    fn test_custom() {
        let b = backoff(BackoffStrategy::Custom(Arc::new(|attempt| attempt as f64 * 0.25)));
        assert_eq!(secs(&b, 2), 0.5);
        assert_eq!(secs(&b, 1000), 10.0);

        let negative = backoff(BackoffStrategy::Custom(Arc::new(|_| -3.0)));
        assert_eq!(secs(&negative, 1), 0.0);
    }

    #[test]
    fn test_monotonic_without_jitter() {
        for strategy in [
            BackoffStrategy::Fixed,
            BackoffStrategy::Linear,
            BackoffStrategy::Exponential,
            BackoffStrategy::Fibonacci,
        ] {
            let b = backoff(strategy);
            let mut previous = 0.0;
            for attempt in 1..=40 {
                let delay = secs(&b, attempt);
                assert!(delay >= previous, "{:?} decreased at {}", b.strategy, attempt);
                assert!((0.0..=10.0).contains(&delay));
                previous = delay;
            }
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let mut b = backoff(BackoffStrategy::Exponential);
        b.jitter = true;
        b.jitter_range = 0.5;
        for attempt in 1..=12 {
            for _ in 0..50 {
                let delay = secs(&b, attempt);
                assert!(delay >= MIN_JITTERED_DELAY_SECS);
                assert!(delay <= 10.0);
            }
        }

        // 0.5s ± 50% stays inside [0.25, 0.75]
        for _ in 0..100 {
            let delay = secs(&b, 1);
            assert!((0.25..=0.75).contains(&delay), "delay {}", delay);
        }
    }

    #[test]
    fn test_jitter_floor() {
        let b = Backoff {
            strategy: BackoffStrategy::Fixed,
            base_delay: 0.01,
            max_delay: 1.0,
            exponential_base: 2.0,
            jitter: true,
            jitter_range: 0.1,
        };
        assert_eq!(secs(&b, 1), MIN_JITTERED_DELAY_SECS);
    }
}
