//! Cooperative per-frame task primitives.
//!
//! Every long-running behaviour in the crate is a small state machine owned
//! by its controller and stepped once per frame with the elapsed time. This
//! module holds the shared pieces: the step result, eased intervals, and
//! one-shot timers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Continue,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendType {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl BlendType {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            BlendType::Linear => t,
            BlendType::EaseIn => {
                let t2 = t * t;
                ((3.0 * t2) - (t2 * t)) * 0.5
            }
            BlendType::EaseOut => {
                let t2 = t * t;
                ((3.0 * t) - (t2 * t)) * 0.5
            }
            BlendType::EaseInOut => {
                let t2 = t * t;
                (3.0 * t2) - (2.0 * t * t2)
            }
        }
    }
}

/// Time-driven progress from 0 to 1 over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    duration: f64,
    elapsed: f64,
    blend: BlendType,
}

impl Interval {
    pub fn new(duration: f64, blend: BlendType) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
            blend,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Advances the clock and returns the blended fraction.
    pub fn step(&mut self, dt: f64) -> f64 {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        self.fraction()
    }

    pub fn fraction(&self) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        self.blend.apply(self.elapsed / self.duration)
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// One-shot countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    remaining: f64,
}

impl Timer {
    pub fn new(seconds: f64) -> Self {
        Self {
            remaining: seconds.max(0.0),
        }
    }

    /// Returns `Done` on the frame the countdown expires.
    pub fn advance(&mut self, dt: f64) -> TaskStatus {
        self.remaining -= dt.max(0.0);
        if self.remaining <= 0.0 {
            TaskStatus::Done
        } else {
            TaskStatus::Continue
        }
    }

    pub fn remaining(&self) -> f64 {
        self.remaining.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{BlendType, Interval, TaskStatus, Timer};

    #[test]
    fn blend_endpoints() {
        for blend in [
            BlendType::Linear,
            BlendType::EaseIn,
            BlendType::EaseOut,
            BlendType::EaseInOut,
        ] {
            assert!(blend.apply(0.0).abs() < 1e-12);
            assert!((blend.apply(1.0) - 1.0).abs() < 1e-12);
        }
        assert!((BlendType::EaseInOut.apply(0.5) - 0.5).abs() < 1e-12);
        assert!(BlendType::EaseInOut.apply(0.1) < 0.1);
    }

    #[test]
    fn interval_clamps_at_duration() {
        let mut interval = Interval::new(1.2, BlendType::EaseInOut);
        assert!(!interval.is_finished());
        interval.step(0.6);
        assert!((interval.fraction() - 0.5).abs() < 1e-12);
        let f = interval.step(5.0);
        assert_eq!(f, 1.0);
        assert!(interval.is_finished());
        assert_eq!(interval.elapsed(), 1.2);
    }

    #[test]
    fn zero_duration_interval_is_immediately_done() {
        let mut interval = Interval::new(0.0, BlendType::Linear);
        assert_eq!(interval.step(0.0), 1.0);
        assert!(interval.is_finished());
    }

    #[test]
    fn timer_fires_once_expired() {
        let mut timer = Timer::new(0.65);
        assert_eq!(timer.advance(0.5), TaskStatus::Continue);
        assert!((timer.remaining() - 0.15).abs() < 1e-12);
        assert_eq!(timer.advance(0.2), TaskStatus::Done);
    }
}
