/// Simulated frame clock driven by the host's `tick(dt)` calls.
#[derive(Debug, Clone, Copy)]
pub struct FrameTiming {
    frame_count: u64,
    time: f64,
    pub frame_dt: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            frame_count: 0,
            time: 0.0,
            frame_dt: 1.0 / 60.0,
        }
    }
}

impl FrameTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, dt: f64) {
        self.frame_dt = dt.max(0.0);
        self.time += self.frame_dt;
        self.frame_count = self.frame_count.saturating_add(1);
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn mark(&self) -> FrameMark {
        FrameMark {
            frame: self.frame_count,
            time: self.time,
        }
    }
}

/// Point in time recorded at a button press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMark {
    pub frame: u64,
    pub time: f64,
}

impl FrameMark {
    /// True when `now` is within `max_seconds` or one frame of the mark.
    pub fn is_click(&self, now: &FrameTiming, max_seconds: f64) -> bool {
        now.time - self.time <= max_seconds || now.frame_count - self.frame <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicks_are_short_or_single_frame() {
        let mut timing = FrameTiming::new();
        let mark = timing.mark();
        timing.update(1.0);
        assert!(mark.is_click(&timing, 0.25));
        timing.update(1.0);
        assert!(!mark.is_click(&timing, 0.25));

        let mark = timing.mark();
        for _ in 0..5 {
            timing.update(0.01);
        }
        assert!(mark.is_click(&timing, 0.25));
        assert_eq!(timing.frame_count(), 7);
    }
}
