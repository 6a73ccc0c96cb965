//! Exponential moving averages with a cumulative warm-up.
//!
//! The k-th of the first `window` values is weighted 1/k, so the average is
//! the exact mean of everything seen so far. From then on every value is
//! weighted 1/window.

/// Floating-point average.
#[derive(Debug, Clone)]
pub(crate) struct MovingAverage {
    value: f64,
    initial: f64,
    count: u32,
    window: u32,
}

impl MovingAverage {
    pub(crate) fn new(window: u32, initial: f64) -> Self {
        Self {
            value: initial,
            initial,
            count: 0,
            window: window.max(1),
        }
    }

    pub(crate) fn feed(&mut self, x: f64) {
        if self.count < self.window {
            self.count += 1;
        }
        self.value += (x - self.value) / f64::from(self.count);
    }

    pub(crate) fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.initial;
        self.count = 0;
    }
}

/// Fixed-point average over Q-format integers.
#[derive(Debug, Clone)]
pub(crate) struct FixedMovingAverage {
    value: i64,
    initial: i64,
    count: u32,
    window: u32,
}

impl FixedMovingAverage {
    pub(crate) fn new(window: u32, initial: i64) -> Self {
        Self {
            value: initial,
            initial,
            count: 0,
            window: window.max(1),
        }
    }

    pub(crate) fn feed(&mut self, x: i64) {
        if self.count < self.window {
            self.count += 1;
        }
        self.value += (x - self.value) / i64::from(self.count);
    }

    pub(crate) fn value(&self) -> i64 {
        self.value
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.initial;
        self.count = 0;
    }
}
