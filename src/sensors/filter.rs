//! Fixed-window moving average.
//!
//! A ring of the last `N` raw samples plus a running sum.  The sum is kept
//! in `f64` so adding and removing `f32` samples stays exact for any
//! realistic sensor range, and it is rebuilt from the ring on every wrap so
//! nothing can drift over long uptimes.

#[derive(Debug, Clone)]
pub struct MovingAverage<const N: usize> {
    samples: [f32; N],
    /// Next slot to overwrite.
    head: usize,
    /// Number of valid samples (saturates at `N`).
    len: usize,
    sum: f64,
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MovingAverage<N> {
    pub const fn new() -> Self {
        Self {
            samples: [0.0; N],
            head: 0,
            len: 0,
            sum: 0.0,
        }
    }

    /// Push a sample and return the average of the current window.
    pub fn push(&mut self, value: f32) -> f32 {
        if self.len == N {
            self.sum -= f64::from(self.samples[self.head]);
        } else {
            self.len += 1;
        }
        self.samples[self.head] = value;
        self.sum += f64::from(value);

        self.head += 1;
        if self.head == N {
            self.head = 0;
            self.sum = self.samples[..self.len].iter().map(|&s| f64::from(s)).sum();
        }
        self.average().unwrap_or(value)
    }

    /// Average of the samples held, or `None` before the first push.
    pub fn average(&self) -> Option<f32> {
        if self.len == 0 {
            None
        } else {
            Some((self.sum / self.len as f64) as f32)
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
