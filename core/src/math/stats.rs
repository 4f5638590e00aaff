use std::collections::VecDeque;

/// Fixed-size window of the most recent samples.
///
/// Mean and deviation are recomputed over the whole window on every read.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingStats {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn mean(&self) -> f64 {
        let (front, back) = self.window.as_slices();
        if self.window.is_empty() {
            return 0.0;
        }
        (front.iter().sum::<f64>() + back.iter().sum::<f64>()) / self.window.len() as f64
    }

    pub fn stddev(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .window
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.window.len() as f64;
        var.sqrt()
    }
}
