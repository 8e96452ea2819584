use std::collections::VecDeque;

pub const DEFAULT_REWARD_HISTORY: usize = 100;

/// Bounded history of undiscounted episode returns. Once full, the oldest entries are dropped.
#[derive(Debug, Clone)]
pub struct RewardHistory {
    returns: VecDeque<f32>,
    capacity: usize,
}

impl Default for RewardHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REWARD_HISTORY)
    }
}

impl RewardHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            returns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.capacity == 0 {
            return;
        }
        if self.returns.len() == self.capacity {
            self.returns.pop_front();
        }
        self.returns.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn mean(&self) -> Option<f32> {
        if self.returns.is_empty() {
            return None;
        }
        Some(self.returns.iter().sum::<f32>() / self.returns.len() as f32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.returns.iter()
    }
}

impl Extend<f32> for RewardHistory {
    fn extend<I: IntoIterator<Item = f32>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}
