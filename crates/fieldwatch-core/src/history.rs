//! Bounded, insertion-ordered history buffers

use crate::types::TelemetrySample;
use std::collections::VecDeque;

/// Cap used by the coherence validation charts.
pub const VALIDATION_HISTORY_CAP: usize = 100;

/// Slot count of the "active module" lists.
pub const ACTIVE_MODULE_SLOTS: usize = 5;

/// FIFO buffer that never holds more than `max_items` entries.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    max_items: usize,
}

pub type SampleHistory = BoundedHistory<TelemetrySample>;

impl<T: Clone> BoundedHistory<T> {
    pub fn new(max_items: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(max_items.min(VALIDATION_HISTORY_CAP)),
            max_items,
        }
    }

    /// Push to the back, evicting from the front until within the cap.
    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.max_items {
            self.items.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Oldest-first copy of the whole buffer.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }
}

impl SampleHistory {
    /// Values only, oldest first. Feeds sparklines.
    pub fn values(&self) -> Vec<f64> {
        self.items.iter().map(|s| s.value).collect()
    }

    /// Samples whose value moved at least `diff_threshold` from the previous
    /// sample. The first sample is always kept.
    pub fn significant(&self, diff_threshold: f64) -> Vec<TelemetrySample> {
        let mut out = Vec::new();
        let mut prev: Option<f64> = None;
        for sample in &self.items {
            let keep = match prev {
                None => true,
                Some(p) => (sample.value - p).abs() >= diff_threshold,
            };
            if keep {
                out.push(sample.clone());
            }
            prev = Some(sample.value);
        }
        out
    }
}
