use std::num::NonZeroU8;

/// A debounce filter that counts consecutive identical samples.
///
/// A value is reported once, on the sample that makes it the same for `threshold` samples in a row.
/// It is not reported again until a different sample has broken the run.
#[derive(Clone, Debug)]
pub struct CountedDebounce<T> {
    candidate: Option<T>,
    count: u8,
    threshold: NonZeroU8,
}

impl<T: Copy + PartialEq> CountedDebounce<T> {
    pub const fn new(threshold: NonZeroU8) -> Self {
        Self {
            candidate: None,
            count: 0,
            threshold,
        }
    }

    pub fn threshold(&self) -> NonZeroU8 {
        self.threshold
    }

    /// Gets the value of the current run, if any sample was fed since the last reset.
    pub fn candidate(&self) -> Option<T> {
        self.candidate
    }

    /// Gets the length of the current run, saturated at the threshold.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Gets the value of the current run once it has become stable.
    pub fn stable(&self) -> Option<T> {
        self.candidate.filter(|_| self.count >= self.threshold.get())
    }

    /// Feeds a sample. Returns it when its run has just reached the threshold.
    pub fn update(&mut self, sample: T) -> Option<T> {
        if self.candidate != Some(sample) {
            self.candidate = Some(sample);
            self.count = 1;
        } else if self.count < self.threshold.get() {
            self.count += 1;
        } else {
            return None;
        }

        (self.count == self.threshold.get()).then_some(sample)
    }

    pub fn reset(&mut self) {
        self.candidate = None;
        self.count = 0;
    }
}
