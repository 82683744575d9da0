//! Fixed-size running-average filter for raw temperature readings.

/// Circular buffer of the last `N` raw Celsius readings.
///
/// The buffer must be seeded with the sensor's first reading so the average
/// is not skewed toward zero; after seeding it always holds exactly `N`
/// valid samples. Older data is overwritten and unrecoverable, which bounds
/// both memory and the filter latency.
#[derive(Debug, Clone)]
pub struct RunningAverage<const N: usize> {
    samples: [f32; N],
    idx_latest: usize,
}

impl<const N: usize> RunningAverage<N> {
    pub const fn new() -> Self {
        Self {
            samples: [0.0; N],
            idx_latest: 0,
        }
    }

    /// Fill every slot with `value`, typically the first conversion result.
    pub fn seed(&mut self, value: f32) {
        self.samples = [value; N];
        self.idx_latest = 0;
    }

    /// Store `value` over the oldest slot and return the mean of all slots.
    pub fn update(&mut self, value: f32) -> f32 {
        let mut idx = self.idx_latest + 1;
        if idx >= N {
            idx = 0;
        }
        self.samples[idx] = value;
        self.idx_latest = idx;

        let sum: f32 = self.samples.iter().sum();
        sum / N as f32
    }
}

impl<const N: usize> Default for RunningAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_state_is_identity() {
        let mut filter: RunningAverage<30> = RunningAverage::new();
        filter.seed(21.5);
        for _ in 0..30 {
            assert_eq!(filter.update(21.5), 21.5);
        }
    }

    #[test]
    fn step_input_converges_over_n_updates() {
        let mut filter: RunningAverage<4> = RunningAverage::new();
        filter.seed(0.0);
        assert_eq!(filter.update(8.0), 2.0);
        assert_eq!(filter.update(8.0), 4.0);
        assert_eq!(filter.update(8.0), 6.0);
        assert_eq!(filter.update(8.0), 8.0);
        assert_eq!(filter.update(8.0), 8.0);
    }

    #[test]
    fn oldest_sample_is_overwritten() {
        let mut filter: RunningAverage<2> = RunningAverage::new();
        filter.seed(1.0);
        filter.update(3.0); // slots now [1, 3]
        assert_eq!(filter.update(5.0), 4.0); // slots now [5, 3]
    }
}
