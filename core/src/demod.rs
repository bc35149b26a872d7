/// Extremes at or beyond this share of block volume mean a carrier cycle
const ONE_RATIO: f64 = 0.7;
/// Trimmed extremes strictly inside this share of block volume mean silence
const ZERO_RATIO: f64 = 0.3;

/// Amplitude-threshold classifier for one block.
///
/// Built once per block from the block's local volume so loudness changes
/// across a long capture do not skew later blocks.
#[derive(Debug, Clone, Copy)]
pub struct CycleClassifier {
    volume: f64,
    trim: usize,
}

impl CycleClassifier {
    /// `cycle_length` is the nominal samples per bit window
    pub fn new(volume: i32, cycle_length: f64) -> Self {
        let trim = if cycle_length <= 2.0 {
            0
        } else if cycle_length <= 10.0 {
            1
        } else {
            (cycle_length * 0.1) as usize
        };
        Self {
            volume: volume as f64,
            trim,
        }
    }

    /// `Some(bit)`, or `None` when the cycle is neither clearly on nor off
    pub fn classify(&self, cycle: &[i32]) -> Option<bool> {
        let (max, min) = extremes(cycle);
        if max as f64 >= ONE_RATIO * self.volume || min as f64 <= -ONE_RATIO * self.volume {
            return Some(true);
        }

        let (max, min) = self.trimmed_extremes(cycle);
        if (max as f64) < ZERO_RATIO * self.volume && (min as f64) > -ZERO_RATIO * self.volume {
            return Some(false);
        }

        None
    }

    /// Extremes after dropping the transition-edge samples on both sides
    pub fn trimmed_extremes(&self, cycle: &[i32]) -> (i32, i32) {
        if self.trim > 0 && cycle.len() > 2 * self.trim {
            extremes(&cycle[self.trim..cycle.len() - self.trim])
        } else {
            extremes(cycle)
        }
    }
}

fn extremes(samples: &[i32]) -> (i32, i32) {
    let max = samples.iter().copied().max().unwrap_or(0);
    let min = samples.iter().copied().min().unwrap_or(0);
    (max, min)
}
