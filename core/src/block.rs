use crate::demod::CycleClassifier;
use crate::error::{BlockKind, ModemError, Result};
use crate::framing::BlockSpec;
use crate::modulator::BitGrid;
use crate::sync::find_first_cycle;

/// Samples classified past the nominal block end, absorbing preamble jitter
const TAIL_SLACK: usize = 100;

/// One decoded protocol block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredBlock {
    /// Bits after the preamble and void zeros, up to the block's nominal width
    pub payload: Vec<bool>,
    /// Absolute sample index of the block's first carrier cycle
    pub start: usize,
    /// Absolute sample index where the following block begins
    pub next: usize,
    /// Ones actually counted before the first zero
    pub leading_ones: usize,
}

/// Generic per-block decoder: sync, classify, find the preamble, re-anchor
#[derive(Debug, Clone, Copy)]
pub struct BlockRecoverer {
    frequency: u32,
    frame_rate: u32,
    cycles_per_bit: u32,
}

impl BlockRecoverer {
    pub fn new(frequency: u32, frame_rate: u32, cycles_per_bit: u32) -> Self {
        Self {
            frequency,
            frame_rate,
            cycles_per_bit,
        }
    }

    /// Samples covered by `bits` bit windows, for sizing search windows
    pub fn bits_to_samples(&self, bits: usize) -> usize {
        BitGrid::new(self.frequency, self.frame_rate, self.cycles_per_bit).boundary(bits)
    }

    /// Decode the block of kind `block` starting somewhere in
    /// `samples[cursor..cursor + search_window]`.
    pub fn recover(
        &self,
        samples: &[i32],
        cursor: usize,
        spec: &BlockSpec,
        block: BlockKind,
        search_window: usize,
    ) -> Result<RecoveredBlock> {
        let remaining = samples.get(cursor..).unwrap_or(&[]);
        let grid = BitGrid::new(self.frequency, self.frame_rate, self.cycles_per_bit)
            .after_lead(spec.lead_bits);
        let samples_per_cycle = self.frame_rate as f64 / self.frequency as f64;

        let first = find_first_cycle(
            remaining,
            search_window,
            samples_per_cycle,
            grid.lead_fraction(),
        )
        .ok_or(ModemError::SyncLost {
            block,
            start: cursor,
            end: cursor + search_window.min(remaining.len()),
        })?;
        let start = cursor + first;

        let end = remaining
            .len()
            .min(first + grid.boundary(spec.total_bits) + TAIL_SLACK);
        let window = &remaining[first..end];

        let volume_span = window.len().min(grid.boundary(2 * spec.preamble_len));
        let volume = window[..volume_span]
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
            .min(i32::MAX as u32) as i32;
        if volume == 0 {
            return Err(ModemError::SyncLost {
                block,
                start,
                end: start + volume_span,
            });
        }
        log::trace!("{} block at sample {}, volume {}", block, start, volume);

        let classifier = CycleClassifier::new(volume, grid.samples_per_bit());
        let mut raw = Vec::new();
        let mut leading_ones: Option<usize> = None;
        loop {
            let i = raw.len();
            if let Some(ones) = leading_ones {
                if i >= spec.preamble_len.max(ones + spec.body_bits()) {
                    break;
                }
            }
            let (lo, hi) = (grid.boundary(i), grid.boundary(i + 1));
            if hi > window.len() {
                break;
            }

            let cycle = &window[lo..hi];
            let bit = classifier.classify(cycle).ok_or_else(|| {
                let (max, min) = classifier.trimmed_extremes(cycle);
                ModemError::AmbiguousCycle {
                    block,
                    start: start + lo,
                    end: start + hi,
                    max,
                    min,
                    volume,
                }
            })?;
            if !bit && leading_ones.is_none() {
                leading_ones = Some(i);
            }
            raw.push(bit);
        }

        let longest_run = longest_one_run(&raw[..raw.len().min(spec.preamble_len)]);
        if longest_run < spec.preamble_threshold {
            return Err(ModemError::BlockNotFound {
                block,
                start,
                end: start + window.len(),
                longest_run,
                threshold: spec.preamble_threshold,
            });
        }

        let ones = leading_ones.unwrap_or(raw.len());
        let expected = ones + spec.void_len + spec.field_bits;
        if raw.len() < expected {
            return Err(ModemError::TruncatedBlock {
                block,
                start,
                expected,
                found: raw.len(),
            });
        }

        let payload_start = ones + spec.void_len;
        let payload_end = raw.len().min(ones + spec.body_bits());
        let next = start + grid.boundary(ones + spec.body_bits());

        log::debug!(
            "{} block at sample {}: {} leading ones (nominal {}), next block at {}",
            block,
            start,
            ones,
            spec.preamble_len,
            next
        );

        Ok(RecoveredBlock {
            payload: raw[payload_start..payload_end].to_vec(),
            start,
            next,
            leading_ones: ones,
        })
    }
}

fn longest_one_run(bits: &[bool]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for &bit in bits {
        run = if bit { run + 1 } else { 0 };
        best = best.max(run);
    }
    best
}
