use crate::META_FREQUENCY;
use std::f64::consts::PI;

/// Full-scale amplitude of a rendered carrier cycle
pub const AMPLITUDE: f64 = 32767.0;

/// Exact bit-to-sample mapping for one block.
///
/// Bit `k` starts at `floor((offset + k * cycles_per_bit * frame_rate) / frequency)`,
/// so the fractional cycle length is carried in integers instead of drifting
/// through repeated float addition. `offset` is the sub-sample remainder of
/// any bits rendered ahead of bit 0 within the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitGrid {
    step: u64,
    frequency: u64,
    offset: u64,
}

impl BitGrid {
    pub fn new(frequency: u32, frame_rate: u32, cycles_per_bit: u32) -> Self {
        Self {
            step: cycles_per_bit as u64 * frame_rate as u64,
            frequency: frequency as u64,
            offset: 0,
        }
    }

    /// Grid for bits that follow `lead_bits` silent bits in the same block
    pub fn after_lead(self, lead_bits: usize) -> Self {
        Self {
            offset: (lead_bits as u64 * self.step) % self.frequency,
            ..self
        }
    }

    /// First sample of bit `k`
    pub fn boundary(&self, k: usize) -> usize {
        ((self.offset + k as u64 * self.step) / self.frequency) as usize
    }

    /// Samples needed to hold `bits` bits
    pub fn span(&self, bits: usize) -> usize {
        (self.offset + bits as u64 * self.step).div_ceil(self.frequency) as usize
    }

    /// Sub-sample position of bit 0 relative to the first sample of its window
    pub fn lead_fraction(&self) -> f64 {
        self.offset as f64 / self.frequency as f64
    }

    pub fn samples_per_bit(&self) -> f64 {
        self.step as f64 / self.frequency as f64
    }
}

/// On/off keyed single-carrier renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneModulator {
    frequency: u32,
    frame_rate: u32,
    grid: BitGrid,
}

impl ToneModulator {
    pub fn new(frequency: u32, frame_rate: u32, cycles_per_bit: u32) -> Self {
        Self {
            frequency,
            frame_rate,
            grid: BitGrid::new(frequency, frame_rate, cycles_per_bit),
        }
    }

    /// Meta blocks are always one cycle per bit at the fixed meta carrier
    pub fn meta(frame_rate: u32) -> Self {
        Self::new(META_FREQUENCY, frame_rate, 1)
    }

    pub fn grid(&self) -> BitGrid {
        self.grid
    }

    pub fn block_samples(&self, bits: usize) -> usize {
        self.grid.span(bits)
    }

    /// Render one block. The carrier starts at phase 0 on the block's first
    /// sample; every 0-bit window is silenced and the last bit's window runs
    /// to the end of the buffer.
    pub fn render(&self, bits: &[bool]) -> Vec<i16> {
        let len = self.block_samples(bits.len());
        let frequency = self.frequency as f64;
        let frame_rate = self.frame_rate as f64;

        let mut samples: Vec<i16> = (0..len)
            .map(|x| (AMPLITUDE * (2.0 * PI * frequency * (x as f64 / frame_rate)).sin()) as i16)
            .collect();

        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                continue;
            }
            let start = self.grid.boundary(i);
            let end = if i + 1 == bits.len() {
                len
            } else {
                self.grid.boundary(i + 1)
            };
            samples[start..end].fill(0);
        }

        samples
    }

    /// Render blocks back to back, each with its own phase origin
    pub fn render_blocks<'a, I>(&self, blocks: I) -> Vec<i16>
    where
        I: IntoIterator<Item = &'a [bool]>,
    {
        let mut samples = Vec::new();
        for block in blocks {
            samples.extend(self.render(block));
        }
        samples
    }
}
