use crate::error::{ModemError, Result};
use crate::framing::{CHANNEL_SYNC_BITS, CHUNK_FRAMING_BITS, HEADER_BITS, META_BITS};
use crate::modulator::ToneModulator;

/// How rendered blocks are laid out across output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// Meta, header and every chunk on one channel
    #[default]
    Mono,
    /// Meta, header and a share of chunks on the left channel; a sync marker
    /// and the remaining chunks on the right
    Stereo,
}

impl ChannelLayout {
    pub fn from_channels(channels: u16) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayout::Mono),
            2 => Ok(ChannelLayout::Stereo),
            n => Err(ModemError::InvalidConfig(format!(
                "channel count must be 1 or 2, got {}",
                n
            ))),
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Chunk distribution between the two channels of a stereo stream.
///
/// Slots are measured in rendered chunk lengths: each channel's fixed
/// overhead is rounded up to whole slots, then chunks are moved from left to
/// right until the longer channel needs as few slots as possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplit {
    pub left: usize,
    pub right: usize,
    pub left_slots: usize,
    pub right_slots: usize,
}

impl ChunkSplit {
    pub fn plan(
        frame_rate: u32,
        frequency: u32,
        cycles_per_bit: u32,
        chunk_bit_size: usize,
        chunk_count: usize,
    ) -> Self {
        let carrier = ToneModulator::new(frequency, frame_rate, cycles_per_bit);
        let left_overhead = ToneModulator::meta(frame_rate).block_samples(META_BITS)
            + carrier.block_samples(HEADER_BITS);
        let right_overhead = carrier.block_samples(CHANNEL_SYNC_BITS);
        let slot = carrier.block_samples(chunk_bit_size + CHUNK_FRAMING_BITS).max(1);

        let a = left_overhead.div_ceil(slot) as i64;
        let b = right_overhead.div_ceil(slot) as i64;
        let n = chunk_count as i64;

        // ceil((b + n - a) / 2), also for negative numerators
        let balanced = -(-(b + n - a)).div_euclid(2);
        let left = balanced.clamp(0, n) as usize;
        let right = chunk_count - left;

        Self {
            left,
            right,
            left_slots: a as usize + left,
            right_slots: b as usize + right,
        }
    }

    /// Everything on the left channel
    pub fn mono(chunk_count: usize) -> Self {
        Self {
            left: chunk_count,
            right: 0,
            left_slots: chunk_count,
            right_slots: 0,
        }
    }
}

/// Pad every channel with trailing silence to the longest one
pub fn pad_to_equal<T: Copy + Default>(channels: &mut [Vec<T>]) {
    let len = channels.iter().map(Vec::len).max().unwrap_or(0);
    for channel in channels.iter_mut() {
        channel.resize(len, T::default());
    }
}

/// Frame-interleave equally sized channels
pub fn interleave<T: Copy>(channels: &[Vec<T>]) -> Vec<T> {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut samples = Vec::with_capacity(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            samples.push(channel[frame]);
        }
    }
    samples
}

/// Split interleaved frames into per-channel buffers; a partial trailing frame is dropped
pub fn deinterleave<T: Copy>(samples: &[T], channel_count: usize) -> Vec<Vec<T>> {
    if channel_count == 0 {
        return Vec::new();
    }

    let mut channels: Vec<Vec<T>> = (0..channel_count)
        .map(|_| Vec::with_capacity(samples.len() / channel_count))
        .collect();
    for frame in samples.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    channels
}
