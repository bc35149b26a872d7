use crate::bits::bytes_to_bits;
use crate::channel::{interleave, pad_to_equal, ChannelLayout, ChunkSplit};
use crate::error::{ModemError, Result};
use crate::framing::{channel_sync_bits, chunk_blocks, HeaderBlock, MetaBlock};
use crate::modulator::ToneModulator;
use crate::{
    DEFAULT_CHUNK_BIT_SIZE, DEFAULT_FRAME_RATE, DEFAULT_FREQUENCY, MAX_CYCLES_PER_BIT,
    MAX_FRAME_RATE, MAX_FREQUENCY, MIN_CYCLES_PER_BIT, MIN_FRAME_RATE, MIN_FREQUENCY,
    MIN_SAMPLES_PER_CYCLE,
};

/// Encode-side stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemConfig {
    /// Payload carrier in Hz
    pub frequency: u32,
    /// Output sample rate in Hz
    pub frame_rate: u32,
    /// Payload bits per chunk
    pub chunk_bit_size: u32,
    pub cycles_per_bit: u32,
    pub layout: ChannelLayout,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            frame_rate: DEFAULT_FRAME_RATE,
            chunk_bit_size: DEFAULT_CHUNK_BIT_SIZE,
            cycles_per_bit: 1,
            layout: ChannelLayout::Mono,
        }
    }
}

impl ModemConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&self.frequency) {
            return Err(ModemError::InvalidConfig(format!(
                "frequency {} Hz outside [{}, {}]",
                self.frequency, MIN_FREQUENCY, MAX_FREQUENCY
            )));
        }
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&self.frame_rate) {
            return Err(ModemError::InvalidConfig(format!(
                "frame rate {} Hz outside [{}, {}]",
                self.frame_rate, MIN_FRAME_RATE, MAX_FRAME_RATE
            )));
        }
        if self.frequency as u64 * MIN_SAMPLES_PER_CYCLE as u64 > self.frame_rate as u64 {
            return Err(ModemError::InvalidConfig(format!(
                "frequency {} Hz needs a frame rate of at least {} Hz, got {}",
                self.frequency,
                self.frequency as u64 * MIN_SAMPLES_PER_CYCLE as u64,
                self.frame_rate
            )));
        }
        if !(MIN_CYCLES_PER_BIT..=MAX_CYCLES_PER_BIT).contains(&self.cycles_per_bit) {
            return Err(ModemError::InvalidConfig(format!(
                "cycles per bit {} outside [{}, {}]",
                self.cycles_per_bit, MIN_CYCLES_PER_BIT, MAX_CYCLES_PER_BIT
            )));
        }
        if self.chunk_bit_size == 0 {
            return Err(ModemError::InvalidConfig(
                "chunk bit size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Samples per bit window of the payload carrier
    pub fn samples_per_bit(&self) -> f64 {
        self.cycles_per_bit as f64 * self.frame_rate as f64 / self.frequency as f64
    }
}

/// Rendered stream: one equally long 16-bit PCM buffer per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub frame_rate: u32,
    pub channels: Vec<Vec<i16>>,
}

impl EncodedAudio {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Frame-interleaved samples as stored in a PCM container
    pub fn interleaved(&self) -> Vec<i16> {
        interleave(&self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.frame_rate as f64
    }
}

pub struct Encoder {
    config: ModemConfig,
}

impl Encoder {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Encode binary data into audio samples
    /// Returns: meta + header + chunks, on one channel or split across two
    pub fn encode(&self, data: &[u8]) -> Result<EncodedAudio> {
        let config = &self.config;
        let frequency = u16::try_from(config.frequency).map_err(|_| {
            ModemError::InvalidConfig(format!(
                "frequency {} Hz does not fit the meta block",
                config.frequency
            ))
        })?;

        let header = HeaderBlock::for_payload(data, config.chunk_bit_size)?;
        let meta = MetaBlock::new(frequency);
        let chunks = chunk_blocks(&bytes_to_bits(data), config.chunk_bit_size as usize);

        let meta_samples = ToneModulator::meta(config.frame_rate).render(&meta.to_bits());
        let carrier =
            ToneModulator::new(config.frequency, config.frame_rate, config.cycles_per_bit);
        let header_bits = header.to_bits();

        let channels = match config.layout {
            ChannelLayout::Mono => {
                let mut samples = meta_samples;
                samples.extend(carrier.render_blocks(
                    std::iter::once(&header_bits[..]).chain(chunks.iter().map(Vec::as_slice)),
                ));
                vec![samples]
            }
            ChannelLayout::Stereo => {
                let split = ChunkSplit::plan(
                    config.frame_rate,
                    config.frequency,
                    config.cycles_per_bit,
                    config.chunk_bit_size as usize,
                    chunks.len(),
                );
                log::debug!(
                    "Stereo split: {} chunks left ({} slots), {} right ({} slots)",
                    split.left,
                    split.left_slots,
                    split.right,
                    split.right_slots
                );

                let (left_chunks, right_chunks) = chunks.split_at(split.left);
                let mut left = meta_samples;
                left.extend(carrier.render_blocks(
                    std::iter::once(&header_bits[..]).chain(left_chunks.iter().map(Vec::as_slice)),
                ));

                let sync = channel_sync_bits();
                let right = carrier.render_blocks(
                    std::iter::once(&sync[..]).chain(right_chunks.iter().map(Vec::as_slice)),
                );

                let mut channels = vec![left, right];
                pad_to_equal(&mut channels);
                channels
            }
        };

        log::info!(
            "Encoded {} bytes into {} chunks at {} Hz / {} Hz ({:.2} samples per bit), \
             {} channel(s) x {} samples",
            data.len(),
            header.chunk_count,
            config.frequency,
            config.frame_rate,
            config.samples_per_bit(),
            channels.len(),
            channels.first().map_or(0, Vec::len)
        );

        Ok(EncodedAudio {
            frame_rate: config.frame_rate,
            channels,
        })
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            config: ModemConfig::default(),
        }
    }
}
