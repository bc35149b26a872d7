use crate::bits::{adler32, bits_to_bytes};
use crate::block::{BlockRecoverer, RecoveredBlock};
use crate::channel::{deinterleave, ChannelLayout, ChunkSplit};
use crate::encoder::EncodedAudio;
use crate::error::{BlockKind, ModemError, Result};
use crate::framing::{BlockSpec, HeaderBlock, MetaBlock};
use crate::{
    MAX_CYCLES_PER_BIT, META_FREQUENCY, MIN_CYCLES_PER_BIT, MIN_FREQUENCY, MIN_SAMPLES_PER_CYCLE,
};

/// Header search window, in payload bit windows
const HEADER_SEARCH_BITS: usize = 400;
/// Chunk search window: trailing void, leading void, marker and slack
const CHUNK_SEARCH_BITS: usize = 12;
/// Right-channel sync marker search window
const CHANNEL_SYNC_SEARCH_BITS: usize = 80;

/// Decode-side parameters not carried on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// The meta block must begin within this many seconds of the capture start
    pub meta_search_secs: f64,
    /// Must match the encoder
    pub cycles_per_bit: u32,
    /// `None` infers the layout from the capture's channel count
    pub layout: Option<ChannelLayout>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            meta_search_secs: 2.0,
            cycles_per_bit: 1,
            layout: None,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.meta_search_secs.is_finite() && self.meta_search_secs > 0.0) {
            return Err(ModemError::InvalidConfig(format!(
                "meta search window must be a positive number of seconds, got {}",
                self.meta_search_secs
            )));
        }
        if !(MIN_CYCLES_PER_BIT..=MAX_CYCLES_PER_BIT).contains(&self.cycles_per_bit) {
            return Err(ModemError::InvalidConfig(format!(
                "cycles per bit {} outside [{}, {}]",
                self.cycles_per_bit, MIN_CYCLES_PER_BIT, MAX_CYCLES_PER_BIT
            )));
        }
        Ok(())
    }
}

/// Captured PCM samples, one buffer per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub frame_rate: u32,
    pub channels: Vec<Vec<i32>>,
}

impl Capture {
    pub fn new(frame_rate: u32, channels: Vec<Vec<i32>>) -> Self {
        Self {
            frame_rate,
            channels,
        }
    }

    pub fn from_interleaved(frame_rate: u32, samples: &[i32], channel_count: usize) -> Self {
        Self::new(frame_rate, deinterleave(samples, channel_count))
    }
}

impl From<&EncodedAudio> for Capture {
    fn from(audio: &EncodedAudio) -> Self {
        Self::new(
            audio.frame_rate,
            audio
                .channels
                .iter()
                .map(|channel| channel.iter().map(|&s| s as i32).collect())
                .collect(),
        )
    }
}

/// Meta and header of a stream, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub meta: MetaBlock,
    pub header: HeaderBlock,
    pub layout: ChannelLayout,
    /// Absolute sample index of the meta block
    pub meta_start: usize,
    /// Absolute sample index where the first chunk is searched from
    pub payload_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub info: StreamInfo,
    pub data: Vec<u8>,
}

pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Decode meta and header only
    pub fn inspect(&self, capture: &Capture) -> Result<StreamInfo> {
        let primary = capture.channels.first().ok_or_else(|| {
            ModemError::InvalidConfig("capture has no channels".to_string())
        })?;
        let frame_rate = capture.frame_rate;
        if frame_rate == 0 {
            return Err(ModemError::InvalidConfig(
                "capture frame rate is zero".to_string(),
            ));
        }

        let meta_recoverer = BlockRecoverer::new(META_FREQUENCY, frame_rate, 1);
        let meta_window = (self.config.meta_search_secs * frame_rate as f64) as usize;
        let meta_block =
            meta_recoverer.recover(primary, 0, &BlockSpec::META, BlockKind::Meta, meta_window)?;
        let meta = MetaBlock::from_payload(&meta_block.payload)?;
        log::info!(
            "Meta block at sample {}: carrier {} Hz, versions {}/{}/{}",
            meta_block.start,
            meta.frequency,
            meta.reader_version,
            meta.codec_version,
            meta.wave_version
        );
        meta.check_compatible()?;

        let frequency = meta.frequency as u32;
        if frequency < MIN_FREQUENCY
            || frequency as u64 * MIN_SAMPLES_PER_CYCLE as u64 > frame_rate as u64
        {
            return Err(ModemError::UnsupportedCarrier {
                frequency,
                frame_rate,
            });
        }

        let recoverer = BlockRecoverer::new(frequency, frame_rate, self.config.cycles_per_bit);
        let header_block = recoverer.recover(
            primary,
            meta_block.next,
            &BlockSpec::HEADER,
            BlockKind::Header,
            recoverer.bits_to_samples(HEADER_SEARCH_BITS),
        )?;
        let header = HeaderBlock::from_payload(&header_block.payload)?;
        log::info!(
            "Header block at sample {}: {} chunks of {} bits, {} payload bits, checksum {:#010x}",
            header_block.start,
            header.chunk_count,
            header.chunk_bit_size,
            header.file_bit_length,
            header.checksum
        );
        header.validate()?;

        let layout = match self.config.layout {
            Some(layout) => layout,
            None => infer_layout(capture, &meta, meta_block.start, &recoverer),
        };

        Ok(StreamInfo {
            meta,
            header,
            layout,
            meta_start: meta_block.start,
            payload_start: header_block.next,
        })
    }

    /// Decode a full capture and verify its checksum
    pub fn decode(&self, capture: &Capture) -> Result<DecodedFile> {
        let info = self.inspect(capture)?;
        let header = &info.header;
        let frame_rate = capture.frame_rate;
        let frequency = info.meta.frequency as u32;
        let cycles_per_bit = self.config.cycles_per_bit;
        let chunk_count = header.chunk_count as usize;
        let chunk_bit_size = header.chunk_bit_size as usize;

        let split = match info.layout {
            ChannelLayout::Mono => ChunkSplit::mono(chunk_count),
            ChannelLayout::Stereo => ChunkSplit::plan(
                frame_rate,
                frequency,
                cycles_per_bit,
                chunk_bit_size,
                chunk_count,
            ),
        };

        let mut reader = ChunkReader {
            recoverer: BlockRecoverer::new(frequency, frame_rate, cycles_per_bit),
            header,
            bits: Vec::new(),
            next_index: 0,
        };

        reader.read(&capture.channels[0], info.payload_start, split.left)?;

        if split.right > 0 {
            let secondary = capture.channels.get(1).ok_or_else(|| {
                ModemError::InvalidConfig(format!(
                    "stereo stream puts {} chunks on a second channel the capture does not have",
                    split.right
                ))
            })?;
            let sync = find_channel_sync(&reader.recoverer, secondary, info.meta_start)?;
            log::info!("Right channel sync at sample {}", sync.start);
            reader.read(secondary, sync.next, split.right)?;
        }

        let data = bits_to_bytes(&reader.bits);
        let actual = adler32(&data);
        if actual != header.checksum {
            return Err(ModemError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        log::info!("Decoded {} bytes, checksum {:#010x} verified", data.len(), actual);

        Ok(DecodedFile { info, data })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            config: DecoderConfig::default(),
        }
    }
}

/// The right channel's sync marker. Both channels share a time origin, so the
/// marker starts together with the meta block.
fn find_channel_sync(
    recoverer: &BlockRecoverer,
    samples: &[i32],
    meta_start: usize,
) -> Result<RecoveredBlock> {
    recoverer.recover(
        samples,
        meta_start.saturating_sub(recoverer.bits_to_samples(1)),
        &BlockSpec::CHANNEL_SYNC,
        BlockKind::ChannelSync,
        recoverer.bits_to_samples(CHANNEL_SYNC_SEARCH_BITS),
    )
}

/// A second channel makes a stereo stream only when it carries the channel
/// sync marker. A copy of the primary channel, as written by a stereo
/// recorder, or a silent one is still mono.
fn infer_layout(
    capture: &Capture,
    meta: &MetaBlock,
    meta_start: usize,
    recoverer: &BlockRecoverer,
) -> ChannelLayout {
    let Some(secondary) = capture.channels.get(1) else {
        return ChannelLayout::Mono;
    };

    let meta_recoverer = BlockRecoverer::new(META_FREQUENCY, capture.frame_rate, 1);
    let meta_bit = meta_recoverer.bits_to_samples(1);
    let duplicated = meta_recoverer
        .recover(
            secondary,
            meta_start.saturating_sub(2 * meta_bit),
            &BlockSpec::META,
            BlockKind::Meta,
            4 * meta_bit,
        )
        .and_then(|block| MetaBlock::from_payload(&block.payload))
        .is_ok_and(|copy| copy == *meta);
    if duplicated {
        log::info!("Second channel repeats the meta block; decoding as mono");
        return ChannelLayout::Mono;
    }

    match find_channel_sync(recoverer, secondary, meta_start) {
        Ok(sync) => {
            log::debug!("Channel sync marker at sample {}; decoding as stereo", sync.start);
            ChannelLayout::Stereo
        }
        Err(err) => {
            log::info!("No channel sync marker on second channel ({}); decoding as mono", err);
            ChannelLayout::Mono
        }
    }
}

/// Sequential chunk decoding with a running cursor and payload accumulator
struct ChunkReader<'a> {
    recoverer: BlockRecoverer,
    header: &'a HeaderBlock,
    bits: Vec<bool>,
    next_index: u32,
}

impl ChunkReader<'_> {
    fn read(&mut self, samples: &[i32], mut cursor: usize, count: usize) -> Result<()> {
        let spec = BlockSpec::chunk(self.header.chunk_bit_size as usize);
        let window = self.recoverer.bits_to_samples(CHUNK_SEARCH_BITS);

        for _ in 0..count {
            let index = self.next_index;
            let RecoveredBlock { payload, next, .. } =
                self.recoverer
                    .recover(samples, cursor, &spec, BlockKind::Chunk(index), window)?;
            let take = self.header.chunk_payload_bits(index);
            self.bits.extend_from_slice(&payload[..take.min(payload.len())]);
            cursor = next;
            self.next_index += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Encoder, ModemConfig};

    fn encode(data: &[u8], frequency: u32, frame_rate: u32, layout: ChannelLayout) -> Capture {
        let config = ModemConfig {
            frequency,
            frame_rate,
            chunk_bit_size: 256,
            cycles_per_bit: 1,
            layout,
        };
        Capture::from(&Encoder::new(config).unwrap().encode(data).unwrap())
    }

    #[test]
    fn test_decoder_config_validation() {
        assert!(DecoderConfig::default().validate().is_ok());
        let mut config = DecoderConfig::default();
        config.meta_search_secs = 0.0;
        assert!(Decoder::new(config).is_err());
        config.meta_search_secs = 1.0;
        config.cycles_per_bit = 11;
        assert!(Decoder::new(config).is_err());
    }

    #[test]
    fn test_inspect_reports_header() {
        let capture = encode(&[1u8; 100], 4000, 48000, ChannelLayout::Mono);
        let info = Decoder::default().inspect(&capture).unwrap();
        assert_eq!(info.meta.frequency, 4000);
        assert_eq!(info.header.chunk_count, 4);
        assert_eq!(info.header.file_bit_length, 800);
        assert_eq!(info.layout, ChannelLayout::Mono);
        assert_eq!(info.meta_start, 0);
    }

    #[test]
    fn test_decode_mono() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let capture = encode(data, 4000, 48000, ChannelLayout::Mono);
        let decoded = Decoder::default().decode(&capture).unwrap();
        assert_eq!(decoded.data, data.to_vec());
    }

    #[test]
    fn test_decode_stereo() {
        let data: Vec<u8> = (0..=255).collect();
        let capture = encode(&data, 4000, 48000, ChannelLayout::Stereo);
        let decoded = Decoder::default().decode(&capture).unwrap();
        assert_eq!(decoded.info.layout, ChannelLayout::Stereo);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn test_mono_stream_on_two_channels_decodes_as_mono() {
        let data = b"recorded by a stereo microphone";
        let mono = encode(data, 4000, 48000, ChannelLayout::Mono);
        let channel = mono.channels[0].clone();

        let duplicated = Capture::new(48000, vec![channel.clone(), channel.clone()]);
        let info = Decoder::default().inspect(&duplicated).unwrap();
        assert_eq!(info.layout, ChannelLayout::Mono);
        let decoded = Decoder::default().decode(&duplicated).unwrap();
        assert_eq!(decoded.data, data.to_vec());

        let silent_right = Capture::new(48000, vec![channel.clone(), vec![0; channel.len()]]);
        let decoded = Decoder::default().decode(&silent_right).unwrap();
        assert_eq!(decoded.info.layout, ChannelLayout::Mono);
        assert_eq!(decoded.data, data.to_vec());
    }

    #[test]
    fn test_incompatible_meta_stops_before_header() {
        let mut capture = encode(b"future stream", 4000, 48000, ChannelLayout::Mono);
        let meta = MetaBlock {
            wave_version: 2,
            ..MetaBlock::new(4000)
        };
        let rendered = crate::modulator::ToneModulator::meta(48000).render(&meta.to_bits());
        for (dst, &src) in capture.channels[0].iter_mut().zip(&rendered) {
            *dst = src as i32;
        }

        match Decoder::default().decode(&capture) {
            Err(ModemError::Incompatible {
                field,
                expected,
                found,
            }) => {
                assert_eq!(field, "wave");
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("Expected Incompatible, got {:?}", other),
        }
    }

    #[test]
    fn test_stereo_stream_needs_second_channel() {
        let data: Vec<u8> = (0..=255).collect();
        let mut capture = encode(&data, 4000, 48000, ChannelLayout::Stereo);
        capture.channels.truncate(1);

        let config = DecoderConfig {
            layout: Some(ChannelLayout::Stereo),
            ..DecoderConfig::default()
        };
        let err = Decoder::new(config).unwrap().decode(&capture).unwrap_err();
        assert!(matches!(err, ModemError::InvalidConfig(_)));
    }

    #[test]
    fn test_corrupted_chunk_fails_checksum() {
        let mut capture = encode(b"checksum guards the payload", 4000, 48000, ChannelLayout::Mono);
        // Silence one carrier bit inside the first chunk's payload
        let payload_start = Decoder::default().inspect(&capture).unwrap().payload_start;
        let grid = crate::modulator::BitGrid::new(4000, 48000, 1);
        let channel = &mut capture.channels[0];
        let mut flipped = false;
        for bit in 7..200 {
            let lo = payload_start + grid.boundary(bit);
            let hi = payload_start + grid.boundary(bit + 1);
            if channel[lo..hi].iter().any(|&s| s != 0) {
                channel[lo..hi].fill(0);
                flipped = true;
                break;
            }
        }
        assert!(flipped);

        match Decoder::default().decode(&capture) {
            Err(ModemError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, adler32(b"checksum guards the payload"));
                assert_ne!(expected, actual);
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_capture_is_rejected() {
        let capture = Capture::new(48000, Vec::new());
        assert!(matches!(
            Decoder::default().decode(&capture),
            Err(ModemError::InvalidConfig(_))
        ));
    }
}
