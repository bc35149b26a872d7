//! Acoustic data modem: on/off keyed single-carrier tone bursts
//!
//! A file is sent as a Meta block at a fixed 1000 Hz carrier, a Header block
//! and a stream of Chunk blocks at the configured carrier. The decoder
//! re-synchronizes on every block's preamble, so timing drift never
//! accumulates past one chunk. Integrity is checked with Adler-32 over the
//! whole payload; there is no error correction.

pub mod error;
pub mod bits;
pub mod framing;
pub mod modulator;
pub mod channel;
pub mod sync;
pub mod demod;
pub mod block;
pub mod encoder;
pub mod decoder;

pub use channel::{ChannelLayout, ChunkSplit};
pub use decoder::{Capture, DecodedFile, Decoder, DecoderConfig, StreamInfo};
pub use encoder::{EncodedAudio, Encoder, ModemConfig};
pub use error::{BlockKind, ModemError, Result};
pub use framing::{HeaderBlock, MetaBlock};

/// Version written to and required in every meta and header version field
pub const PROTOCOL_VERSION: u32 = 1;

// Carrier configuration
pub const META_FREQUENCY: u32 = 1000; // Hz, fixed for the meta block
pub const MIN_FREQUENCY: u32 = 1000; // Hz
pub const MAX_FREQUENCY: u32 = 65536; // Hz
pub const MIN_FRAME_RATE: u32 = 44100; // Hz
pub const MAX_FRAME_RATE: u32 = 320000; // Hz
pub const MIN_SAMPLES_PER_CYCLE: u32 = 6;
pub const MIN_CYCLES_PER_BIT: u32 = 1;
pub const MAX_CYCLES_PER_BIT: u32 = 10;

// Defaults
pub const DEFAULT_FREQUENCY: u32 = 32000; // Hz
pub const DEFAULT_FRAME_RATE: u32 = 192000; // Hz
pub const DEFAULT_CHUNK_BIT_SIZE: u32 = 8 * 1024; // 1 KB of payload per chunk
