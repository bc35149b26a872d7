use crate::bits::{adler32, push_uint, read_uint};
use crate::error::{BlockKind, ModemError, Result};
use crate::PROTOCOL_VERSION;

/// Total Meta block width, framing included
pub const META_BITS: usize = 120;
/// Total Header block width, framing included
pub const HEADER_BITS: usize = 377;
/// Framing bits around each chunk payload (3 void + 3 ones + 1 zero + 3 void)
pub const CHUNK_FRAMING_BITS: usize = 10;
/// Right-channel sync marker: 20 ones followed by one void zero
pub const CHANNEL_SYNC_BITS: usize = 21;

const META_PREAMBLE: usize = 20;
const META_FIELD_BITS: usize = 96;
const HEADER_PREAMBLE: usize = 100;
const HEADER_VOID: usize = 7;
const HEADER_FIELD_BITS: usize = 256;
const HEADER_SENTINEL: usize = 7;
const CHUNK_VOID: usize = 3;
const CHUNK_MARKER: usize = 3;

/// Per-block-kind decoding constants. Not transmitted.
///
/// Offsets are relative to the first preamble one: `total_bits` spans from
/// there to the end of the block's fields and framing, and `lead_bits` counts
/// the silent bits the block renders before its preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub preamble_len: usize,
    /// Minimum consecutive ones the preamble window must contain
    pub preamble_threshold: usize,
    /// Void zeros between the preamble and the fields
    pub void_len: usize,
    pub total_bits: usize,
    /// Field bits that must be present for the block to be usable
    pub field_bits: usize,
    pub lead_bits: usize,
}

impl BlockSpec {
    pub const META: BlockSpec = BlockSpec {
        preamble_len: META_PREAMBLE,
        preamble_threshold: 7,
        void_len: 1,
        total_bits: META_BITS,
        field_bits: META_FIELD_BITS,
        lead_bits: 0,
    };

    pub const HEADER: BlockSpec = BlockSpec {
        preamble_len: HEADER_PREAMBLE,
        preamble_threshold: 17,
        void_len: HEADER_VOID,
        total_bits: HEADER_BITS,
        field_bits: HEADER_FIELD_BITS,
        lead_bits: 0,
    };

    pub const CHANNEL_SYNC: BlockSpec = BlockSpec {
        preamble_len: 20,
        preamble_threshold: 7,
        void_len: 1,
        total_bits: CHANNEL_SYNC_BITS,
        field_bits: 0,
        lead_bits: 0,
    };

    pub fn chunk(chunk_bit_size: usize) -> BlockSpec {
        BlockSpec {
            preamble_len: CHUNK_MARKER,
            preamble_threshold: 1,
            void_len: 1,
            total_bits: CHUNK_MARKER + 1 + chunk_bit_size,
            field_bits: chunk_bit_size,
            lead_bits: CHUNK_VOID,
        }
    }

    /// Bits from the end of the preamble to the end of the block
    pub fn body_bits(&self) -> usize {
        self.total_bits - self.preamble_len
    }
}

/// Stream-level parameters, always sent at the fixed meta carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaBlock {
    pub reserved: u32,
    pub frequency: u16,
    pub reader_version: u16,
    pub codec_version: u16,
    pub wave_version: u16,
}

impl MetaBlock {
    pub fn new(frequency: u16) -> Self {
        Self {
            reserved: 0,
            frequency,
            reader_version: PROTOCOL_VERSION as u16,
            codec_version: PROTOCOL_VERSION as u16,
            wave_version: PROTOCOL_VERSION as u16,
        }
    }

    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = Vec::with_capacity(META_BITS);
        bits.extend(std::iter::repeat(true).take(META_PREAMBLE));
        bits.push(false);
        push_uint(&mut bits, self.reserved as u64, 32);
        push_uint(&mut bits, self.frequency as u64, 16);
        push_uint(&mut bits, self.reader_version as u64, 16);
        push_uint(&mut bits, self.codec_version as u64, 16);
        push_uint(&mut bits, self.wave_version as u64, 16);
        bits.extend([false; 3]);
        bits
    }

    /// Parse the bits that follow the preamble and void
    pub fn from_payload(payload: &[bool]) -> Result<Self> {
        if payload.len() < META_FIELD_BITS {
            return Err(ModemError::TruncatedBlock {
                block: BlockKind::Meta,
                start: 0,
                expected: META_FIELD_BITS,
                found: payload.len(),
            });
        }

        Ok(Self {
            reserved: read_uint(&payload[0..32]) as u32,
            frequency: read_uint(&payload[32..48]) as u16,
            reader_version: read_uint(&payload[48..64]) as u16,
            codec_version: read_uint(&payload[64..80]) as u16,
            wave_version: read_uint(&payload[80..96]) as u16,
        })
    }

    /// Reader, codec and wave versions must all be the supported protocol version
    pub fn check_compatible(&self) -> Result<()> {
        let fields = [
            ("reader", self.reader_version),
            ("codec", self.codec_version),
            ("wave", self.wave_version),
        ];
        for (field, version) in fields {
            if version as u32 != PROTOCOL_VERSION {
                return Err(ModemError::Incompatible {
                    field,
                    expected: PROTOCOL_VERSION,
                    found: version as u32,
                });
            }
        }
        Ok(())
    }
}

/// Payload description, sent at the stream carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock {
    pub version: u32,
    pub checksum: u32,
    pub chunk_count: u32,
    pub chunk_bit_size: u32,
    pub file_bit_length: u64,
}

impl HeaderBlock {
    pub fn for_payload(data: &[u8], chunk_bit_size: u32) -> Result<Self> {
        if chunk_bit_size == 0 {
            return Err(ModemError::InvalidConfig(
                "chunk bit size must be at least 1".to_string(),
            ));
        }

        let file_bit_length = data.len() as u64 * 8;
        let chunk_count = u32::try_from(file_bit_length.div_ceil(chunk_bit_size as u64))
            .map_err(|_| {
                ModemError::InvalidConfig(format!(
                    "{} bytes need more than {} chunks of {} bits",
                    data.len(),
                    u32::MAX,
                    chunk_bit_size
                ))
            })?;

        Ok(Self {
            version: PROTOCOL_VERSION,
            checksum: adler32(data),
            chunk_count,
            chunk_bit_size,
            file_bit_length,
        })
    }

    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = Vec::with_capacity(HEADER_BITS);
        bits.extend(std::iter::repeat(true).take(HEADER_PREAMBLE));
        bits.extend([false; HEADER_VOID]);
        push_uint(&mut bits, self.version as u64, 32);
        push_uint(&mut bits, self.checksum as u64, 32);
        push_uint(&mut bits, self.chunk_count as u64, 32);
        push_uint(&mut bits, self.chunk_bit_size as u64, 32);
        push_uint(&mut bits, self.file_bit_length, 64);
        // reserved
        push_uint(&mut bits, 0, 64);
        bits.extend([false; HEADER_VOID]);
        bits.extend([true; HEADER_SENTINEL]);
        bits
    }

    pub fn from_payload(payload: &[bool]) -> Result<Self> {
        if payload.len() < HEADER_FIELD_BITS {
            return Err(ModemError::TruncatedBlock {
                block: BlockKind::Header,
                start: 0,
                expected: HEADER_FIELD_BITS,
                found: payload.len(),
            });
        }

        Ok(Self {
            version: read_uint(&payload[0..32]) as u32,
            checksum: read_uint(&payload[32..64]) as u32,
            chunk_count: read_uint(&payload[64..96]) as u32,
            chunk_bit_size: read_uint(&payload[96..128]) as u32,
            file_bit_length: read_uint(&payload[128..192]),
        })
    }

    /// Version and chunk geometry checks run right after the header is decoded
    pub fn validate(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(ModemError::Incompatible {
                field: "header",
                expected: PROTOCOL_VERSION,
                found: self.version,
            });
        }

        if self.file_bit_length > 0 && self.chunk_bit_size == 0 {
            return Err(ModemError::InconsistentHeader(format!(
                "{} payload bits with a zero chunk size",
                self.file_bit_length
            )));
        }

        let expected = if self.file_bit_length == 0 {
            0
        } else {
            self.file_bit_length.div_ceil(self.chunk_bit_size as u64)
        };
        if self.chunk_count as u64 != expected {
            return Err(ModemError::InconsistentHeader(format!(
                "{} chunks declared, {} payload bits in chunks of {} need {}",
                self.chunk_count, self.file_bit_length, self.chunk_bit_size, expected
            )));
        }

        Ok(())
    }

    /// Payload bits carried by chunk `index`, zero padding excluded
    pub fn chunk_payload_bits(&self, index: u32) -> usize {
        let before = index as u64 * self.chunk_bit_size as u64;
        self.file_bit_length
            .saturating_sub(before)
            .min(self.chunk_bit_size as u64) as usize
    }
}

/// Split payload bits into framed chunk blocks; the last one is zero-extended
pub fn chunk_blocks(bits: &[bool], chunk_bit_size: usize) -> Vec<Vec<bool>> {
    if chunk_bit_size == 0 {
        return Vec::new();
    }

    bits.chunks(chunk_bit_size)
        .map(|data| {
            let mut block = Vec::with_capacity(chunk_bit_size + CHUNK_FRAMING_BITS);
            block.extend([false; CHUNK_VOID]);
            block.extend([true; CHUNK_MARKER]);
            block.push(false);
            block.extend_from_slice(data);
            block.resize(CHUNK_VOID + CHUNK_MARKER + 1 + chunk_bit_size, false);
            block.extend([false; CHUNK_VOID]);
            block
        })
        .collect()
}

pub fn channel_sync_bits() -> Vec<bool> {
    let mut bits = vec![true; CHANNEL_SYNC_BITS - 1];
    bits.push(false);
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::bytes_to_bits;

    #[test]
    fn test_meta_layout() {
        let bits = MetaBlock::new(32000).to_bits();
        assert_eq!(bits.len(), META_BITS);
        assert!(bits[..20].iter().all(|&b| b));
        assert!(!bits[20]);
        assert_eq!(read_uint(&bits[21..53]), 0);
        assert_eq!(read_uint(&bits[53..69]), 32000);
        assert_eq!(read_uint(&bits[69..85]), 1);
        assert!(bits[117..].iter().all(|&b| !b));
    }

    #[test]
    fn test_meta_payload_parse() {
        let bits = MetaBlock::new(2000).to_bits();
        let meta = MetaBlock::from_payload(&bits[21..]).unwrap();
        assert_eq!(meta, MetaBlock::new(2000));
        assert!(meta.check_compatible().is_ok());
    }

    #[test]
    fn test_meta_incompatible_version() {
        let mut meta = MetaBlock::new(2000);
        meta.codec_version = 2;
        match meta.check_compatible() {
            Err(ModemError::Incompatible { field, found, .. }) => {
                assert_eq!(field, "codec");
                assert_eq!(found, 2);
            }
            other => panic!("Expected Incompatible, got {:?}", other),
        }
    }

    #[test]
    fn test_header_layout() {
        let header = HeaderBlock::for_payload(b"Hello, World!!!!", 1024).unwrap();
        assert_eq!(header.chunk_count, 1);
        assert_eq!(header.file_bit_length, 128);

        let bits = header.to_bits();
        assert_eq!(bits.len(), HEADER_BITS);
        assert!(bits[..100].iter().all(|&b| b));
        assert!(bits[100..107].iter().all(|&b| !b));
        assert!(bits[363..370].iter().all(|&b| !b));
        assert!(bits[370..].iter().all(|&b| b));

        let parsed = HeaderBlock::from_payload(&bits[107..]).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_header_empty_payload() {
        let header = HeaderBlock::for_payload(b"", 8192).unwrap();
        assert_eq!(header.chunk_count, 0);
        assert_eq!(header.checksum, 1);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_header_rejects_inconsistent_chunk_count() {
        let mut header = HeaderBlock::for_payload(&[7u8; 300], 1024).unwrap();
        assert_eq!(header.chunk_count, 3);
        header.chunk_count = 5;
        assert!(matches!(
            header.validate(),
            Err(ModemError::InconsistentHeader(_))
        ));

        header.chunk_count = 3;
        header.version = 9;
        assert!(matches!(
            header.validate(),
            Err(ModemError::Incompatible { field: "header", .. })
        ));
    }

    #[test]
    fn test_chunk_payload_bits_truncates_last_chunk() {
        let header = HeaderBlock::for_payload(&[0u8; 300], 1024).unwrap();
        assert_eq!(header.chunk_payload_bits(0), 1024);
        assert_eq!(header.chunk_payload_bits(1), 1024);
        assert_eq!(header.chunk_payload_bits(2), 2400 - 2048);
    }

    #[test]
    fn test_chunk_blocks_framing() {
        let bits = bytes_to_bits(&[0xFF, 0x0F]);
        let chunks = chunk_blocks(&bits, 12);
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.len(), 12 + CHUNK_FRAMING_BITS);
            assert_eq!(&chunk[..7], &[false, false, false, true, true, true, false]);
            assert_eq!(&chunk[chunk.len() - 3..], &[false, false, false]);
        }
        assert_eq!(&chunks[0][7..19], &bits[..12]);
        // 4 data bits then zero padding
        assert_eq!(&chunks[1][7..11], &bits[12..]);
        assert!(chunks[1][11..19].iter().all(|&b| !b));
    }

    #[test]
    fn test_block_spec_widths() {
        let chunk = BlockSpec::chunk(8192);
        assert_eq!(chunk.total_bits + chunk.lead_bits + 3, 8192 + CHUNK_FRAMING_BITS);
        assert_eq!(BlockSpec::HEADER.body_bits(), 277);
        assert!(BlockSpec::META.body_bits() - BlockSpec::META.void_len >= 96);
    }

    #[test]
    fn test_channel_sync_bits() {
        let bits = channel_sync_bits();
        assert_eq!(bits.len(), 21);
        assert!(bits[..20].iter().all(|&b| b));
        assert!(!bits[20]);
    }
}
