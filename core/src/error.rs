use std::fmt;
use thiserror::Error;

/// Protocol block a decode failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Meta,
    Header,
    /// Zero-based chunk index within the payload
    Chunk(u32),
    /// Short one-run that opens the right channel of a stereo capture
    ChannelSync,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Meta => write!(f, "meta"),
            BlockKind::Header => write!(f, "header"),
            BlockKind::Chunk(index) => write!(f, "chunk #{}", index),
            BlockKind::ChannelSync => write!(f, "channel sync"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No carrier cycle found for {block} block in samples {start}..{end}")]
    SyncLost {
        block: BlockKind,
        start: usize,
        end: usize,
    },

    #[error(
        "{block} block not found in samples {start}..{end}: longest one-run {longest_run}, need {threshold}"
    )]
    BlockNotFound {
        block: BlockKind,
        start: usize,
        end: usize,
        longest_run: usize,
        threshold: usize,
    },

    #[error(
        "Ambiguous cycle in {block} block at samples {start}..{end}: max {max}, min {min}, block volume {volume}"
    )]
    AmbiguousCycle {
        block: BlockKind,
        start: usize,
        end: usize,
        max: i32,
        min: i32,
        volume: i32,
    },

    #[error("{block} block truncated at sample {start}: expected {expected} bits, found {found}")]
    TruncatedBlock {
        block: BlockKind,
        start: usize,
        expected: usize,
        found: usize,
    },

    #[error("Inconsistent header: {0}")]
    InconsistentHeader(String),

    #[error("Incompatible {field} version: expected {expected}, found {found}")]
    Incompatible {
        field: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Unsupported carrier {frequency} Hz at frame rate {frame_rate} Hz")]
    UnsupportedCarrier { frequency: u32, frame_rate: u32 },

    #[error("Checksum mismatch: header declares {expected:#010x}, payload has {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl ModemError {
    /// No usable carrier in the searched window
    pub fn is_sync(&self) -> bool {
        matches!(self, ModemError::SyncLost { .. })
    }

    /// Signal was present but did not parse as the expected block
    pub fn is_frame_format(&self) -> bool {
        matches!(
            self,
            ModemError::BlockNotFound { .. }
                | ModemError::AmbiguousCycle { .. }
                | ModemError::TruncatedBlock { .. }
                | ModemError::InconsistentHeader(_)
        )
    }

    pub fn is_compatibility(&self) -> bool {
        matches!(
            self,
            ModemError::Incompatible { .. } | ModemError::UnsupportedCarrier { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ModemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_kind_display() {
        assert_eq!(BlockKind::Meta.to_string(), "meta");
        assert_eq!(BlockKind::Chunk(3).to_string(), "chunk #3");
        assert_eq!(BlockKind::ChannelSync.to_string(), "channel sync");
    }

    #[test]
    fn test_error_classes() {
        let sync = ModemError::SyncLost {
            block: BlockKind::Header,
            start: 0,
            end: 10,
        };
        assert!(sync.is_sync());
        assert!(!sync.is_frame_format());

        let truncated = ModemError::TruncatedBlock {
            block: BlockKind::Chunk(0),
            start: 5,
            expected: 8,
            found: 2,
        };
        assert!(truncated.is_frame_format());
        assert!(truncated.to_string().contains("chunk #0"));

        let incompatible = ModemError::Incompatible {
            field: "reader",
            expected: 1,
            found: 2,
        };
        assert!(incompatible.is_compatibility());
    }
}
