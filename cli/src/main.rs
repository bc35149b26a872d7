use buzzwave_core::{
    Capture, ChannelLayout, Decoder, DecoderConfig, EncodedAudio, Encoder, ModemConfig,
    ModemError, StreamInfo,
};
use clap::{Parser, Subcommand, ValueEnum};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported audio container: {0}")]
    UnsupportedContainer(String),
}

#[derive(Parser)]
#[command(name = "buzzwave")]
#[command(about = "Acoustic data modem: send files as on/off keyed tone bursts")]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(short, long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode binary data to WAV audio file
    Encode {
        /// Input binary file
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Payload carrier frequency in Hz
        #[arg(short, long, default_value_t = buzzwave_core::DEFAULT_FREQUENCY)]
        frequency: u32,

        /// Output sample rate in Hz
        #[arg(short = 'r', long, default_value_t = buzzwave_core::DEFAULT_FRAME_RATE)]
        frame_rate: u32,

        /// Payload per chunk in KB
        #[arg(short, long, default_value_t = 1)]
        chunk_size: u32,

        /// Payload bits per chunk (overrides --chunk-size)
        #[arg(long)]
        chunk_bits: Option<u32>,

        /// Carrier cycles per bit
        #[arg(long, default_value_t = 1)]
        cycles_per_bit: u32,

        /// Output channels (1 or 2)
        #[arg(long, default_value_t = 1)]
        channels: u16,
    },

    /// Decode WAV audio file to binary data
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file
        #[arg(value_name = "OUTPUT.BIN")]
        output: PathBuf,

        #[command(flatten)]
        options: DecodeOptions,
    },

    /// Print a WAV file's meta and header blocks as JSON
    Inspect {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        #[command(flatten)]
        options: DecodeOptions,
    },
}

#[derive(clap::Args)]
struct DecodeOptions {
    /// The meta block must start within this many seconds
    #[arg(short = 's', long, default_value_t = 2.0)]
    start_at: f64,

    /// Carrier cycles per bit (must match the encoder)
    #[arg(long, default_value_t = 1)]
    cycles_per_bit: u32,

    /// Channel layout (default: from the file's channel count)
    #[arg(long, value_enum)]
    layout: Option<Layout>,
}

impl DecodeOptions {
    fn decoder(&self) -> Result<Decoder, CliError> {
        Ok(Decoder::new(DecoderConfig {
            meta_search_secs: self.start_at,
            cycles_per_bit: self.cycles_per_bit,
            layout: self.layout.map(ChannelLayout::from),
        })?)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Mono,
    Stereo,
}

impl From<Layout> for ChannelLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Mono => ChannelLayout::Mono,
            Layout::Stereo => ChannelLayout::Stereo,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.into())
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Encode {
            input,
            output,
            frequency,
            frame_rate,
            chunk_size,
            chunk_bits,
            cycles_per_bit,
            channels,
        } => {
            let config = ModemConfig {
                frequency,
                frame_rate,
                chunk_bit_size: chunk_bits.unwrap_or(chunk_size.saturating_mul(8 * 1024)),
                cycles_per_bit,
                layout: ChannelLayout::from_channels(channels)?,
            };
            encode_command(&input, &output, config)?
        }
        Commands::Decode {
            input,
            output,
            options,
        } => decode_command(&input, &output, &options)?,
        Commands::Inspect { input, options } => inspect_command(&input, &options)?,
    }

    Ok(())
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    config: ModemConfig,
) -> Result<(), CliError> {
    let data = std::fs::read(input_path)?;
    println!("Read {} bytes from {}", data.len(), input_path.display());

    let encoder = Encoder::new(config)?;
    let audio = encoder.encode(&data)?;
    println!(
        "Encoded to {} audio samples x {} channel(s) ({:.2} s)",
        audio.frames(),
        audio.channel_count(),
        audio.duration_secs()
    );

    write_wav(output_path, &audio)?;
    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(
    input_path: &Path,
    output_path: &Path,
    options: &DecodeOptions,
) -> Result<(), CliError> {
    let capture = read_wav(input_path)?;
    let decoder = options.decoder()?;
    let decoded = decoder.decode(&capture)?;
    println!(
        "Decoded {} bytes ({} chunks, checksum {:#010x})",
        decoded.data.len(),
        decoded.info.header.chunk_count,
        decoded.info.header.checksum
    );

    std::fs::write(output_path, &decoded.data)?;
    println!("Wrote {} bytes to {}", decoded.data.len(), output_path.display());
    Ok(())
}

fn inspect_command(input_path: &Path, options: &DecodeOptions) -> Result<(), CliError> {
    let capture = read_wav(input_path)?;
    let info = options.decoder()?.inspect(&capture)?;
    let report = InspectReport::new(&capture, &info);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// 16-bit PCM, one interleaved frame per sample index
fn write_wav(path: &Path, audio: &EncodedAudio) -> Result<(), CliError> {
    let spec = WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.frame_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = WavWriter::new(std::io::BufWriter::new(file), spec)?;
    for sample in audio.interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Integer PCM of any width the container declares, or 32-bit float scaled
/// to the `i32` range
fn read_wav(path: &Path) -> Result<Capture, CliError> {
    let mut reader = WavReader::new(BufReader::new(File::open(path)?))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(CliError::UnsupportedContainer(format!(
            "{} declares no channels",
            path.display()
        )));
    }

    let samples = match spec.sample_format {
        SampleFormat::Int => reader.samples::<i32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(float_to_i32))
            .collect::<Result<Vec<_>, _>>()?,
    };
    log::info!(
        "Read {} frames from {}: {} Hz, {} channel(s), {} bits",
        samples.len() / spec.channels as usize,
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );
    Ok(Capture::from_interleaved(
        spec.sample_rate,
        &samples,
        spec.channels as usize,
    ))
}

fn float_to_i32(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) as f64 * i32::MAX as f64).round() as i32
}

#[derive(Serialize)]
struct InspectReport {
    frame_rate: u32,
    channels: usize,
    layout: &'static str,
    meta_start: usize,
    payload_start: usize,
    meta: MetaReport,
    header: HeaderReport,
}

#[derive(Serialize)]
struct MetaReport {
    frequency: u16,
    reader_version: u16,
    codec_version: u16,
    wave_version: u16,
}

#[derive(Serialize)]
struct HeaderReport {
    version: u32,
    checksum: u32,
    chunk_count: u32,
    chunk_bit_size: u32,
    file_bit_length: u64,
}

impl InspectReport {
    fn new(capture: &Capture, info: &StreamInfo) -> Self {
        Self {
            frame_rate: capture.frame_rate,
            channels: capture.channels.len(),
            layout: match info.layout {
                ChannelLayout::Mono => "mono",
                ChannelLayout::Stereo => "stereo",
            },
            meta_start: info.meta_start,
            payload_start: info.payload_start,
            meta: MetaReport {
                frequency: info.meta.frequency,
                reader_version: info.meta.reader_version,
                codec_version: info.meta.codec_version,
                wave_version: info.meta.wave_version,
            },
            header: HeaderReport {
                version: info.header.version,
                checksum: info.header.checksum,
                chunk_count: info.header.chunk_count,
                chunk_bit_size: info.header.chunk_bit_size,
                file_bit_length: info.header.file_bit_length,
            },
        }
    }
}
