//! Error taxonomy for the decoder, per the propagation policy: decoders never
//! abort the process, they return a `Result` and let the caller fold it.

use thiserror::Error;

/// Errors raised while scanning DATE container framing (GDC/LDC/equipment
/// headers). A `FramingError` abandons the current event; the framer moves on
/// to the next one.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("truncated file: needed {needed} bytes, found {found}")]
    Truncated { needed: usize, found: usize },

    #[error("event size mismatch: header says {declared}, but only {available} bytes remain")]
    SizeMismatch { declared: u32, available: usize },

    #[error("bad event magic number: 0x{0:08x}")]
    BadMagic(u32),

    #[error("unknown firmware version {0}")]
    UnknownFirmwareVersion(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding a FEC's payload (PMT, SiPM, or Trigger).
/// A `DecodeError` sets `Event::error = true`; whether the event is then
/// discarded is governed by `Configuration::discard_on_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("FT mismatch at sample {sample}: expected 0x{expected:04x}, found 0x{found:04x}")]
    FtMismatch {
        sample: usize,
        expected: u16,
        found: u16,
    },

    #[error("huffman decode underran its bit window")]
    HuffmanUnderrun,

    #[error("huffman trie descent never reached a leaf")]
    HuffmanNoLeaf,

    #[error("unexpected stop sentinel (0xFFFF 0xFFFF) at sample {0}")]
    UnexpectedStopSentinel(usize),

    #[error("SiPM half-link length mismatch: {a} words vs {b} words")]
    SipmLengthMismatch { a: usize, b: usize },

    #[error("FEC {0} reported its error bit")]
    FecErrorBit(u16),

    #[error("truncated payload while decoding: {0}")]
    Truncated(String),
}

/// Errors raised by the run-metadata catalog. Fatal at startup: the binary
/// entry point logs these and exits non-zero rather than attempting to
/// process any events.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no Huffman codes found for run {run} (sensor kind {sensor_kind})")]
    EmptyHuffmanTable { run: u32, sensor_kind: &'static str },

    #[error("no sensor mapping rows found for run {0}")]
    EmptySensorMap(u32),

    #[error("Huffman codebook has a prefix conflict: code {0:?} is a prefix of a longer code")]
    PrefixConflict(String),

    #[error("catalog backend unavailable: {0}")]
    BackendUnavailable(String),
}
