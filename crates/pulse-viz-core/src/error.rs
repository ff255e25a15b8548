//! Error types for the few operations that can genuinely fail.
//!
//! Degenerate audio input is never an error: empty spectra, bad bin ranges and
//! implausible beat intervals are absorbed by clamping or defaulting.

/// Errors configuring a spectrum source.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpectrumError {
    #[error("fft size {0} must be a power of two between 32 and 32768")]
    InvalidFftSize(usize),
}

/// Errors building track metadata.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackError {
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),

    #[error("palette needs at least 3 colors, got {0}")]
    PaletteTooSmall(usize),

    #[error("unknown scene kind {0:?}")]
    UnknownScene(String),
}
