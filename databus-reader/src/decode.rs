//! Record decoding.
//!
//! Each line of a data file carries one base64-encoded payload (standard
//! alphabet). Padding is accepted but not required.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::Bytes;

/// Standard alphabet, padding optional.
const LINE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// What a reader does with a line that is not valid base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Count and log the line, then move past it.
    #[default]
    Skip,
    /// Stop the partition without moving past the line.
    HaltPartition,
}

impl DecodeFailurePolicy {
    /// Parses a policy name (`skip` or `halt`), case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "halt" | "halt_partition" => Some(Self::HaltPartition),
            _ => None,
        }
    }
}

/// Decodes one line into its payload.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns the decoder error if the line is not valid base64.
pub fn decode_line(line: &[u8]) -> Result<Bytes, base64::DecodeError> {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    LINE_ENGINE.decode(&line[start..end]).map(Bytes::from)
}
