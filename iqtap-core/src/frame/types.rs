//! Frame layout types and protocol constants.

use num_complex::Complex32;

/// One complex sample as carried on the stream.
pub type Sample = Complex32;

/// Marker value that starts (and pads) a frame preamble.
pub const SENTINEL: Sample = Complex32::new(1.0, 0.0);

/// Sentinel count at which the preamble is considered complete.
pub const PREAMBLE_LEN: u64 = 16_383;

/// Number of samples in a frame's mean vector.
pub const MEAN_VECTOR_LEN: usize = 16_384;

/// Samples consumed per channel table entry.
pub const CHANNEL_FIELDS: usize = 4;

// ── ChannelField ─────────────────────────────────────────────────

/// Which slot of a channel entry the next sample fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelField {
    #[default]
    Index,
    Center,
    Magnitude,
    /// Read from the stream but stored over `Magnitude`.
    MagnitudeDuplicate,
}

impl ChannelField {
    /// The field that follows this one, wrapping after the fourth.
    pub fn next(self) -> Self {
        match self {
            Self::Index => Self::Center,
            Self::Center => Self::Magnitude,
            Self::Magnitude => Self::MagnitudeDuplicate,
            Self::MagnitudeDuplicate => Self::Index,
        }
    }
}

// ── ChannelEntry ─────────────────────────────────────────────────

/// One row of a frame's channel table.
///
/// The fourth sample of each group overwrites `magnitude`. `bandwidth`
/// exists in the record layout but nothing on the stream writes it, so
/// it stays zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelEntry {
    pub index: Sample,
    pub center: Sample,
    pub magnitude: Sample,
    pub bandwidth: Sample,
}

// ── Frame ────────────────────────────────────────────────────────

/// A metadata frame, filled in incrementally by the extractor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Sentinels seen since the first one of this frame, including any
    /// absorbed after the preamble completed.
    pub preamble_count: u64,
    /// Value captured right after the preamble.
    pub frequency: Sample,
    /// Exactly [`MEAN_VECTOR_LEN`] samples once complete.
    pub mean_vector: Vec<Sample>,
    /// Declared channel table length, truncated from a sample's real part.
    /// Not validated: a negative value never completes.
    pub channel_count: i64,
    /// Completed channel entries.
    pub channels: Vec<ChannelEntry>,
}

impl Frame {
    /// Empty frame with its buffers preallocated.
    pub fn with_capacity() -> Self {
        Self {
            mean_vector: Vec::with_capacity(MEAN_VECTOR_LEN),
            ..Default::default()
        }
    }

    /// Whether the declared channel table is empty.
    pub fn is_empty_table(&self) -> bool {
        self.channel_count == 0
    }

    /// Forget the previous frame's contents, keeping allocations.
    pub(crate) fn clear(&mut self) {
        self.preamble_count = 0;
        self.frequency = Sample::default();
        self.mean_vector.clear();
        self.channel_count = 0;
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_field_rotates_through_four_slots() {
        let mut field = ChannelField::default();
        let mut seen = Vec::new();
        for _ in 0..CHANNEL_FIELDS {
            seen.push(field);
            field = field.next();
        }
        assert_eq!(
            seen,
            vec![
                ChannelField::Index,
                ChannelField::Center,
                ChannelField::Magnitude,
                ChannelField::MagnitudeDuplicate,
            ]
        );
        assert_eq!(field, ChannelField::Index);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut frame = Frame::with_capacity();
        frame.mean_vector.extend(std::iter::repeat_n(Sample::new(0.5, 0.5), 10));
        frame.channel_count = 3;
        frame.clear();
        assert!(frame.mean_vector.is_empty());
        assert!(frame.mean_vector.capacity() >= MEAN_VECTOR_LEN);
        assert!(frame.is_empty_table());
    }

    #[test]
    fn sentinel_is_one_plus_zero_i() {
        assert_eq!(SENTINEL.re, 1.0);
        assert_eq!(SENTINEL.im, 0.0);
    }
}
