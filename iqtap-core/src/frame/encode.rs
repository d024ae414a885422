//! Lay a frame out as the sample sequence the extractor expects.
//!
//! Used to generate test streams and by hosts that need to inject a
//! frame into a sample file.
//!
//! ## Stream layout
//!
//! ```text
//! SENTINEL × preamble     (at least PREAMBLE_LEN)
//! frequency               (1)
//! mean_vector             (MEAN_VECTOR_LEN)
//! channel_count           (1, count in the real part)
//! channels                (CHANNEL_FIELDS per entry)
//! ```

use crate::error::IqtapError;
use crate::frame::types::{
    CHANNEL_FIELDS, ChannelEntry, MEAN_VECTOR_LEN, PREAMBLE_LEN, SENTINEL, Sample,
};

/// Samples a frame with `channels` entries and `preamble` sentinels occupies.
pub fn encoded_len(preamble: usize, channels: usize) -> usize {
    preamble + 1 + MEAN_VECTOR_LEN + 1 + channels * CHANNEL_FIELDS
}

/// Append the sample layout of one frame to `out`.
///
/// Each channel entry is written as `index, center, magnitude, magnitude`,
/// matching how the receiver reads the fourth slot.
pub fn encode_frame(
    out: &mut Vec<Sample>,
    preamble: usize,
    frequency: Sample,
    mean_vector: &[Sample],
    channels: &[ChannelEntry],
) -> Result<(), IqtapError> {
    if (preamble as u64) < PREAMBLE_LEN {
        return Err(IqtapError::InvalidConfig(format!(
            "preamble of {preamble} sentinels is shorter than {PREAMBLE_LEN}"
        )));
    }
    if mean_vector.len() != MEAN_VECTOR_LEN {
        return Err(IqtapError::InvalidConfig(format!(
            "mean vector has {} samples, expected {MEAN_VECTOR_LEN}",
            mean_vector.len()
        )));
    }
    if frequency == SENTINEL {
        return Err(IqtapError::InvalidConfig(
            "frequency must not equal the sentinel".into(),
        ));
    }

    out.reserve(encoded_len(preamble, channels.len()));
    out.extend(std::iter::repeat_n(SENTINEL, preamble));
    out.push(frequency);
    out.extend_from_slice(mean_vector);
    out.push(Sample::new(channels.len() as f32, 0.0));
    for entry in channels {
        out.extend_from_slice(&[entry.index, entry.center, entry.magnitude, entry.magnitude]);
    }
    Ok(())
}
