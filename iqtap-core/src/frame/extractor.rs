//! Sample-by-sample frame extraction state machine.
//!
//! ```text
//!  SeekingPreamble ──► CountingPreamble ──► CapturingFrequency
//!        ▲                                         │
//!        │                                         ▼
//!  CapturingChannels ◄── ReadingChannelCount ◄── CapturingMeanVector
//!        │                      │
//!        └──────────────────────┴──► SeekingPreamble (frame complete)
//! ```
//!
//! The extractor never alters or drops a sample; it only observes.

use crate::frame::milestones::Milestones;
use crate::frame::types::{
    ChannelEntry, ChannelField, Frame, MEAN_VECTOR_LEN, PREAMBLE_LEN, SENTINEL, Sample,
};

// ── ExtractorState ───────────────────────────────────────────────

/// Where the extractor is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorState {
    /// Waiting for the first sentinel.
    #[default]
    SeekingPreamble,
    /// Counting sentinels; other samples are ignored without resetting.
    CountingPreamble,
    /// Preamble complete; the next non-sentinel sample is the frequency.
    CapturingFrequency,
    /// Filling the mean vector.
    CapturingMeanVector,
    /// The next sample declares the channel table length.
    ReadingChannelCount,
    /// Filling channel entries, four samples each.
    CapturingChannels,
}

impl std::fmt::Display for ExtractorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeekingPreamble => write!(f, "SeekingPreamble"),
            Self::CountingPreamble => write!(f, "CountingPreamble"),
            Self::CapturingFrequency => write!(f, "CapturingFrequency"),
            Self::CapturingMeanVector => write!(f, "CapturingMeanVector"),
            Self::ReadingChannelCount => write!(f, "ReadingChannelCount"),
            Self::CapturingChannels => write!(f, "CapturingChannels"),
        }
    }
}

// ── Step ─────────────────────────────────────────────────────────

/// Result of feeding one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// The input sample, unchanged.
    pub sample: Sample,
    /// Milestones reached by this sample.
    pub milestones: Milestones,
}

// ── FrameExtractor ───────────────────────────────────────────────

/// Reassembles one [`Frame`] at a time from a sample stream.
///
/// All partial state survives between calls, so batches may split a
/// frame anywhere. The frame buffers are reused: they are cleared when
/// the next preamble starts, and until then the last completed frame is
/// available from [`completed_frame`](Self::completed_frame).
#[derive(Debug)]
pub struct FrameExtractor {
    state: ExtractorState,
    frame: Frame,
    /// Channel entry being filled.
    pending: ChannelEntry,
    field: ChannelField,
    complete: bool,
    frames_completed: u64,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self {
            state: ExtractorState::SeekingPreamble,
            frame: Frame::with_capacity(),
            pending: ChannelEntry::default(),
            field: ChannelField::Index,
            complete: false,
            frames_completed: 0,
        }
    }

    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// The frame under construction, or the last completed one.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// The last completed frame, until a new preamble starts.
    pub fn completed_frame(&self) -> Option<&Frame> {
        self.complete.then_some(&self.frame)
    }

    /// Frames completed since construction.
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Drop any partial frame and go back to seeking a preamble.
    pub fn reset(&mut self) {
        self.frame.clear();
        self.pending = ChannelEntry::default();
        self.field = ChannelField::Index;
        self.complete = false;
        self.state = ExtractorState::SeekingPreamble;
    }

    /// Feed one sample.
    pub fn push(&mut self, sample: Sample) -> Step {
        let milestones = self.advance(sample);
        Step { sample, milestones }
    }

    /// Feed a batch and return every milestone reached within it.
    pub fn process(&mut self, samples: &[Sample]) -> Milestones {
        samples
            .iter()
            .fold(Milestones::empty(), |acc, &s| acc | self.advance(s))
    }

    fn advance(&mut self, sample: Sample) -> Milestones {
        let sentinel = sample == SENTINEL;
        match self.state {
            ExtractorState::SeekingPreamble => {
                if sentinel {
                    self.begin_frame();
                }
                Milestones::empty()
            }
            ExtractorState::CountingPreamble => {
                if !sentinel {
                    return Milestones::empty();
                }
                self.frame.preamble_count += 1;
                if self.frame.preamble_count == PREAMBLE_LEN {
                    self.state = ExtractorState::CapturingFrequency;
                    return Milestones::PREAMBLE_COMPLETE;
                }
                Milestones::empty()
            }
            ExtractorState::CapturingFrequency => {
                if sentinel {
                    // Preamble overrun: still part of the marker.
                    self.frame.preamble_count += 1;
                    return Milestones::empty();
                }
                self.frame.frequency = sample;
                self.state = ExtractorState::CapturingMeanVector;
                Milestones::FREQUENCY_CAPTURED
            }
            ExtractorState::CapturingMeanVector => {
                self.frame.mean_vector.push(sample);
                if self.frame.mean_vector.len() == MEAN_VECTOR_LEN {
                    self.state = ExtractorState::ReadingChannelCount;
                    return Milestones::MEAN_VECTOR_COMPLETE;
                }
                Milestones::empty()
            }
            ExtractorState::ReadingChannelCount => {
                // `as` truncates toward zero and saturates; NaN reads as 0.
                self.frame.channel_count = sample.re as i64;
                if self.frame.channel_count == 0 {
                    self.finish_frame();
                    return Milestones::EMPTY_FRAME;
                }
                self.pending = ChannelEntry::default();
                self.field = ChannelField::Index;
                self.state = ExtractorState::CapturingChannels;
                Milestones::empty()
            }
            ExtractorState::CapturingChannels => self.capture_channel_field(sample),
        }
    }

    fn capture_channel_field(&mut self, sample: Sample) -> Milestones {
        match self.field {
            ChannelField::Index => self.pending.index = sample,
            ChannelField::Center => self.pending.center = sample,
            ChannelField::Magnitude | ChannelField::MagnitudeDuplicate => {
                self.pending.magnitude = sample
            }
        }

        if self.field != ChannelField::MagnitudeDuplicate {
            self.field = self.field.next();
            return Milestones::empty();
        }

        self.frame.channels.push(self.pending);
        self.pending = ChannelEntry::default();
        self.field = ChannelField::Index;
        if self.frame.channels.len() as i64 == self.frame.channel_count {
            self.finish_frame();
            return Milestones::CHANNEL_TABLE_COMPLETE;
        }
        Milestones::empty()
    }

    fn begin_frame(&mut self) {
        self.frame.clear();
        self.frame.preamble_count = 1;
        self.complete = false;
        self.state = ExtractorState::CountingPreamble;
    }

    fn finish_frame(&mut self) {
        self.complete = true;
        self.frames_completed += 1;
        self.state = ExtractorState::SeekingPreamble;
    }
}

// ── Tests ────────────────────────────────────────────────────────
