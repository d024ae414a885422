use bitflags::bitflags;

bitflags! {
    /// Frame assembly points reached during one extractor call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Milestones: u8 {
        /// The 16383rd sentinel was counted.
        const PREAMBLE_COMPLETE      = 1 << 0;
        /// The frequency word was stored.
        const FREQUENCY_CAPTURED     = 1 << 1;
        /// The mean vector reached its full length.
        const MEAN_VECTOR_COMPLETE   = 1 << 2;
        /// A zero channel count ended the frame.
        const EMPTY_FRAME            = 1 << 3;
        /// The last channel entry was written.
        const CHANNEL_TABLE_COMPLETE = 1 << 4;
    }
}

impl Milestones {
    /// Milestones that cause the sink to flush a batch.
    pub const FLUSH_GATES: Self = Self::FREQUENCY_CAPTURED
        .union(Self::MEAN_VECTOR_COMPLETE)
        .union(Self::CHANNEL_TABLE_COMPLETE);

    /// Milestones that mark the end of a frame.
    pub const FRAME_END: Self = Self::EMPTY_FRAME.union(Self::CHANNEL_TABLE_COMPLETE);

    pub fn gates_flush(self) -> bool {
        self.intersects(Self::FLUSH_GATES)
    }

    pub fn ends_frame(self) -> bool {
        self.intersects(Self::FRAME_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_and_empty_frame_do_not_gate_flush() {
        assert!(!Milestones::PREAMBLE_COMPLETE.gates_flush());
        assert!(!Milestones::EMPTY_FRAME.gates_flush());
        assert!(!Milestones::empty().gates_flush());
    }

    #[test]
    fn any_gate_is_enough() {
        assert!(Milestones::FREQUENCY_CAPTURED.gates_flush());
        assert!((Milestones::PREAMBLE_COMPLETE | Milestones::MEAN_VECTOR_COMPLETE).gates_flush());
        assert!(Milestones::CHANNEL_TABLE_COMPLETE.gates_flush());
    }

    #[test]
    fn frame_end() {
        assert!(Milestones::EMPTY_FRAME.ends_frame());
        assert!(Milestones::CHANNEL_TABLE_COMPLETE.ends_frame());
        assert!(!Milestones::MEAN_VECTOR_COMPLETE.ends_frame());
    }
}
