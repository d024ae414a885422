//! Passthrough stage: observes frames while copying samples through.

use crate::frame::{FrameExtractor, Milestones, Sample};

/// Sits transparently in a stream and exposes the frame fields it sees.
///
/// Rate is 1:1. Output slot `i` always holds input sample `i`.
#[derive(Debug, Default)]
pub struct Tap {
    extractor: FrameExtractor,
    seen: Milestones,
}

impl Tap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `input` to `output` while feeding the extractor.
    ///
    /// Processes `min(input.len(), output.len())` samples and returns
    /// that count.
    pub fn work(&mut self, input: &[Sample], output: &mut [Sample]) -> usize {
        let n = input.len().min(output.len());
        for (out, &sample) in output[..n].iter_mut().zip(&input[..n]) {
            let step = self.extractor.push(sample);
            self.seen |= step.milestones;
            *out = step.sample;
        }
        n
    }

    /// Frame telemetry.
    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    /// Milestones seen since the previous call.
    pub fn take_milestones(&mut self) -> Milestones {
        std::mem::take(&mut self.seen)
    }
}
