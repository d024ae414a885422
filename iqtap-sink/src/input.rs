//! Raw complex32 sample stream decoding.
//!
//! The input is interleaved native-endian `f32` pairs (`re`, `im`), the
//! layout of a raw `.cf32` capture file.

use std::io::{self, Read, Write};

use iqtap_core::{SAMPLE_SIZE, Sample};
use tracing::warn;

/// Reads fixed-size batches of samples from a byte stream.
pub struct SampleReader<R> {
    inner: R,
    bytes: Vec<u8>,
    samples: Vec<Sample>,
    eof: bool,
}

impl<R: Read> SampleReader<R> {
    pub fn new(inner: R, batch: usize) -> Self {
        Self {
            inner,
            bytes: vec![0; batch.max(1) * SAMPLE_SIZE],
            samples: Vec::with_capacity(batch.max(1)),
            eof: false,
        }
    }

    /// Next batch, short only at end of input. `None` once exhausted.
    pub fn next_batch(&mut self) -> io::Result<Option<&[Sample]>> {
        if self.eof {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.inner.read(&mut self.bytes[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let whole = filled - filled % SAMPLE_SIZE;
        if whole < filled {
            warn!(trailing = filled - whole, "input ends mid-sample; dropping partial sample");
        }

        self.samples.clear();
        self.samples.extend(self.bytes[..whole].chunks_exact(SAMPLE_SIZE).map(|c| {
            Sample::new(
                f32::from_ne_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_ne_bytes([c[4], c[5], c[6], c[7]]),
            )
        }));

        if self.samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.samples.as_slice()))
    }
}

/// Write samples in the same interleaved layout.
pub fn write_samples<W: Write>(out: &mut W, samples: &[Sample]) -> io::Result<()> {
    for s in samples {
        out.write_all(&s.re.to_ne_bytes())?;
        out.write_all(&s.im.to_ne_bytes())?;
    }
    Ok(())
}
