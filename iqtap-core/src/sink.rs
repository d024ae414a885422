//! Streaming sink: frame-gated flushes of the sample stream to TCP.
//!
//! Every batch is fed through the extractor. The network is only touched
//! when a batch reaches a flush milestone, and then the real component of
//! each input sample goes out as a native-endian `f32`.

use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use crate::error::IqtapError;
use crate::frame::{ExtractorState, FrameExtractor, Milestones, Sample};
use crate::transport::{Role, TransportConfig, TransportManager, WriteStatus};

/// Size in bytes of one input item element.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<Sample>();

/// Bytes per channel entry on the wire: three fields of `f32`.
const CHANNEL_WIRE_BYTES: usize = 3 * std::mem::size_of::<f32>();

// ── SinkConfig ───────────────────────────────────────────────────

/// Construction parameters. Immutable once the sink exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Bytes per sample; must equal [`SAMPLE_SIZE`].
    pub item_size: usize,
    /// Samples per input item.
    pub vec_len: usize,
    pub host: String,
    pub port: u16,
    pub role: Role,
    /// Also flush every batch that ends inside the mean vector.
    pub stream_mean_vector: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            item_size: SAMPLE_SIZE,
            vec_len: 1,
            host: "0.0.0.0".into(),
            port: 9000,
            role: Role::Server,
            stream_mean_vector: false,
        }
    }
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), IqtapError> {
        if self.item_size != SAMPLE_SIZE {
            return Err(IqtapError::InvalidConfig(format!(
                "item_size must be {SAMPLE_SIZE}, got {}",
                self.item_size
            )));
        }
        if self.vec_len == 0 {
            return Err(IqtapError::InvalidConfig("vec_len must be at least 1".into()));
        }
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            role: self.role,
            host: self.host.clone(),
            port: self.port,
        }
    }
}

// ── WorkStatus / SinkStats ───────────────────────────────────────

/// Result of one [`Sink::work`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Input items consumed.
    Consumed(usize),
    /// The upstream server closed the connection; stop calling `work`.
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Calls to `work` that processed input.
    pub batches: u64,
    /// Batches that produced a network write.
    pub flushes: u64,
    pub bytes_sent: u64,
    /// Writes that found the peer gone.
    pub disconnects: u64,
}

// ── Sink ─────────────────────────────────────────────────────────

pub struct Sink {
    config: SinkConfig,
    extractor: FrameExtractor,
    transport: TransportManager,
    /// Reused per-batch byte projection.
    projection: BytesMut,
    stats: SinkStats,
    done: bool,
    last_milestones: Milestones,
}

impl Sink {
    pub fn new(config: SinkConfig) -> Result<Self, IqtapError> {
        config.validate()?;
        let transport = TransportManager::new(config.transport_config())?;
        Ok(Self {
            config,
            extractor: FrameExtractor::new(),
            transport,
            projection: BytesMut::new(),
            stats: SinkStats::default(),
            done: false,
            last_milestones: Milestones::empty(),
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Connect or begin listening, per the configured role.
    pub fn start(&mut self) -> Result<(), IqtapError> {
        self.transport.start()
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Milestones reached by the most recent batch.
    pub fn last_milestones(&self) -> Milestones {
        self.last_milestones
    }

    /// Consume one batch of samples.
    ///
    /// Blocks on the socket while a flush is in progress.
    pub fn work(&mut self, samples: &[Sample]) -> WorkStatus {
        if self.done {
            return WorkStatus::Done;
        }
        let items = samples.len() / self.config.vec_len;

        let mut milestones = Milestones::empty();
        let mut table_len = None;
        for &sample in samples {
            let step = self.extractor.push(sample);
            if step.milestones.contains(Milestones::CHANNEL_TABLE_COMPLETE) {
                table_len = Some(self.extractor.frame().channel_count);
            }
            milestones |= step.milestones;
        }
        self.last_milestones = milestones;
        self.stats.batches += 1;

        if !self.transport.is_connected() {
            return WorkStatus::Consumed(items);
        }

        let streaming = self.config.stream_mean_vector
            && self.extractor.state() == ExtractorState::CapturingMeanVector;
        if !milestones.gates_flush() && !streaming {
            return WorkStatus::Consumed(items);
        }

        self.projection.clear();
        self.projection.reserve(samples.len() * std::mem::size_of::<f32>());
        for sample in samples {
            self.projection.put_f32_ne(sample.re);
        }

        let len = match table_len {
            Some(count) => {
                let wanted = usize::try_from(count).unwrap_or(0) * CHANNEL_WIRE_BYTES;
                wanted.min(self.projection.len())
            }
            None => self.projection.len(),
        };
        if len == 0 {
            return WorkStatus::Consumed(items);
        }

        let status = self.transport.write(&self.projection[..len]);
        self.stats.bytes_sent += status.sent() as u64;
        match status {
            WriteStatus::Sent(sent) => {
                debug!(sent, ?milestones, "flushed");
                self.stats.flushes += 1;
            }
            WriteStatus::Disconnected { .. } => {
                self.stats.disconnects += 1;
            }
            WriteStatus::EndOfStream { .. } => {
                self.stats.disconnects += 1;
                info!("upstream closed; sink done");
                self.done = true;
                return WorkStatus::Done;
            }
            WriteStatus::Failed { .. } | WriteStatus::NotConnected => {}
        }
        WorkStatus::Consumed(items)
    }
}

// ── Tests ────────────────────────────────────────────────────────
