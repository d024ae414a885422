//! Host loop: reads a sample stream and drives the sink or the tap.
//!
//! Runs on the caller's thread. The sink's transport keeps its own
//! background runtime, so nothing here may run inside a Tokio runtime.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use iqtap_core::{FrameExtractor, Milestones, Role, Sample, Sink, SinkStats, Tap, WorkStatus};

use crate::config::SinkHostConfig;
use crate::input::{SampleReader, write_samples};

// ── SinkService ──────────────────────────────────────────────────

/// Owns the configuration and the stop flag for one run.
pub struct SinkService {
    config: SinkHostConfig,
    running: Arc<AtomicBool>,
}

impl SinkService {
    pub fn new(config: SinkHostConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop after the current batch.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stream `input` to the network sink until end of input, a stop
    /// request, or the upstream server closing the connection.
    pub fn run_sink<R: Read>(&self, input: R) -> Result<SinkStats, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let mut sink = Sink::new(self.config.to_sink_config())?;
        sink.start()?;
        match (sink.transport().role(), sink.transport().local_addr()) {
            (Role::Server, Some(addr)) => info!(%addr, "sink listening"),
            (role, _) => info!(%role, "sink started"),
        }

        let mut reader = SampleReader::new(input, self.config.batch_samples());
        while self.is_running() {
            let Some(batch) = reader.next_batch()? else {
                info!("end of input");
                break;
            };
            let status = sink.work(batch);
            log_frame_events(sink.last_milestones(), sink.extractor());
            if status == WorkStatus::Done {
                break;
            }
        }

        sink.stop();
        self.running.store(false, Ordering::SeqCst);

        let stats = sink.stats();
        info!(
            batches = stats.batches,
            flushes = stats.flushes,
            bytes_sent = stats.bytes_sent,
            disconnects = stats.disconnects,
            "sink stopped"
        );
        Ok(stats)
    }

    /// Copy `input` to `output` unchanged while logging frame events.
    ///
    /// Returns the number of samples passed through.
    pub fn run_tap<R: Read, W: Write>(
        &self,
        input: R,
        mut output: W,
    ) -> Result<u64, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let mut tap = Tap::new();
        let mut reader = SampleReader::new(input, self.config.batch_samples());
        let mut out = vec![Sample::default(); self.config.batch_samples()];
        let mut total = 0u64;

        while self.is_running() {
            let Some(batch) = reader.next_batch()? else {
                break;
            };
            let n = tap.work(batch, &mut out);
            write_samples(&mut output, &out[..n])?;
            total += n as u64;
            log_frame_events(tap.take_milestones(), tap.extractor());
        }

        output.flush()?;
        self.running.store(false, Ordering::SeqCst);
        info!(samples = total, frames = tap.extractor().frames_completed(), "tap finished");
        Ok(total)
    }
}

fn log_frame_events(milestones: Milestones, extractor: &FrameExtractor) {
    if !milestones.ends_frame() {
        return;
    }
    match extractor.completed_frame() {
        Some(frame) => info!(
            frequency = frame.frequency.re,
            channels = frame.channels.len(),
            frames = extractor.frames_completed(),
            "frame captured"
        ),
        // A new preamble started later in the same batch.
        None => warn!("frame completed and superseded within one batch"),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;
    use iqtap_core::frame::encode_frame;
    use iqtap_core::{MEAN_VECTOR_LEN, PREAMBLE_LEN};

    fn frame_bytes() -> (Vec<Sample>, Vec<u8>) {
        let mean = vec![Sample::new(0.5, 0.5); MEAN_VECTOR_LEN];
        let mut samples = Vec::new();
        encode_frame(&mut samples, PREAMBLE_LEN as usize, Sample::new(433.0, 0.0), &mean, &[])
            .unwrap();
        let mut bytes = Vec::new();
        write_samples(&mut bytes, &samples).unwrap();
        (samples, bytes)
    }

    #[test]
    fn service_creates_stopped() {
        let svc = SinkService::new(SinkHostConfig::default());
        assert!(!svc.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let svc = SinkService::new(SinkHostConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[test]
    fn tap_output_matches_input() {
        let (samples, bytes) = frame_bytes();
        let svc = SinkService::new(SinkHostConfig::default());
        let mut out = Vec::new();

        let total = svc.run_tap(bytes.as_slice(), &mut out).unwrap();
        assert_eq!(total, samples.len() as u64);
        assert_eq!(out, bytes);
    }

    #[test]
    fn sink_without_peer_consumes_everything() {
        let (_, bytes) = frame_bytes();
        let mut cfg = SinkHostConfig::default();
        cfg.network.host = "127.0.0.1".into();
        cfg.network.port = 0;

        let stats = SinkService::new(cfg).run_sink(bytes.as_slice()).unwrap();
        assert_eq!(stats.bytes_sent, 0);
        assert!(stats.batches > 0);
    }

    #[test]
    fn client_connect_failure_is_reported() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut cfg = SinkHostConfig::default();
        cfg.network.role = Role::Client;
        cfg.network.host = "127.0.0.1".into();
        cfg.network.port = port;

        assert!(SinkService::new(cfg).run_sink(std::io::empty()).is_err());
    }
}
