//! Scanner Runtime
//!
//! Owns the dedicated frame worker that runs the scan session sequentially,
//! the extraction pool that reads card data off that path, and the channels
//! connecting both to the frame source and to whoever consumes results.

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::luhn;
use crate::capture::{Frame, FrameIntake};
use crate::config::AppConfig;
use crate::error::{ScanError, ScanResult};
use crate::session::{ExtractionJob, ScanPhase, ScanSession};
use crate::shared::{ExtractionReport, ScanMessage, SessionCommand, SessionStats};
use crate::vision::{Adapters, CardLocator, ExtractionPipeline, RectangleTracker};

/// Running scanner: frame intake in, scan messages out
pub struct CardScannerApp {
    intake: FrameIntake,
    control: Sender<SessionCommand>,
    messages: Receiver<ScanMessage>,
    stats: Arc<RwLock<SessionStats>>,
    worker: Option<JoinHandle<()>>,
}

impl CardScannerApp {
    /// Build the session from `config` and start the frame worker
    pub fn start(config: &AppConfig, adapters: Adapters) -> ScanResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.extraction.worker_threads)
            .thread_name(|i| format!("card-extract-{}", i))
            .build()
            .map_err(|e| ScanError::Worker(format!("extraction pool: {}", e)))?;

        let locator = CardLocator::with_config(
            adapters.rectangles.clone(),
            adapters.text_regions.clone(),
            config.detection.clone(),
        );
        let tracker = RectangleTracker::with_level(adapters.tracker.clone(), config.tracking.level);
        let pipeline = ExtractionPipeline::with_config(adapters.ocr.clone(), config.recognition.clone());

        let (frame_tx, frame_rx) = bounded(0);
        let (control_tx, control_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        let stats = Arc::new(RwLock::new(SessionStats::default()));

        let worker = ScanWorker {
            session: ScanSession::new(locator, tracker),
            pipeline,
            pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: config.extraction.max_in_flight,
            frames: frame_rx,
            control: control_rx,
            messages: message_tx,
            stats: stats.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("card-scan".to_string())
            .spawn(move || {
                info!("Scan worker starting...");
                worker.run();
                info!("Scan worker exiting...");
            })
            .map_err(|e| ScanError::Worker(format!("spawn: {}", e)))?;

        Ok(Self {
            intake: FrameIntake::new(frame_tx, stats.clone()),
            control: control_tx,
            messages: message_rx,
            stats,
            worker: Some(handle),
        })
    }

    /// Handle for the frame source
    pub fn intake(&self) -> FrameIntake {
        self.intake.clone()
    }

    /// Offer a frame; `false` when it was discarded as late
    pub fn submit(&self, frame: Frame) -> bool {
        self.intake.submit(frame)
    }

    /// Hand a frame to the worker, waiting until it is idle
    pub fn submit_blocking(&self, frame: Frame) -> ScanResult<()> {
        self.intake.submit_blocking(frame)
    }

    /// Scan messages, in the order they were produced
    pub fn messages(&self) -> &Receiver<ScanMessage> {
        &self.messages
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Drop the tracked card and search again from the next frame
    pub fn reset(&self) {
        let _ = self.control.send(SessionCommand::Reset);
    }

    /// Check if the frame worker is running
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the frame worker, then collect every remaining message, including
    /// reports from extractions still in flight, until `timeout` passes.
    /// Returns those messages with the final counters.
    pub fn finish(mut self, timeout: Duration) -> (Vec<ScanMessage>, SessionStats) {
        self.stop_worker();
        let stats = self.stats();

        let deadline = Instant::now() + timeout;
        let mut remaining = Vec::new();
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.messages.recv_timeout(wait) {
                Ok(message) => remaining.push(message),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Timed out waiting for extraction reports");
                    break;
                }
            }
        }
        (remaining, stats)
    }

    fn stop_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.control.send(SessionCommand::Shutdown);
            if handle.join().is_err() {
                warn!("Scan worker panicked");
            }
        }
    }
}

impl Drop for CardScannerApp {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// State owned by the frame worker thread
struct ScanWorker {
    session: ScanSession,
    pipeline: ExtractionPipeline,
    pool: rayon::ThreadPool,
    /// Extractions queued or running on the pool
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
    frames: Receiver<Arc<Frame>>,
    control: Receiver<SessionCommand>,
    messages: Sender<ScanMessage>,
    stats: Arc<RwLock<SessionStats>>,
}

impl ScanWorker {
    fn run(mut self) {
        loop {
            select! {
                recv(self.control) -> command => match command {
                    Ok(SessionCommand::Reset) => {
                        debug!("Session reset requested");
                        self.session.reset();
                    }
                    Ok(SessionCommand::Shutdown) | Err(_) => break,
                },
                recv(self.frames) -> frame => match frame {
                    Ok(frame) => self.handle_frame(frame),
                    Err(_) => break,
                },
            }
        }
        let _ = self.messages.send(ScanMessage::Stopped);
    }

    fn handle_frame(&mut self, frame: Arc<Frame>) {
        let sequence = frame.sequence;
        let outcome = self.session.process_frame(frame);
        let dispatched = outcome.job.map(|job| self.dispatch(job));

        {
            let mut stats = self.stats.write();
            stats.frames_processed += 1;
            if outcome.phase_changed {
                match outcome.phase {
                    ScanPhase::Tracking => stats.cards_located += 1,
                    ScanPhase::Searching => stats.cards_lost += 1,
                }
            }
            match dispatched {
                Some(true) => stats.extractions_dispatched += 1,
                Some(false) => stats.extractions_skipped += 1,
                None => {}
            }
        }

        if outcome.phase_changed {
            let _ = self.messages.send(ScanMessage::PhaseChanged {
                frame_sequence: sequence,
                phase: outcome.phase,
            });
        }
    }

    /// Run extraction on the pool; the job owns its frame and rectangle.
    /// Returns `false`, dropping the job, when `max_in_flight` extractions are
    /// already queued or running.
    fn dispatch(&self, job: ExtractionJob) -> bool {
        let Some(slot) = InFlightSlot::acquire(&self.in_flight, self.max_in_flight) else {
            debug!(
                "Frame {}: {} extractions in flight, skipping",
                job.frame.sequence, self.max_in_flight
            );
            return false;
        };

        let pipeline = self.pipeline.clone();
        let messages = self.messages.clone();

        self.pool.spawn(move || {
            let result = pipeline.extract(&job.frame, &job.rectangle);
            drop(slot);
            if let Some(number) = &result.card_number {
                debug!(
                    "Attempt {}: read {} (checksum {})",
                    job.attempt_id,
                    luhn::mask(number),
                    if luhn::is_valid(number) { "ok" } else { "bad" }
                );
            }

            let report = ExtractionReport {
                attempt_id: job.attempt_id,
                frame_sequence: job.frame.sequence,
                rectangle: job.rectangle,
                result,
            };
            // The receiver may already be gone after teardown
            let _ = messages.send(ScanMessage::Extracted(report));
        });
        true
    }
}

/// One reserved extraction slot, released on drop
struct InFlightSlot(Arc<AtomicUsize>);

impl InFlightSlot {
    fn acquire(counter: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| InFlightSlot(counter.clone()))
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
