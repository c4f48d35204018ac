//! Frame processing pipeline.
//!
//! The capture callback hands frames to [`Pipeline::submit`], which never
//! blocks. A busy flag is raised when a frame is accepted and cleared by the
//! worker once the convert → classify → debounce → report cycle is done;
//! frames arriving in the meantime are dropped instead of queued. The worker
//! copies each frame out of the recycled channel slot before processing it.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use common::{Error, Frame, Result};
use image::RgbImage;
use thingbuf::mpsc::{
    blocking::{self, Receiver, Sender},
    errors::TrySendError,
};

use crate::{
    debounce::{AlertDebouncer, DebounceConfig},
    meter::METER,
    nn::Classifier,
    report::{FrameReport, Reporter},
    yuv::YuvConverter,
};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub debounce: DebounceConfig,
}

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// The worker was busy; the frame was discarded.
    Dropped,
}

pub struct Pipeline {
    tx: Option<Sender<Frame>>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Validate `config` and start the worker thread.
    pub fn open<C, R>(config: &PipelineConfig, classifier: C, reporter: R) -> Result<Self>
    where
        C: Classifier + Send + 'static,
        R: Reporter + Send + 'static,
    {
        let debouncer = AlertDebouncer::new(&config.debounce)?;
        let (tx, rx) = blocking::channel(1);
        let busy = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            busy: busy.clone(),
            frame: Frame::default(),
            converter: YuvConverter::new(),
            image: RgbImage::new(0, 0),
            classifier,
            debouncer,
            reporter,
            last_cycle: Instant::now(),
        };
        let handle = thread::Builder::new()
            .name("inference".to_owned())
            .spawn(move || worker.run(rx))?;

        log::info!(
            "Pipeline open (history {}, cooldown {}ms)",
            config.debounce.history_len,
            config.debounce.cooldown.as_millis()
        );

        Ok(Self {
            tx: Some(tx),
            busy,
            worker: Some(handle),
        })
    }

    /// Offer a frame to the worker without blocking.
    ///
    /// The frame is copied into the recycled slot, the caller keeps ownership.
    pub fn submit(&self, frame: &Frame) -> Result<Submission> {
        let tx = self.tx.as_ref().ok_or(Error::Closed)?;
        if self.worker_finished() {
            return Err(Error::Closed);
        }
        METER.tick_submitted();

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(self.drop_frame(frame));
        }

        match tx.try_send_ref() {
            Ok(mut slot) => {
                slot.copy_from(frame);
                Ok(Submission::Accepted)
            }
            Err(TrySendError::Closed(_)) => {
                self.busy.store(false, Ordering::Release);
                Err(Error::Closed)
            }
            Err(_) => {
                self.busy.store(false, Ordering::Release);
                Ok(self.drop_frame(frame))
            }
        }
    }

    /// Stop accepting frames, finish the frame in flight and join the worker.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn drop_frame(&self, frame: &Frame) -> Submission {
        METER.tick_dropped();
        log::trace!("Dropping frame {}, worker busy", frame.sequence);
        Submission::Dropped
    }

    fn worker_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    fn shutdown(&mut self) -> Result<()> {
        // Dropping the sender ends the worker loop
        drop(self.tx.take());

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Inference worker panicked");
                return Err(Error::Closed);
            }
            log::info!("Pipeline closed");
        }

        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown().ok();
    }
}

/// State owned by the worker thread.
struct Worker<C, R> {
    /// Raised by `submit`, cleared at the end of each cycle.
    busy: Arc<AtomicBool>,
    frame: Frame,
    converter: YuvConverter,
    image: RgbImage,
    classifier: C,
    debouncer: AlertDebouncer,
    reporter: R,
    last_cycle: Instant,
}

impl<C: Classifier, R: Reporter> Worker<C, R> {
    fn run(mut self, rx: Receiver<Frame>) {
        log::debug!("Inference worker started");

        while let Some(slot) = rx.recv_ref() {
            self.frame.copy_from(&slot);
            drop(slot);

            self.process();
            self.busy.store(false, Ordering::Release);
        }

        log::debug!("Inference worker stopped");
    }

    fn process(&mut self) {
        let frame = &self.frame;
        if let Err(err) = self.converter.convert_rgb_image(frame, &mut self.image) {
            log::warn!("Skipping frame {}: {}", frame.sequence, err);
            return;
        }

        let start = Instant::now();
        let sample = match self.classifier.classify(&self.image) {
            Ok(sample) => sample,
            Err(err) => {
                log::warn!("Classification of frame {} failed: {:#}", frame.sequence, err);
                return;
            }
        };
        let inference_time = start.elapsed();

        let now = Instant::now();
        let alert = self
            .debouncer
            .update(sample.label, now.duration_since(self.last_cycle));
        self.last_cycle = now;
        METER.tick_processed();

        self.reporter.on_frame(&FrameReport {
            sequence: frame.sequence,
            image: &self.image,
            sample,
            state: self.debouncer.state(),
            inference_time,
        });

        if let Some(alert) = alert {
            METER.tick_alert();
            self.reporter.on_alert(&alert);
        }
    }
}
