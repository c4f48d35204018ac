//! Hand-off to the display and speech layers.
//!
use std::time::Duration;

use common::ClassificationSample;
use image::RgbImage;

use crate::{debounce::SafetyState, labels::AlertMessage};

/// Outcome of one processed frame.
#[derive(Debug)]
pub struct FrameReport<'a> {
    pub sequence: u64,
    /// Converted crop region, valid until the callback returns.
    pub image: &'a RgbImage,
    pub sample: ClassificationSample,
    pub state: SafetyState,
    pub inference_time: Duration,
}

/// Receiver of pipeline output, called on the worker thread.
pub trait Reporter {
    /// Called once per processed frame.
    fn on_frame(&mut self, _report: &FrameReport<'_>) {}

    /// Called with each message that should be spoken.
    fn on_alert(&mut self, alert: &AlertMessage);
}

/// Reporter that only writes to the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_frame(&mut self, report: &FrameReport<'_>) {
        log::debug!(
            "frame {}: class : {}, prob : {:.2}%, time : {}ms, state : {:?}",
            report.sequence,
            report.sample.label,
            report.sample.confidence * 100.0,
            report.inference_time.as_millis(),
            report.state
        );
    }

    fn on_alert(&mut self, alert: &AlertMessage) {
        log::info!("Alert ({}): {}", alert.label, alert);
    }
}
