use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use common::{ClassificationSample, CropRect, Error, Frame, Label};
use danger_core::{
    AlertMessage, Classifier, DangerCategory, DebounceConfig, FrameReport, Pipeline,
    PipelineConfig, Reporter, SafetyState, Submission,
};
use image::RgbImage;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Always returns the same label.
struct FixedClassifier(Label);

impl Classifier for FixedClassifier {
    fn classify(&mut self, _image: &RgbImage) -> anyhow::Result<ClassificationSample> {
        Ok(ClassificationSample::new(self.0, 0.9))
    }
}

/// Signals when it starts and waits for permission to finish.
struct GatedClassifier {
    started: Sender<()>,
    gate: Receiver<()>,
}

impl Classifier for GatedClassifier {
    fn classify(&mut self, _image: &RgbImage) -> anyhow::Result<ClassificationSample> {
        self.started.send(()).ok();
        self.gate.recv_timeout(TIMEOUT)?;
        Ok(ClassificationSample::new(Label(0), 1.0))
    }
}

/// Brings the worker thread down.
struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn classify(&mut self, _image: &RgbImage) -> anyhow::Result<ClassificationSample> {
        panic!("classifier crashed");
    }
}

struct ChannelReporter {
    frames: Sender<(u64, (u32, u32), SafetyState)>,
    alerts: Sender<AlertMessage>,
}

impl Reporter for ChannelReporter {
    fn on_frame(&mut self, report: &FrameReport<'_>) {
        self.frames
            .send((report.sequence, report.image.dimensions(), report.state))
            .ok();
    }

    fn on_alert(&mut self, alert: &AlertMessage) {
        self.alerts.send(*alert).ok();
    }
}

fn channel_reporter() -> (
    ChannelReporter,
    Receiver<(u64, (u32, u32), SafetyState)>,
    Receiver<AlertMessage>,
) {
    let (frames_tx, frames_rx) = mpsc::channel();
    let (alerts_tx, alerts_rx) = mpsc::channel();
    let reporter = ChannelReporter {
        frames: frames_tx,
        alerts: alerts_tx,
    };
    (reporter, frames_rx, alerts_rx)
}

fn gray_frame(sequence: u64) -> Frame {
    Frame::i420(8, 6, &[128; 8 * 6 * 3 / 2])
        .unwrap()
        .with_timestamp(sequence, sequence * 33_000_000)
}

fn submit_until_accepted(pipeline: &Pipeline, frame: &Frame) -> Result<(), Error> {
    loop {
        match pipeline.submit(frame)? {
            Submission::Accepted => return Ok(()),
            Submission::Dropped => thread::sleep(Duration::from_millis(1)),
        }
    }
}

#[test]
fn test_alert_reaches_reporter() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig {
        debounce: DebounceConfig {
            history_len: 2,
            cooldown: Duration::ZERO,
            initial_label: Label(5),
            ..Default::default()
        },
    };
    let (reporter, frames, alerts) = channel_reporter();
    let pipeline = Pipeline::open(&config, FixedClassifier(Label(5)), reporter)?;

    assert_eq!(pipeline.submit(&gray_frame(1))?, Submission::Accepted);

    let (sequence, dimensions, state) = frames.recv_timeout(TIMEOUT)?;
    assert_eq!(sequence, 1);
    assert_eq!(dimensions, (8, 6));
    assert_eq!(state, SafetyState::Unsafe);

    let alert = alerts.recv_timeout(TIMEOUT)?;
    assert_eq!(alert.category, DangerCategory::Vehicle);
    assert_eq!(alert.text(), "There is a vehicle ahead");

    pipeline.close()?;

    Ok(())
}

#[test]
fn test_frames_are_dropped_while_busy() -> Result<(), Box<dyn std::error::Error>> {
    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let classifier = GatedClassifier {
        started: started_tx,
        gate: gate_rx,
    };
    let (reporter, frames, _alerts) = channel_reporter();
    let pipeline = Pipeline::open(&PipelineConfig::default(), classifier, reporter)?;

    assert_eq!(pipeline.submit(&gray_frame(1))?, Submission::Accepted);
    started_rx.recv_timeout(TIMEOUT)?;

    for sequence in 2..5 {
        let start = Instant::now();
        assert_eq!(pipeline.submit(&gray_frame(sequence))?, Submission::Dropped);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    gate_tx.send(())?;
    let (sequence, _, state) = frames.recv_timeout(TIMEOUT)?;
    assert_eq!(sequence, 1);
    assert_eq!(state, SafetyState::Safe);

    // The worker takes frames again once the cycle is done
    submit_until_accepted(&pipeline, &gray_frame(5))?;
    started_rx.recv_timeout(TIMEOUT)?;
    gate_tx.send(())?;
    let (sequence, _, _) = frames.recv_timeout(TIMEOUT)?;
    assert_eq!(sequence, 5);

    pipeline.close()?;
    assert!(frames.try_recv().is_err());

    Ok(())
}

#[test]
fn test_submit_fails_after_worker_died() -> Result<(), Box<dyn std::error::Error>> {
    let (reporter, _frames, _alerts) = channel_reporter();
    let pipeline = Pipeline::open(&PipelineConfig::default(), PanickingClassifier, reporter)?;

    assert_eq!(pipeline.submit(&gray_frame(1))?, Submission::Accepted);

    let deadline = Instant::now() + TIMEOUT;
    let res = loop {
        match pipeline.submit(&gray_frame(2)) {
            Ok(Submission::Accepted) => panic!("frame accepted by a dead worker"),
            Ok(Submission::Dropped) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(1))
            }
            res => break res,
        }
    };
    assert!(matches!(res, Err(Error::Closed)));
    assert!(matches!(pipeline.submit(&gray_frame(3)), Err(Error::Closed)));
    assert!(matches!(pipeline.close(), Err(Error::Closed)));

    Ok(())
}

#[test]
fn test_invalid_frame_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let (reporter, frames, _alerts) = channel_reporter();
    let pipeline = Pipeline::open(
        &PipelineConfig::default(),
        FixedClassifier(Label(0)),
        reporter,
    )?;

    let broken = gray_frame(1).with_crop(CropRect::new(0, 0, 16, 6));
    assert_eq!(pipeline.submit(&broken)?, Submission::Accepted);

    let cropped = gray_frame(2).with_crop(CropRect::new(2, 2, 6, 6));
    submit_until_accepted(&pipeline, &cropped)?;

    let (sequence, dimensions, _) = frames.recv_timeout(TIMEOUT)?;
    assert_eq!(sequence, 2);
    assert_eq!(dimensions, (4, 4));

    pipeline.close()?;

    Ok(())
}

#[test]
fn test_open_rejects_empty_history() {
    let config = PipelineConfig {
        debounce: DebounceConfig {
            history_len: 0,
            ..Default::default()
        },
    };
    let (reporter, _frames, _alerts) = channel_reporter();

    let res = Pipeline::open(&config, FixedClassifier(Label(0)), reporter);
    assert!(matches!(res, Err(Error::InvalidConfig { .. })));
}
