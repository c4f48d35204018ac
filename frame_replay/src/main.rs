//! Frame replay binary.
//!
use std::{fs, path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use common::{ClassificationSample, CropRect, Label};
use danger_core::{
    meter::spawn_meter_logger,
    nn::load_labels,
    AlertMessage, Classifier, DebounceConfig, FrameReport, LogReporter, OnnxClassifier,
    OnnxConfig, Pipeline, PipelineConfig, Reporter, TensorLayout,
};
use env_logger::TimestampPrecision;
use frame_replay::sources::{get_capture_fn_file, parse_crop, RawFormat};
use image::RgbImage;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Raw YUV 4:2:0 recording to replay
    #[clap(long)]
    input: PathBuf,

    /// Frame width in pixels
    #[clap(long)]
    width: u32,

    /// Frame height in pixels
    #[clap(long)]
    height: u32,

    /// Frame layout of the recording
    #[clap(long, value_enum, default_value = "nv21")]
    format: RawFormat,

    /// Frames submitted per second
    #[clap(long, default_value = "30")]
    fps: u32,

    /// Crop rectangle as left,top,right,bottom
    #[clap(long, value_parser = parse_crop)]
    crop: Option<CropRect>,

    /// Start over at the end of the recording
    #[clap(long)]
    repeat: bool,

    /// ONNX image classification model
    #[clap(long)]
    model: Option<PathBuf>,

    /// Label file mapping model outputs to category codes
    #[clap(long)]
    labels: Option<PathBuf>,

    /// Width and height of the model input
    #[clap(long, default_value = "224")]
    input_size: u32,

    /// Memory layout of the model input
    #[clap(long, value_enum, default_value = "nhwc")]
    layout: LayoutArg,

    /// Camera sensor rotation in degrees
    #[clap(long, default_value = "0")]
    sensor_orientation: u32,

    /// Apply softmax to the model output
    #[clap(long)]
    softmax: bool,

    /// Label reported for every frame when no model is given
    #[clap(long, default_value = "0")]
    fixed_label: u16,

    /// Number of frames in the alert voting window
    #[clap(long, default_value = "20")]
    history: usize,

    /// Minimum time between two alerts in milliseconds
    #[clap(long, default_value = "1500")]
    cooldown_ms: u64,

    /// Directory for PNG snapshots of converted frames
    #[clap(long)]
    snapshot_dir: Option<PathBuf>,

    /// Save every n-th processed frame
    #[clap(long, default_value = "30")]
    snapshot_every: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LayoutArg {
    Nhwc,
    Nchw,
}

impl From<LayoutArg> for TensorLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Nhwc => TensorLayout::Nhwc,
            LayoutArg::Nchw => TensorLayout::Nchw,
        }
    }
}

/// Stand-in classifier for running without a model.
struct FixedLabel(Label);

impl Classifier for FixedLabel {
    fn classify(&mut self, _image: &RgbImage) -> Result<ClassificationSample> {
        Ok(ClassificationSample::new(self.0, 1.0))
    }
}

/// Logs every frame, prints alerts for the speech layer and optionally
/// stores snapshots of the converted frames.
struct ReplayReporter {
    log: LogReporter,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: u64,
}

impl Reporter for ReplayReporter {
    fn on_frame(&mut self, report: &FrameReport<'_>) {
        self.log.on_frame(report);

        if let Some(dir) = &self.snapshot_dir {
            if report.sequence % self.snapshot_every == 0 {
                let path = dir.join(format!("frame_{:06}.png", report.sequence));
                if let Err(err) = report.image.save(&path) {
                    log::warn!("Failed to save {}: {}", path.display(), err);
                }
            }
        }
    }

    fn on_alert(&mut self, alert: &AlertMessage) {
        self.log.on_alert(alert);
        println!("{alert}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let mut capture_fn = get_capture_fn_file(
        &args.input,
        args.format,
        (args.width, args.height),
        args.crop,
        args.repeat,
    )?;

    if let Some(dir) = &args.snapshot_dir {
        fs::create_dir_all(dir)?;
    }
    let reporter = ReplayReporter {
        log: LogReporter,
        snapshot_dir: args.snapshot_dir.clone(),
        snapshot_every: args.snapshot_every.max(1),
    };

    let config = PipelineConfig {
        debounce: DebounceConfig {
            history_len: args.history,
            cooldown: Duration::from_millis(args.cooldown_ms),
            ..Default::default()
        },
    };

    let pipeline = match &args.model {
        Some(model) => {
            let labels = match &args.labels {
                Some(path) => load_labels(path)?,
                None => vec![],
            };
            let onnx_config = OnnxConfig {
                input_width: args.input_size,
                input_height: args.input_size,
                layout: args.layout.into(),
                sensor_orientation: args.sensor_orientation,
                softmax: args.softmax,
            };
            let classifier = OnnxClassifier::new(model, labels, onnx_config)?;
            Pipeline::open(&config, classifier, reporter)?
        }
        None => {
            log::warn!(
                "No model given, every frame is labelled {}",
                args.fixed_label
            );
            Pipeline::open(&config, FixedLabel(Label(args.fixed_label)), reporter)?
        }
    };

    spawn_meter_logger();

    let mut frame_interval = interval(Duration::from_secs_f64(1.0 / args.fps.max(1) as f64));
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = frame_interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }

        let Some(frame) = capture_fn() else {
            break;
        };
        pipeline.submit(&frame)?;
    }

    tokio::task::spawn_blocking(move || pipeline.close()).await??;

    Ok(())
}
