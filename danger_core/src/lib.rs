//! Camera frame to spoken danger alert: YUV conversion, classification seam,
//! label debouncing and the worker pipeline tying them together.
pub mod debounce;
pub mod labels;
pub mod meter;
pub mod nn;
pub mod pipeline;
pub mod report;
pub mod yuv;

pub use debounce::{AlertDebouncer, DebounceConfig, SafetyState};
pub use labels::{AlertMessage, DangerCategory};
pub use nn::{Classifier, OnnxClassifier, OnnxConfig, TensorLayout};
pub use pipeline::{Pipeline, PipelineConfig, Submission};
pub use report::{FrameReport, LogReporter, Reporter};
pub use yuv::{PixelLayout, YuvConverter};
