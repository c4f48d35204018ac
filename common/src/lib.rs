//! Common code shared between `danger_core` and `frame_replay`.
pub mod classification;
pub mod error;
pub mod frame;

pub use classification::{ClassificationSample, Label};
pub use error::{Error, Result};
pub use frame::{CropRect, Frame, Plane};
