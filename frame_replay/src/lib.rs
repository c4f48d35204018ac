//! Replays recorded camera frames through the danger detection pipeline.
pub mod sources;
