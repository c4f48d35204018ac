//! Frame classification.
//!
//! The pipeline only knows the [`Classifier`] trait. [`OnnxClassifier`] is
//! the bundled backend running an image classification network with tract.
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use common::{ClassificationSample, Label};
use image::{
    imageops::{self, FilterType},
    RgbImage,
};
use tract_onnx::prelude::*;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Black-box producer of one label per frame.
pub trait Classifier {
    fn classify(&mut self, image: &RgbImage) -> Result<ClassificationSample>;
}

/// Memory layout of the network input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `1 x H x W x 3`, as exported from TFLite/Keras.
    Nhwc,
    /// `1 x 3 x H x W`, as exported from PyTorch.
    Nchw,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub layout: TensorLayout,
    /// Camera sensor rotation in degrees, a multiple of 90.
    pub sensor_orientation: u32,
    /// Turn raw logits into probabilities before picking the winner.
    pub softmax: bool,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            input_width: 224,
            input_height: 224,
            layout: TensorLayout::Nhwc,
            sensor_orientation: 0,
            softmax: false,
        }
    }
}

pub struct OnnxClassifier {
    model: NnModel,
    config: OnnxConfig,
    /// Label code of every output index. Empty means index == code.
    labels: Vec<Label>,
}

impl OnnxClassifier {
    pub fn new(model_path: impl AsRef<Path>, labels: Vec<Label>, config: OnnxConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = get_model(model_path, &config)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;

        log::info!(
            "Loaded {} ({}x{} {:?}, {} labels)",
            model_path.display(),
            config.input_width,
            config.input_height,
            config.layout,
            labels.len()
        );

        Ok(Self {
            model,
            config,
            labels,
        })
    }

    fn postproc(&self, scores: Vec<f32>) -> Result<ClassificationSample> {
        let scores = if self.config.softmax {
            softmax(&scores)
        } else {
            scores
        };
        let (index, confidence) = argmax(&scores).ok_or_else(|| anyhow!("model returned no scores"))?;

        let label = if self.labels.is_empty() {
            Label(u16::try_from(index)?)
        } else {
            *self
                .labels
                .get(index)
                .ok_or_else(|| anyhow!("no label for output index {index}"))?
        };

        Ok(ClassificationSample::new(label, confidence))
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<ClassificationSample> {
        let input = to_tensor(&preprocess(image, &self.config), self.config.layout);
        let raw_nn_out = self.model.run(tvec!(input.into()))?;

        let scores: Vec<f32> = raw_nn_out[0]
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();

        self.postproc(scores)
    }
}

fn get_model(path: &Path, config: &OnnxConfig) -> Result<NnModel> {
    let (width, height) = (config.input_width as usize, config.input_height as usize);
    let shape = match config.layout {
        TensorLayout::Nhwc => tvec!(1, height, width, 3),
        TensorLayout::Nchw => tvec!(1, 3, height, width),
    };
    let input_fact = InferenceFact::dt_shape(f32::datum_type(), shape);

    let model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

/// Center crop to a square, resize to the network input and undo the sensor
/// rotation with counter-clockwise quarter turns.
pub fn preprocess(image: &RgbImage, config: &OnnxConfig) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    let square = imageops::crop_imm(image, (width - side) / 2, (height - side) / 2, side, side)
        .to_image();

    let quarter_turns = (config.sensor_orientation / 90) % 4;
    // Odd turns swap the axes, so resize to the transposed size first
    let (resize_width, resize_height) = if quarter_turns % 2 == 1 {
        (config.input_height, config.input_width)
    } else {
        (config.input_width, config.input_height)
    };
    let resized = imageops::resize(&square, resize_width, resize_height, FilterType::Nearest);

    match quarter_turns {
        1 => imageops::rotate270(&resized),
        2 => imageops::rotate180(&resized),
        3 => imageops::rotate90(&resized),
        _ => resized,
    }
}

/// Raw `0..255` channel values in the requested layout.
fn to_tensor(image: &RgbImage, layout: TensorLayout) -> Tensor {
    let (width, height) = (image.width() as usize, image.height() as usize);

    match layout {
        TensorLayout::Nhwc => {
            tract_ndarray::Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
                image[(x as _, y as _)][c] as f32
            })
            .into()
        }
        TensorLayout::Nchw => {
            tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
                image[(x as _, y as _)][c] as f32
            })
            .into()
        }
    }
}

/// Index and value of the highest score.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((index, score)),
        })
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Parse a label file: one integer code per output index, blank lines skipped.
pub fn parse_labels(content: &str) -> Result<Vec<Label>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            line.parse()
                .with_context(|| format!("label {index} is not a category code: {line:?}"))
        })
        .collect()
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<Label>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels {}", path.display()))?;
    parse_labels(&content)
}
