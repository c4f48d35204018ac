//! Classifier output types.
//!
use std::{fmt, num::ParseIntError, str::FromStr};

/// Category code produced by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u16);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Label {
    fn from(code: u16) -> Self {
        Label(code)
    }
}

impl FromStr for Label {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Label)
    }
}

/// One classification result per processed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationSample {
    pub label: Label,
    /// Score of the winning class in `[0, 1]`.
    pub confidence: f32,
}

impl ClassificationSample {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self { label, confidence }
    }
}
