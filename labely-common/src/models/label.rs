//! Submitted label shapes
//!
//! On the wire a label is either a bare JSON string (categorical and
//! sentiment choices), `{"boxes": [...]}` or `{"strokes": [...]}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    /// A category name, sentiment, or free-form class text
    Choice(String),
    Boxes { boxes: Vec<BoundingBox> },
    Strokes { strokes: Vec<Stroke> },
}

/// Axis-aligned box in image pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One brush path of a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Label {
    pub fn choice(value: impl Into<String>) -> Self {
        Label::Choice(value.into())
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Label::Choice(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Short shape name used in validation messages
    pub fn kind(&self) -> &'static str {
        match self {
            Label::Choice(_) => "choice",
            Label::Boxes { .. } => "boxes",
            Label::Strokes { .. } => "strokes",
        }
    }

    /// Key used when tallying votes for an item's consensus label
    pub fn tally_key(&self) -> Option<String> {
        match self {
            Label::Choice(value) => Some(value.trim().to_string()),
            _ => None,
        }
    }

    /// Compare against a gold answer
    ///
    /// Returns `None` when the label shape has no comparable answer.
    pub fn matches_answer(&self, correct_answer: &str) -> Option<bool> {
        match self {
            Label::Choice(value) => Some(value == correct_answer),
            Label::Boxes { boxes } => Some(
                boxes
                    .iter()
                    .any(|b| b.class.as_deref() == Some(correct_answer)),
            ),
            Label::Strokes { .. } => None,
        }
    }
}
