//! Labeling task types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of labeling work a dataset asks for
///
/// Determines which label shape is accepted and the per-label reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Binary,
    #[serde(alias = "multi")]
    MultiClass,
    #[serde(alias = "object-detection")]
    BoundingBox,
    Segmentation,
    TextSentiment,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Binary,
        TaskType::MultiClass,
        TaskType::BoundingBox,
        TaskType::Segmentation,
        TaskType::TextSentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Binary => "binary",
            TaskType::MultiClass => "multi-class",
            TaskType::BoundingBox => "bounding-box",
            TaskType::Segmentation => "segmentation",
            TaskType::TextSentiment => "text-sentiment",
        }
    }

    /// Text tasks carry their content inline instead of an image file
    pub fn is_text(&self) -> bool {
        matches!(self, TaskType::TextSentiment)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(TaskType::Binary),
            "multi-class" | "multi" => Ok(TaskType::MultiClass),
            "bounding-box" | "object-detection" => Ok(TaskType::BoundingBox),
            "segmentation" => Ok(TaskType::Segmentation),
            "text-sentiment" => Ok(TaskType::TextSentiment),
            other => Err(format!("Unknown task type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_accepts_client_aliases() {
        assert_eq!("multi".parse::<TaskType>().unwrap(), TaskType::MultiClass);
        assert_eq!(
            "object-detection".parse::<TaskType>().unwrap(),
            TaskType::BoundingBox
        );
        assert!("sorting".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_as_str_round_trips_through_serde() {
        for task_type in TaskType::ALL {
            let json = serde_json::to_string(&task_type).unwrap();
            assert_eq!(json, format!("\"{}\"", task_type.as_str()));
        }
    }
}
