//! Label Submission Validation
//!
//! One [`LabelRule`] per task type, looked up through a [`RuleSet`] built
//! from the `[labeling]` config section.

use labely_common::config::LabelingConfig;
use labely_common::models::{Label, TaskType};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::registry::Dataset;

/// Checks that a label is well-formed for a dataset
pub trait LabelRule: Send + Sync {
    fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()>;
}

fn shape_mismatch(task_type: TaskType, label: &Label) -> Error {
    Error::InvalidLabel(format!(
        "{} task does not accept a {} label",
        task_type,
        label.kind()
    ))
}

/// Binary and multi-class: a declared category, or free text when the
/// dataset has open classes
pub struct CategoricalRule;

impl LabelRule for CategoricalRule {
    fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()> {
        let choice = label
            .as_choice()
            .ok_or_else(|| shape_mismatch(dataset.task_type, label))?;

        if dataset.has_category(choice) {
            return Ok(());
        }
        if dataset.open_classes && !choice.trim().is_empty() {
            return Ok(());
        }
        if choice.trim().is_empty() {
            return Err(Error::InvalidLabel("label is empty".to_string()));
        }
        Err(Error::InvalidLabel(format!(
            "'{}' is not a category of dataset '{}'",
            choice, dataset.name
        )))
    }
}

/// Boxes must be strictly larger than the minimum in both dimensions
pub struct BoundingBoxRule {
    pub min_width: f64,
    pub min_height: f64,
}

impl LabelRule for BoundingBoxRule {
    fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()> {
        let Label::Boxes { boxes } = label else {
            return Err(shape_mismatch(dataset.task_type, label));
        };

        if boxes.is_empty() {
            return Err(Error::InvalidLabel("at least one box is required".to_string()));
        }

        for (i, b) in boxes.iter().enumerate() {
            if !(b.width > 0.0 && b.height > 0.0) {
                return Err(Error::InvalidLabel(format!(
                    "box {} has non-positive size {}x{}",
                    i, b.width, b.height
                )));
            }
            if b.width <= self.min_width || b.height <= self.min_height {
                return Err(Error::InvalidLabel(format!(
                    "box {} is {}x{}, must be larger than {}x{}",
                    i, b.width, b.height, self.min_width, self.min_height
                )));
            }
            if let Some(class) = &b.class {
                if !dataset.has_category(class) && !dataset.open_classes {
                    return Err(Error::InvalidLabel(format!(
                        "box {} class '{}' is not a category of dataset '{}'",
                        i, class, dataset.name
                    )));
                }
            }
        }
        Ok(())
    }
}

pub struct SegmentationRule;

impl LabelRule for SegmentationRule {
    fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()> {
        let Label::Strokes { strokes } = label else {
            return Err(shape_mismatch(dataset.task_type, label));
        };

        if strokes.is_empty() {
            return Err(Error::InvalidLabel("at least one stroke is required".to_string()));
        }
        if let Some(i) = strokes.iter().position(|s| s.points.is_empty()) {
            return Err(Error::InvalidLabel(format!("stroke {} has no points", i)));
        }
        Ok(())
    }
}

pub struct SentimentRule {
    pub allow_neutral: bool,
}

impl LabelRule for SentimentRule {
    fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()> {
        let choice = label
            .as_choice()
            .ok_or_else(|| shape_mismatch(dataset.task_type, label))?;

        match choice {
            "positive" | "negative" => Ok(()),
            "neutral" if self.allow_neutral => Ok(()),
            other => Err(Error::InvalidLabel(format!(
                "'{}' is not a sentiment (expected positive or negative{})",
                other,
                if self.allow_neutral { " or neutral" } else { "" }
            ))),
        }
    }
}

/// Rule lookup keyed on task type
pub struct RuleSet {
    rules: HashMap<TaskType, Box<dyn LabelRule>>,
}

impl RuleSet {
    pub fn new(config: &LabelingConfig) -> Self {
        let mut rules: HashMap<TaskType, Box<dyn LabelRule>> = HashMap::new();
        rules.insert(TaskType::Binary, Box::new(CategoricalRule));
        rules.insert(TaskType::MultiClass, Box::new(CategoricalRule));
        rules.insert(
            TaskType::BoundingBox,
            Box::new(BoundingBoxRule {
                min_width: config.min_box_width,
                min_height: config.min_box_height,
            }),
        );
        rules.insert(TaskType::Segmentation, Box::new(SegmentationRule));
        rules.insert(
            TaskType::TextSentiment,
            Box::new(SentimentRule {
                allow_neutral: config.allow_neutral_sentiment,
            }),
        );
        Self { rules }
    }

    pub fn validate(&self, dataset: &Dataset, label: &Label) -> Result<()> {
        let rule = self.rules.get(&dataset.task_type).ok_or_else(|| {
            Error::Internal(format!("no label rule for task type {}", dataset.task_type))
        })?;
        rule.validate(dataset, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labely_common::models::{BoundingBox, Point, Stroke};

    fn boxes(width: f64, height: f64) -> Label {
        Label::Boxes {
            boxes: vec![BoundingBox {
                x: 5.0,
                y: 5.0,
                width,
                height,
                class: None,
            }],
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new(&LabelingConfig::default())
    }

    #[test]
    fn test_categorical_membership() {
        let dataset = Dataset::new("muffin-vs-chihuahua", TaskType::Binary, &["muffin", "chihuahua"]);
        assert!(rules().validate(&dataset, &Label::choice("muffin")).is_ok());
        assert!(matches!(
            rules().validate(&dataset, &Label::choice("bagel")),
            Err(Error::InvalidLabel(_))
        ));
        assert!(rules().validate(&dataset, &boxes(30.0, 30.0)).is_err());
    }

    #[test]
    fn test_open_classes_accept_free_text_but_not_blank() {
        let dataset = Dataset::new("animals", TaskType::MultiClass, &["cat", "dog"]).with_open_classes(true);
        assert!(rules().validate(&dataset, &Label::choice("capybara")).is_ok());
        assert!(rules().validate(&dataset, &Label::choice("   ")).is_err());
    }

    #[test]
    fn test_box_minimum_size() {
        let dataset = Dataset::new("plates", TaskType::BoundingBox, &["plate"]);
        assert!(matches!(
            rules().validate(&dataset, &boxes(10.0, 10.0)),
            Err(Error::InvalidLabel(_))
        ));
        assert!(rules().validate(&dataset, &boxes(30.0, 25.0)).is_ok());
        assert!(rules().validate(&dataset, &boxes(-30.0, 25.0)).is_err());
        assert!(rules().validate(&dataset, &boxes(20.0, 20.0)).is_err());
        assert!(rules().validate(&dataset, &boxes(21.0, 20.0)).is_err());
        assert!(rules().validate(&dataset, &boxes(21.0, 21.0)).is_ok());
        assert!(rules()
            .validate(&dataset, &Label::Boxes { boxes: vec![] })
            .is_err());
    }

    #[test]
    fn test_box_class_must_be_declared() {
        let dataset = Dataset::new("plates", TaskType::BoundingBox, &["plate"]);
        let label = Label::Boxes {
            boxes: vec![BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 40.0,
                height: 40.0,
                class: Some("car".to_string()),
            }],
        };
        assert!(rules().validate(&dataset, &label).is_err());
    }

    #[test]
    fn test_segmentation_requires_points() {
        let dataset = Dataset::new("roads", TaskType::Segmentation, &["road"]);
        let empty_stroke = Label::Strokes {
            strokes: vec![Stroke { points: vec![] }],
        };
        assert!(rules().validate(&dataset, &empty_stroke).is_err());

        let stroke = Label::Strokes {
            strokes: vec![Stroke {
                points: vec![Point { x: 1.0, y: 2.0 }],
            }],
        };
        assert!(rules().validate(&dataset, &stroke).is_ok());
    }

    #[test]
    fn test_neutral_sentiment_is_configurable() {
        let dataset = Dataset::new("imdb-movie-review", TaskType::TextSentiment, &["negative", "positive"]);
        assert!(rules().validate(&dataset, &Label::choice("positive")).is_ok());
        assert!(rules().validate(&dataset, &Label::choice("neutral")).is_err());

        let permissive = RuleSet::new(&LabelingConfig {
            allow_neutral_sentiment: true,
            ..LabelingConfig::default()
        });
        assert!(permissive.validate(&dataset, &Label::choice("neutral")).is_ok());
    }
}
