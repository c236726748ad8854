//! Dataset Registry
//!
//! Datasets are loaded once at startup from `<datasets_dir>/<name>/index.json`
//! and never change afterwards. The registry is shared read-only between the
//! HTTP handlers and the session engine.

use labely_common::api::CategoryEntry;
use labely_common::models::TaskType;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Manifest file name inside each dataset directory
pub const MANIFEST_FILE: &str = "index.json";

/// What a labeler is shown for one item
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Image file, relative to the dataset directory
    Image { filename: String },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u64,
    pub content: Content,
    /// Present only on gold-standard items
    pub correct_answer: Option<String>,
}

impl Item {
    pub fn image(id: u64, filename: impl Into<String>) -> Self {
        Self {
            id,
            content: Content::Image {
                filename: filename.into(),
            },
            correct_answer: None,
        }
    }

    pub fn text(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            content: Content::Text { text: text.into() },
            correct_answer: None,
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.correct_answer = Some(answer.into());
        self
    }

    pub fn is_gold_standard(&self) -> bool {
        self.correct_answer.is_some()
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            Content::Text { text } => Some(text),
            Content::Image { .. } => None,
        }
    }
}

/// One named, immutable dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub task_type: TaskType,
    pub categories: Vec<CategoryEntry>,
    /// Accept free-text labels outside the category vocabulary
    pub open_classes: bool,
    /// Minimum profile ELO needed to start a session
    pub elo_threshold: i64,
    /// Items in labeling order
    pub items: Vec<Item>,
    /// Directory image filenames resolve against
    pub root: PathBuf,
    index: HashMap<u64, usize>,
}

impl Dataset {
    /// Build an in-memory dataset; categories get values in declaration order
    pub fn new(name: impl Into<String>, task_type: TaskType, categories: &[&str]) -> Self {
        Self {
            name: name.into(),
            task_type,
            categories: categories
                .iter()
                .enumerate()
                .map(|(value, label)| CategoryEntry {
                    label: label.to_string(),
                    value: value as i64,
                })
                .collect(),
            open_classes: false,
            elo_threshold: 0,
            items: Vec::new(),
            root: PathBuf::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_open_classes(mut self, open_classes: bool) -> Self {
        self.open_classes = open_classes;
        self
    }

    pub fn with_elo_threshold(mut self, elo_threshold: i64) -> Self {
        self.elo_threshold = elo_threshold;
        self
    }

    /// Check dataset invariants and build the id index
    fn seal(mut self) -> Result<Self> {
        let invalid = |reason: String| {
            Error::Common(labely_common::Error::InvalidDataset {
                name: self.name.clone(),
                reason,
            })
        };

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.label.trim().is_empty() {
                return Err(invalid("empty category label".to_string()));
            }
            if !seen.insert(category.label.as_str()) {
                return Err(invalid(format!("duplicate category '{}'", category.label)));
            }
        }

        let mut index = HashMap::with_capacity(self.items.len());
        for (position, item) in self.items.iter().enumerate() {
            if index.insert(item.id, position).is_some() {
                return Err(invalid(format!("duplicate item id {}", item.id)));
            }

            match (&item.content, self.task_type.is_text()) {
                (Content::Text { .. }, false) => {
                    return Err(invalid(format!("item {} has text in an image dataset", item.id)))
                }
                (Content::Image { .. }, true) => {
                    return Err(invalid(format!("item {} has an image in a text dataset", item.id)))
                }
                (Content::Image { filename }, false) if !is_plain_relative(filename) => {
                    return Err(invalid(format!(
                        "item {} filename '{}' escapes the dataset directory",
                        item.id, filename
                    )))
                }
                _ => {}
            }

            if let Some(answer) = &item.correct_answer {
                if !self.has_category(answer) {
                    return Err(invalid(format!(
                        "item {} correct answer '{}' is not a declared category",
                        item.id, answer
                    )));
                }
            }
        }

        self.index = index;
        Ok(self)
    }

    pub fn item(&self, item_id: u64) -> Option<&Item> {
        self.index.get(&item_id).map(|&position| &self.items[position])
    }

    pub fn has_category(&self, label: &str) -> bool {
        self.categories.iter().any(|c| c.label == label)
    }

    pub fn category_value(&self, label: &str) -> Option<i64> {
        self.categories
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.value)
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label.clone()).collect()
    }
}

fn is_plain_relative(filename: &str) -> bool {
    !filename.is_empty()
        && Path::new(filename)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

// ========================================
// Manifest parsing
// ========================================

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    dataset_name: Option<String>,
    #[serde(default)]
    task_type: Option<TaskType>,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default)]
    open_classes: bool,
    #[serde(default)]
    elo_threshold: i64,
    #[serde(default)]
    data: Vec<RawItem>,
}

/// Manifest item; `category` / `label` columns are ignored since current
/// labels live in the database
#[derive(Debug, Deserialize)]
struct RawItem {
    id: u64,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default, alias = "text")]
    review: Option<String>,
    #[serde(default)]
    correct_answer: Option<String>,
}

/// Parse a manifest into a sealed dataset named `name`
pub fn parse_manifest(name: &str, root: &Path, json: &str) -> Result<Dataset> {
    let invalid = |reason: String| {
        Error::Common(labely_common::Error::InvalidDataset {
            name: name.to_string(),
            reason,
        })
    };

    let raw: RawManifest =
        serde_json::from_str(json).map_err(|e| invalid(format!("malformed {}: {}", MANIFEST_FILE, e)))?;

    if let Some(declared) = raw.dataset_name.as_deref() {
        if declared != name {
            warn!(
                dataset = name,
                declared, "dataset_name differs from directory name, using directory name"
            );
        }
    }

    let has_text = raw.data.iter().any(|item| item.review.is_some());
    let task_type = raw.task_type.unwrap_or(if has_text {
        TaskType::TextSentiment
    } else if raw.categories.len() == 2 {
        TaskType::Binary
    } else {
        TaskType::MultiClass
    });

    let categories = if raw.categories.is_empty() && task_type == TaskType::TextSentiment {
        vec![
            CategoryEntry {
                label: "negative".to_string(),
                value: 0,
            },
            CategoryEntry {
                label: "positive".to_string(),
                value: 1,
            },
        ]
    } else {
        raw.categories
    };

    let mut items = Vec::with_capacity(raw.data.len());
    for raw_item in raw.data {
        let content = match (raw_item.filename, raw_item.review) {
            (_, Some(text)) => Content::Text { text },
            (Some(filename), None) => Content::Image { filename },
            (None, None) => return Err(invalid(format!("item {} has no filename or review", raw_item.id))),
        };
        items.push(Item {
            id: raw_item.id,
            content,
            correct_answer: raw_item.correct_answer,
        });
    }

    Dataset {
        name: name.to_string(),
        task_type,
        categories,
        open_classes: raw.open_classes,
        elo_threshold: raw.elo_threshold,
        items,
        root: root.to_path_buf(),
        index: HashMap::new(),
    }
    .seal()
}

// ========================================
// Registry
// ========================================

/// Named datasets, keyed and listed in name order
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Arc<Dataset>>,
}

impl DatasetRegistry {
    /// Load every `<dir>/<name>/index.json`
    ///
    /// A missing directory yields an empty registry. Any invalid manifest
    /// fails the whole load.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::default();

        if !dir.is_dir() {
            warn!("Datasets directory {} not found, no datasets loaded", dir.display());
            return Ok(registry);
        }

        let entries = std::fs::read_dir(dir).map_err(labely_common::Error::from)?;
        for entry in entries {
            let path = entry.map_err(labely_common::Error::from)?.path();
            let manifest_path = path.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!("Skipping dataset directory with non UTF-8 name: {}", path.display());
                continue;
            };

            let json = std::fs::read_to_string(&manifest_path).map_err(labely_common::Error::from)?;
            let dataset = parse_manifest(name, &path, &json)?;
            info!(
                dataset = %dataset.name,
                task_type = %dataset.task_type,
                items = dataset.items.len(),
                "Loaded dataset"
            );
            registry.datasets.insert(dataset.name.clone(), Arc::new(dataset));
        }

        info!("Dataset registry ready: {} dataset(s)", registry.datasets.len());
        Ok(registry)
    }

    /// Registry over in-memory datasets
    pub fn from_datasets(datasets: Vec<Dataset>) -> Result<Self> {
        let mut registry = Self::default();
        for dataset in datasets {
            let dataset = dataset.seal()?;
            if registry.datasets.contains_key(&dataset.name) {
                return Err(Error::Common(labely_common::Error::InvalidDataset {
                    name: dataset.name,
                    reason: "registered twice".to_string(),
                }));
            }
            registry.datasets.insert(dataset.name.clone(), Arc::new(dataset));
        }
        Ok(registry)
    }

    pub fn list(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<Dataset>> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("dataset '{}'", name)))
    }

    pub fn get_item(&self, name: &str, item_id: u64) -> Result<Item> {
        let dataset = self.get(name)?;
        dataset
            .item(item_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("item {} in dataset '{}'", item_id, name)))
    }

    pub fn is_gold_standard(&self, name: &str, item_id: u64) -> Result<bool> {
        Ok(self.get_item(name, item_id)?.is_gold_standard())
    }

    pub fn correct_answer(&self, name: &str, item_id: u64) -> Result<Option<String>> {
        Ok(self.get_item(name, item_id)?.correct_answer)
    }

    /// Filesystem path of an image item
    pub fn image_path(&self, name: &str, item_id: u64) -> Result<PathBuf> {
        let dataset = self.get(name)?;
        let item = dataset
            .item(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {} in dataset '{}'", item_id, name)))?;
        match &item.content {
            Content::Image { filename } => Ok(dataset.root.join(filename)),
            Content::Text { .. } => Err(Error::BadRequest(format!(
                "dataset '{}' is a text dataset",
                name
            ))),
        }
    }
}
