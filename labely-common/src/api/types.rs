//! Shared API request/response types
//!
//! Wire shapes for the dataset endpoints follow the manifest format the mobile
//! client already consumes (`{dataset_name, categories, data}`).

use serde::{Deserialize, Serialize};

use crate::models::{Label, UserProfile};

// ========================================
// Dataset Endpoints
// ========================================

/// One entry of a dataset's category vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub label: String,
    pub value: i64,
}

/// GET /dataset/get response
///
/// # Examples
///
/// ```
/// use labely_common::api::types::DatasetManifest;
///
/// let json = r#"{
///     "dataset_name": "muffin-vs-chihuahua",
///     "categories": [{"label": "muffin", "value": 0}],
///     "data": [{"id": 0, "filename": "0001.jpg", "category": -1}]
/// }"#;
/// let manifest: DatasetManifest = serde_json::from_str(json).unwrap();
/// assert_eq!(manifest.data[0].category, -1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub dataset_name: String,
    pub categories: Vec<CategoryEntry>,
    pub data: Vec<ManifestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: u64,
    pub filename: String,
    /// Current consensus category value, or -1 when unlabeled
    pub category: i64,
}

/// GET /textdataset/get response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDatasetResponse {
    pub dataset_name: String,
    pub data: Vec<TextItem>,
}

/// GET /textdataset/getitem response, and element of [`TextDatasetResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub id: u64,
    pub review: String,
    pub label: Option<String>,
}

/// POST /dataset/setcat and /textdataset/setlabel body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLabelRequest {
    pub name: String,
    pub id: u64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Acknowledgement returned by POST endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl PostAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Interpret a POST response body
    ///
    /// Bodies that are not a JSON acknowledgement are wrapped as a
    /// successful plain-text message.
    ///
    /// ```
    /// use labely_common::api::types::PostAck;
    ///
    /// assert_eq!(PostAck::from_body("OK").message, "OK");
    /// assert!(PostAck::from_body(r#"{"success":true,"message":"saved"}"#).success);
    /// ```
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| PostAck::ok(body))
    }
}

// ========================================
// Session Endpoints
// ========================================

/// POST /session/start body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: String,
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_limit: Option<u32>,
}

/// POST /session/:id/submit body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitLabelRequest {
    pub item_id: u64,
    pub label: Label,
}

// ========================================
// Standings
// ========================================

/// GET /profile/:user_id response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub elo: i64,
    pub total_tasks_completed: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Percent of gold-standard items answered correctly
    pub accuracy: Option<f64>,
    /// Cents
    pub wallet_balance: i64,
}

impl From<&UserProfile> for ProfileResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            elo: profile.elo,
            total_tasks_completed: profile.total_tasks_completed,
            current_streak: profile.current_streak,
            best_streak: profile.best_streak,
            accuracy: profile.accuracy(),
            wallet_balance: profile.wallet_balance,
        }
    }
}

/// Element of GET /leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub elo: i64,
    pub tasks_completed: u64,
    pub accuracy: Option<f64>,
}

// ========================================
// Error Response
// ========================================

/// Body of every non-2xx response
///
/// `retryable` tells the caller whether to resubmit the same item (true) or
/// move past it (false).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_ack_plain_text_fallback() {
        let ack = PostAck::from_body("Label saved");
        assert!(ack.success);
        assert_eq!(ack.message, "Label saved");
    }

    #[test]
    fn test_post_ack_json_body() {
        let ack = PostAck::from_body(r#"{"success": false, "message": "nope"}"#);
        assert!(!ack.success);
        assert_eq!(ack.message, "nope");
    }

    #[test]
    fn test_set_label_request_without_user() {
        let request: SetLabelRequest =
            serde_json::from_str(r#"{"name": "imdb-movie-review", "id": 3, "label": "positive"}"#)
                .unwrap();
        assert_eq!(request.user_id, None);
        assert_eq!(request.id, 3);
    }

    #[test]
    fn test_submit_request_with_boxes() {
        let request: SubmitLabelRequest = serde_json::from_str(
            r#"{"item_id": 1, "label": {"boxes": [{"x": 0, "y": 0, "width": 30, "height": 25}]}}"#,
        )
        .unwrap();
        assert_eq!(request.label.kind(), "boxes");
    }
}
