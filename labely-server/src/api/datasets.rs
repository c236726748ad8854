//! Image dataset endpoints (`/dataset/*`)

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use labely_common::api::{DatasetManifest, ManifestItem, PostAck, SetLabelRequest};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::db::submissions;
use crate::error::{Error, Result};
use crate::registry::{Content, Dataset};
use crate::AppState;

/// Category value reported for items nobody has labeled
pub const UNLABELED: i64 = -1;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub name: String,
    pub id: u64,
}

fn require_image_dataset(dataset: &Dataset) -> Result<()> {
    if dataset.task_type.is_text() {
        return Err(Error::BadRequest(format!(
            "'{}' is a text dataset, use /textdataset",
            dataset.name
        )));
    }
    Ok(())
}

/// GET /dataset/list
pub async fn list_datasets(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list())
}

/// GET /dataset/get?name=
///
/// `category` carries each item's consensus category value, or -1.
pub async fn get_dataset(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<DatasetManifest>> {
    let dataset = state.registry.get(&query.name)?;
    require_image_dataset(&dataset)?;

    let consensus = submissions::consensus_labels(&state.db, &dataset.name).await?;

    let data = dataset
        .items
        .iter()
        .filter_map(|item| match &item.content {
            Content::Image { filename } => Some(ManifestItem {
                id: item.id,
                filename: filename.clone(),
                category: consensus
                    .get(&item.id)
                    .and_then(|label| dataset.category_value(label))
                    .unwrap_or(UNLABELED),
            }),
            Content::Text { .. } => None,
        })
        .collect();

    Ok(Json(DatasetManifest {
        dataset_name: dataset.name.clone(),
        categories: dataset.categories.clone(),
        data,
    }))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// GET /dataset/getimg?name=&id=
pub async fn get_image(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<impl IntoResponse> {
    let path = state.registry.image_path(&query.name, query.id)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!(
            "image for item {} in dataset '{}'",
            query.id, query.name
        )),
        _ => Error::Common(labely_common::Error::Io(e)),
    })?;

    debug!(path = %path.display(), size = bytes.len(), "Serving image");
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], Bytes::from(bytes)))
}

/// POST /dataset/setcat
pub async fn set_category(
    State(state): State<AppState>,
    Json(request): Json<SetLabelRequest>,
) -> Result<Json<PostAck>> {
    let dataset = state.registry.get(&request.name)?;
    require_image_dataset(&dataset)?;

    state
        .engine
        .submit_direct(&request.name, request.id, &request.label, request.user_id.as_deref())
        .await?;

    Ok(Json(PostAck::ok(format!(
        "Label '{}' saved for item {}",
        request.label, request.id
    ))))
}
