//! Text dataset endpoints (`/textdataset/*`)

use axum::{
    extract::{Query, State},
    Json,
};
use labely_common::api::{PostAck, SetLabelRequest, TextDatasetResponse, TextItem};

use super::datasets::{ItemQuery, NameQuery};
use crate::db::submissions;
use crate::error::{Error, Result};
use crate::registry::Dataset;
use crate::AppState;

fn require_text_dataset(dataset: &Dataset) -> Result<()> {
    if !dataset.task_type.is_text() {
        return Err(Error::BadRequest(format!(
            "'{}' is an image dataset, use /dataset",
            dataset.name
        )));
    }
    Ok(())
}

/// GET /textdataset/get?name=
pub async fn get_text_dataset(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<TextDatasetResponse>> {
    let dataset = state.registry.get(&query.name)?;
    require_text_dataset(&dataset)?;

    let mut consensus = submissions::consensus_labels(&state.db, &dataset.name).await?;

    let data = dataset
        .items
        .iter()
        .filter_map(|item| {
            item.text_content().map(|text| TextItem {
                id: item.id,
                review: text.to_string(),
                label: consensus.remove(&item.id),
            })
        })
        .collect();

    Ok(Json(TextDatasetResponse {
        dataset_name: dataset.name.clone(),
        data,
    }))
}

/// GET /textdataset/getitem?name=&id=
pub async fn get_text_item(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<TextItem>> {
    let dataset = state.registry.get(&query.name)?;
    require_text_dataset(&dataset)?;

    let item = state.registry.get_item(&query.name, query.id)?;
    let review = item
        .text_content()
        .ok_or_else(|| Error::Internal(format!("text item {} has no text", item.id)))?
        .to_string();

    Ok(Json(TextItem {
        id: item.id,
        review,
        label: submissions::consensus_label(&state.db, &dataset.name, item.id).await?,
    }))
}

/// POST /textdataset/setlabel
pub async fn set_text_label(
    State(state): State<AppState>,
    Json(request): Json<SetLabelRequest>,
) -> Result<Json<PostAck>> {
    let dataset = state.registry.get(&request.name)?;
    require_text_dataset(&dataset)?;

    state
        .engine
        .submit_direct(&request.name, request.id, &request.label, request.user_id.as_deref())
        .await?;

    Ok(Json(PostAck::ok(format!(
        "Label '{}' saved for item {}",
        request.label, request.id
    ))))
}
