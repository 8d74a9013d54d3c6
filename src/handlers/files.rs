use super::{AppState, blocking};
use crate::{Result, types::FileInfo};
use axum::{
    Json,
    extract::{Path, State},
};

pub async fn get_file_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileInfo>> {
    let catalog = state.catalog.clone();
    let info = blocking(move || catalog.file_info(&id)).await?;
    Ok(Json(info))
}
