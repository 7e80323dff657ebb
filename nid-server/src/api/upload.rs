//! File upload: decode, classify, persist, recompute the breakdown.

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use nid_common::{Error, ImportStatus, StorageMode};

use crate::breakdown::Breakdown;
use crate::classify::classify;
use crate::decode::decode;
use crate::error::ApiError;
use crate::models::NewRow;
use crate::store::StoreProvider;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub breakdown: Breakdown,
    pub rows_processed: u64,
    pub storage_mode: StorageMode,
}

/// POST /upload
///
/// Multipart body with the file under the `file` field. The import record
/// is created up front in `pending` status so a decode failure still leaves
/// a `failed` audit entry.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Unreadable file field: {e}")))?;
            file = Some((file_name, bytes.to_vec()));
        }
    }
    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let import_date = Utc::now();
    let data_type = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    let store = &state.store;
    let import = match store.create_import(&file_name, import_date, &data_type).await {
        Ok(import) => import,
        // The provider has already degraded; the retry lands in memory.
        Err(Error::Storage(_)) => store.create_import(&file_name, import_date, &data_type).await?,
        Err(err) => return Err(err.into()),
    };

    let records = match decode(&bytes, &file_name) {
        Ok(records) => records,
        Err(err) => {
            let _ = store.finish_import(import.id, ImportStatus::Failed).await;
            let cause = match err {
                Error::Decode(cause) => cause,
                other => other.to_string(),
            };
            return Err(ApiError::internal(format!(
                "Failed to process file '{file_name}': {cause}"
            )));
        }
    };

    let rows: Vec<NewRow> = records
        .into_iter()
        .map(|record| {
            let (technology, category) = classify(&record.values);
            NewRow {
                file_name: file_name.clone(),
                import_date,
                category,
                technology,
                sheet: record.sheet,
                raw: record.values,
            }
        })
        .collect();

    let rows_processed =
        persist_rows(store, import.id, &file_name, import_date, &data_type, &rows).await?;

    let breakdown = store.refresh_breakdown().await?;
    let storage_mode = store.mode();
    info!(
        %file_name,
        rows = rows_processed,
        mode = %storage_mode,
        "upload processed"
    );

    Ok(Json(UploadResponse {
        message: format!("File '{file_name}' uploaded and processed successfully"),
        breakdown,
        rows_processed,
        storage_mode,
    }))
}

/// Insert the classified rows and finish the import. A storage failure
/// (which also flips the provider to the fallback) gets exactly one retry
/// under a fresh import record; the second failure is final.
async fn persist_rows(
    store: &StoreProvider,
    import_id: i64,
    file_name: &str,
    import_date: DateTime<Utc>,
    data_type: &str,
    rows: &[NewRow],
) -> Result<u64, ApiError> {
    match finish_insert(store, import_id, rows).await {
        Ok(count) => Ok(count),
        Err(Error::Storage(_)) => {
            let retry = store.create_import(file_name, import_date, data_type).await?;
            finish_insert(store, retry.id, rows).await.map_err(ApiError::from)
        }
        Err(err) => Err(err.into()),
    }
}

async fn finish_insert(
    store: &StoreProvider,
    import_id: i64,
    rows: &[NewRow],
) -> Result<u64, Error> {
    match store.bulk_insert_rows(import_id, rows).await {
        Ok(count) => {
            store.finish_import(import_id, ImportStatus::Completed).await?;
            Ok(count)
        }
        Err(err) => {
            let _ = store.finish_import(import_id, ImportStatus::Failed).await;
            Err(err)
        }
    }
}
