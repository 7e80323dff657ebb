//! HTTP API handlers for the dashboard backend.

pub mod archives;
pub mod chart;
pub mod health;
pub mod imports;
pub mod rows;
pub mod stats;
pub mod upload;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Request body shared by the bulk id endpoints (`DELETE /imports`,
/// `POST /api/archives/restore`, `DELETE /api/archives/delete`).
#[derive(Debug, Deserialize)]
pub struct IdListRequest {
    #[serde(default)]
    pub ids: Vec<Value>,
}

/// Extract the valid positive-integer ids from a request body. Non-numeric
/// and non-positive entries are discarded; an empty result is a 400.
pub fn parse_ids(request: &IdListRequest) -> Result<Vec<i64>, ApiError> {
    let ids: Vec<i64> = request
        .ids
        .iter()
        .filter_map(Value::as_i64)
        .filter(|id| *id > 0)
        .collect();

    if ids.is_empty() {
        return Err(ApiError::bad_request("No valid ids provided"));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ids_filters_invalid_entries() {
        let request = IdListRequest {
            ids: vec![json!(3), json!(-1), json!(0), json!("7"), json!(null), json!(12)],
        };
        assert_eq!(parse_ids(&request).unwrap(), vec![3, 12]);
    }

    #[test]
    fn test_parse_ids_rejects_empty_and_all_invalid() {
        assert!(parse_ids(&IdListRequest { ids: vec![] }).is_err());
        let request = IdListRequest {
            ids: vec![json!(-2), json!("x")],
        };
        assert!(parse_ids(&request).is_err());
    }
}
