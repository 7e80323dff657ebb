//! In-memory fallback backend.
//!
//! Mirrors the SQLite backend's semantics exactly (same delete/restore
//! reconciliation, same snapshot cache behavior) so the provider can switch
//! backends between operations without clients noticing anything beyond the
//! reported storage mode. Id counters are monotonic and survive
//! `clear_all`, matching AUTOINCREMENT.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;

use nid_common::ImportStatus;

use crate::breakdown::Breakdown;
use crate::models::{ArchivedImport, ArchivedRow, ImportRecord, NewRow, ProcessedRow};

use super::{ChartSnapshot, RowPage, RowQuery, SNAPSHOT_DETAILED, SNAPSHOT_SIMPLE};

#[derive(Default)]
pub struct MemState {
    imports: Vec<ImportRecord>,
    rows: Vec<ProcessedRow>,
    archived_imports: Vec<ArchivedImport>,
    archived_rows: Vec<ArchivedRow>,
    chart: Vec<ChartSnapshot>,
    next_import_id: i64,
    next_row_id: i64,
    next_archived_import_id: i64,
    next_archived_row_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemState {
    pub fn create_import(
        &mut self,
        file_name: &str,
        import_date: chrono::DateTime<Utc>,
        data_type: &str,
    ) -> ImportRecord {
        let record = ImportRecord {
            id: next(&mut self.next_import_id),
            file_name: file_name.to_string(),
            import_date,
            data_type: data_type.to_string(),
            status: ImportStatus::Pending,
        };
        self.imports.push(record.clone());
        record
    }

    pub fn set_import_status(&mut self, import_id: i64, status: ImportStatus) {
        if let Some(import) = self.imports.iter_mut().find(|i| i.id == import_id) {
            import.status = status;
        }
    }

    pub fn bulk_insert_rows(&mut self, import_id: i64, rows: &[NewRow]) -> u64 {
        for row in rows {
            self.rows.push(ProcessedRow {
                id: next(&mut self.next_row_id),
                import_id: Some(import_id),
                file_name: row.file_name.clone(),
                import_date: row.import_date,
                category: row.category,
                technology: row.technology,
                sheet: row.sheet.clone(),
                data: row.raw.clone(),
            });
        }
        rows.len() as u64
    }

    pub fn list_imports(&self, limit: i64) -> Vec<ImportRecord> {
        let mut imports = self.imports.clone();
        imports.sort_by(|a, b| (b.import_date, b.id).cmp(&(a.import_date, a.id)));
        imports.truncate(limit.max(0) as usize);
        imports
    }

    pub fn count_imports(&self) -> i64 {
        self.imports.len() as i64
    }

    pub fn query_rows(&self, query: &RowQuery) -> RowPage {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<&ProcessedRow> = self
            .rows
            .iter()
            .filter(|row| {
                if let Some(category) = query.category {
                    if row.category != category {
                        return false;
                    }
                }
                if !query.technologies.is_empty()
                    && !query.technologies.contains(&row.technology)
                {
                    return false;
                }
                if let Some(needle) = &search {
                    let raw = serde_json::to_string(&row.data).unwrap_or_default();
                    return row.file_name.to_lowercase().contains(needle)
                        || row.category.as_str().contains(needle.as_str())
                        || row.technology.as_str().contains(needle.as_str())
                        || raw.to_lowercase().contains(needle);
                }
                true
            })
            .collect();
        matched.sort_by(|a, b| (b.import_date, b.id).cmp(&(a.import_date, a.id)));

        let total_rows = matched.len() as i64;
        let start = query.offset().min(total_rows) as usize;
        let end = (query.offset() + query.page_size).min(total_rows) as usize;
        let rows = matched[start..end].iter().map(|r| (*r).clone()).collect();

        RowPage {
            rows,
            total_rows,
            page: query.page,
            page_size: query.page_size,
            total_pages: RowPage::total_pages_for(total_rows, query.page_size),
        }
    }

    /// Same shape as the SQLite delete transaction: rows are gathered by
    /// owning id plus the (file name, import timestamp) pass, then
    /// re-parented under fresh archived imports.
    pub fn delete_imports(&mut self, ids: &[i64]) -> i64 {
        let targets: Vec<ImportRecord> = self
            .imports
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let archived_at = Utc::now();
        let mut moved = Vec::new();
        self.rows.retain(|row| {
            let owned = targets.iter().any(|import| {
                row.import_id == Some(import.id)
                    || (row.file_name == import.file_name
                        && row.import_date == import.import_date)
            });
            if owned {
                moved.push(row.clone());
            }
            !owned
        });

        let mut archive_by_id = HashMap::new();
        let mut archive_by_key = HashMap::new();
        for import in &targets {
            let archived_import_id = next(&mut self.next_archived_import_id);
            self.archived_imports.push(ArchivedImport {
                id: archived_import_id,
                original_import_id: Some(import.id),
                file_name: import.file_name.clone(),
                import_date: import.import_date,
                data_type: import.data_type.clone(),
                status: import.status,
                archived_at,
            });
            archive_by_id.insert(import.id, archived_import_id);
            archive_by_key.insert(
                (import.file_name.clone(), import.import_date),
                archived_import_id,
            );
        }

        // Resolve each row's archived parent by owning id first, then by
        // the (file name, import timestamp) key. Every moved row resolves:
        // the outer match above admits only rows hitting one of the two
        // paths.
        for row in &moved {
            let Some(archived_import_id) = row
                .import_id
                .and_then(|import_id| archive_by_id.get(&import_id).copied())
                .or_else(|| {
                    archive_by_key
                        .get(&(row.file_name.clone(), row.import_date))
                        .copied()
                })
            else {
                continue;
            };
            self.archived_rows.push(ArchivedRow {
                id: next(&mut self.next_archived_row_id),
                archived_import_id,
                original_row_id: row.id,
                original_import_id: row.import_id,
                file_name: row.file_name.clone(),
                import_date: row.import_date,
                category: row.category,
                technology: row.technology,
                sheet: row.sheet.clone(),
                data: row.data.clone(),
                archived_at,
            });
        }

        self.imports.retain(|i| !ids.contains(&i.id));
        self.refresh_breakdown();
        targets.len() as i64
    }

    pub fn list_archived(&self, limit: i64) -> Vec<ArchivedRow> {
        let mut rows = self.archived_rows.clone();
        rows.sort_by(|a, b| (b.archived_at, b.id).cmp(&(a.archived_at, a.id)));
        rows.truncate(limit.max(0) as usize);
        rows
    }

    pub fn restore_rows(&mut self, archive_row_ids: &[i64]) -> i64 {
        let mut restored = Vec::new();
        self.archived_rows.retain(|row| {
            if archive_row_ids.contains(&row.id) {
                restored.push(row.clone());
                false
            } else {
                true
            }
        });
        if restored.is_empty() {
            return 0;
        }

        for row in &restored {
            self.rows.push(ProcessedRow {
                id: next(&mut self.next_row_id),
                import_id: row.original_import_id,
                file_name: row.file_name.clone(),
                import_date: row.import_date,
                category: row.category,
                technology: row.technology,
                sheet: row.sheet.clone(),
                data: row.data.clone(),
            });
        }

        self.drop_childless_archived_imports();
        self.refresh_breakdown();
        restored.len() as i64
    }

    pub fn purge_archived(&mut self, archive_row_ids: &[i64]) -> i64 {
        let before = self.archived_rows.len();
        self.archived_rows
            .retain(|row| !archive_row_ids.contains(&row.id));
        let removed = before - self.archived_rows.len();
        if removed > 0 {
            self.drop_childless_archived_imports();
        }
        removed as i64
    }

    fn drop_childless_archived_imports(&mut self) {
        let archived_rows = &self.archived_rows;
        self.archived_imports
            .retain(|import| archived_rows.iter().any(|r| r.archived_import_id == import.id));
    }

    pub fn refresh_breakdown(&mut self) -> Breakdown {
        let breakdown = Breakdown::compute(self.rows.iter().map(|r| (r.category, r.technology)));
        let created_at = Utc::now();
        self.chart.push(ChartSnapshot {
            chart_type: SNAPSHOT_SIMPLE.to_string(),
            data_values: breakdown.simple_counts(),
            created_at,
        });
        self.chart.push(ChartSnapshot {
            chart_type: SNAPSHOT_DETAILED.to_string(),
            data_values: serde_json::to_value(breakdown).unwrap_or(Value::Null),
            created_at,
        });
        breakdown
    }

    pub fn latest_breakdown(&self) -> Option<Value> {
        for chart_type in [SNAPSHOT_DETAILED, SNAPSHOT_SIMPLE] {
            if let Some(snapshot) = self
                .chart
                .iter()
                .rev()
                .find(|s| s.chart_type == chart_type)
            {
                return Some(snapshot.data_values.clone());
            }
        }
        None
    }

    pub fn clear_all(&mut self) {
        self.chart.clear();
        self.rows.clear();
        self.imports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nid_common::{Category, Technology};
    use serde_json::Map;

    fn new_row(file: &str, date: chrono::DateTime<Utc>, tech: Technology) -> NewRow {
        NewRow {
            file_name: file.to_string(),
            import_date: date,
            category: Category::Wireless,
            technology: tech,
            sheet: None,
            raw: Map::new(),
        }
    }

    #[test]
    fn test_delete_matches_orphan_rows_by_file_and_timestamp() {
        let mut state = MemState::default();
        let date = Utc::now();
        let import = state.create_import("cells.csv", date, "text/csv");

        // One row properly linked, one orphan sharing file name + timestamp.
        state.bulk_insert_rows(import.id, &[new_row("cells.csv", date, Technology::G5)]);
        state.rows.push(ProcessedRow {
            id: next(&mut state.next_row_id),
            import_id: None,
            file_name: "cells.csv".to_string(),
            import_date: date,
            category: Category::Wireless,
            technology: Technology::Lte,
            sheet: None,
            data: Map::new(),
        });

        assert_eq!(state.delete_imports(&[import.id]), 1);
        assert!(state.rows.is_empty());
        assert_eq!(state.archived_rows.len(), 2);
        assert_eq!(state.archived_imports.len(), 1);
    }

    #[test]
    fn test_delete_archives_rows_with_foreign_owning_id_by_key() {
        let mut state = MemState::default();
        let date = Utc::now();
        let import = state.create_import("cells.csv", date, "text/csv");

        // The owning id points at an import that is not a delete target,
        // so only the (file name, import timestamp) key can resolve it.
        state.rows.push(ProcessedRow {
            id: next(&mut state.next_row_id),
            import_id: Some(import.id + 100),
            file_name: "cells.csv".to_string(),
            import_date: date,
            category: Category::Wireless,
            technology: Technology::G5,
            sheet: None,
            data: Map::new(),
        });

        assert_eq!(state.delete_imports(&[import.id]), 1);
        assert!(state.rows.is_empty());
        assert_eq!(state.archived_rows.len(), 1);
        assert_eq!(
            state.archived_rows[0].archived_import_id,
            state.archived_imports[0].id
        );
        assert_eq!(state.archived_rows[0].original_import_id, Some(import.id + 100));
    }

    #[test]
    fn test_restore_drops_consumed_archived_import() {
        let mut state = MemState::default();
        let date = Utc::now();
        let import = state.create_import("cells.csv", date, "text/csv");
        state.bulk_insert_rows(import.id, &[new_row("cells.csv", date, Technology::G5)]);
        state.delete_imports(&[import.id]);

        let archived_ids: Vec<i64> = state.archived_rows.iter().map(|r| r.id).collect();
        assert_eq!(state.restore_rows(&archived_ids), 1);
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].import_id, Some(import.id));
        assert!(state.archived_rows.is_empty());
        assert!(state.archived_imports.is_empty());
    }

    #[test]
    fn test_purge_is_idempotent_and_leaves_active_data() {
        let mut state = MemState::default();
        let date = Utc::now();
        let keep = state.create_import("keep.csv", date, "text/csv");
        state.bulk_insert_rows(keep.id, &[new_row("keep.csv", date, Technology::Lte)]);
        let drop = state.create_import("drop.csv", date, "text/csv");
        state.bulk_insert_rows(drop.id, &[new_row("drop.csv", date, Technology::G5)]);
        state.delete_imports(&[drop.id]);

        let ids: Vec<i64> = state.archived_rows.iter().map(|r| r.id).collect();
        assert_eq!(state.purge_archived(&ids), 1);
        assert_eq!(state.purge_archived(&ids), 0);
        assert!(state.archived_imports.is_empty());
        assert_eq!(state.rows.len(), 1);
    }

    #[test]
    fn test_clear_all_keeps_archive_and_counters() {
        let mut state = MemState::default();
        let date = Utc::now();
        let import = state.create_import("a.csv", date, "text/csv");
        state.bulk_insert_rows(import.id, &[new_row("a.csv", date, Technology::G5)]);
        state.delete_imports(&[import.id]);
        let import2 = state.create_import("b.csv", date, "text/csv");
        state.bulk_insert_rows(import2.id, &[new_row("b.csv", date, Technology::Lte)]);

        state.clear_all();
        assert_eq!(state.count_imports(), 0);
        assert!(state.rows.is_empty());
        assert!(state.latest_breakdown().is_none());
        assert_eq!(state.archived_rows.len(), 1);

        let import3 = state.create_import("c.csv", date, "text/csv");
        assert!(import3.id > import2.id);
    }
}
