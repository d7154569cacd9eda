use chrono::Utc;
use pricepost_core::domain::cell::Cell;
use pricepost_core::domain::table::{Row, Table};
use pricepost_core::errors::StoreError;
use pricepost_core::ports::TabularStore;
use sqlx::{sqlite::SqliteRow, Row as _, Sqlite, Transaction};
use tracing::debug;

use super::RepositoryError;
use crate::DbPool;

/// Named tables stored row by row; each row is a JSON array of cells.
pub struct SqlSheetStore {
    pool: DbPool,
}

impl SqlSheetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces every row of `table` (header included), creating it if needed.
    pub async fn replace_all(&self, table: &str, rows: &[Row]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        register_sheet(&mut tx, table).await?;
        sqlx::query("DELETE FROM sheet_row WHERE sheet_name = ?")
            .bind(table)
            .execute(&mut *tx)
            .await?;
        for (row_index, row) in rows.iter().enumerate() {
            upsert_row(&mut tx, table, row_index, row).await?;
        }
        tx.commit().await?;

        debug!(event_name = "store.sheet.replaced", table, rows = rows.len(), "sheet replaced");
        Ok(())
    }

    async fn load(&self, table: &str) -> Result<Option<Table>, RepositoryError> {
        let exists = sqlx::query("SELECT 1 FROM sheet WHERE name = ?")
            .bind(table)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let stored = sqlx::query(
            "SELECT row_index, cells_json
             FROM sheet_row
             WHERE sheet_name = ?
             ORDER BY row_index ASC",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut rows: Vec<Row> = Vec::with_capacity(stored.len());
        for record in stored {
            let (row_index, row) = row_from_record(&record)?;
            // Gaps left by writes past the end read back as empty rows.
            if rows.len() < row_index {
                rows.resize(row_index, Vec::new());
            }
            rows.push(row);
        }
        Ok(Some(Table::new(rows)))
    }

    async fn overwrite(&self, table: &str, start_row: usize, rows: &[Row]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        register_sheet(&mut tx, table).await?;
        for (offset, row) in rows.iter().enumerate() {
            upsert_row(&mut tx, table, start_row + offset, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append(&self, table: &str, row: &Row) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        register_sheet(&mut tx, table).await?;
        let next: i64 = sqlx::query(
            "SELECT COALESCE(MAX(row_index) + 1, 0) AS next FROM sheet_row WHERE sheet_name = ?",
        )
        .bind(table)
        .fetch_one(&mut *tx)
        .await?
        .get("next");
        let row_index = usize::try_from(next)
            .map_err(|_| RepositoryError::Decode(format!("invalid row index {next}")))?;
        upsert_row(&mut tx, table, row_index, row).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn ensure(&self, table: &str, headers: &[&str]) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        register_sheet(&mut tx, table).await?;
        let has_rows = sqlx::query("SELECT 1 FROM sheet_row WHERE sheet_name = ? LIMIT 1")
            .bind(table)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !has_rows {
            let header: Row = headers.iter().map(|header| Cell::text(*header)).collect();
            upsert_row(&mut tx, table, 0, &header).await?;
        }
        tx.commit().await?;
        Ok(!has_rows)
    }
}

async fn register_sheet(tx: &mut Transaction<'_, Sqlite>, table: &str) -> Result<(), RepositoryError> {
    sqlx::query("INSERT OR IGNORE INTO sheet (name, created_at) VALUES (?, ?)")
        .bind(table)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn upsert_row(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    row_index: usize,
    row: &Row,
) -> Result<(), RepositoryError> {
    let cells_json =
        serde_json::to_string(row).map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let row_index = i64::try_from(row_index)
        .map_err(|_| RepositoryError::Decode(format!("row index {row_index} out of range")))?;

    sqlx::query(
        "INSERT INTO sheet_row (sheet_name, row_index, cells_json, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(sheet_name, row_index) DO UPDATE SET
            cells_json = excluded.cells_json,
            updated_at = excluded.updated_at",
    )
    .bind(table)
    .bind(row_index)
    .bind(cells_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_from_record(record: &SqliteRow) -> Result<(usize, Row), RepositoryError> {
    let row_index: i64 = record.try_get("row_index")?;
    let cells_json: String = record.try_get("cells_json")?;
    let row_index = usize::try_from(row_index)
        .map_err(|_| RepositoryError::Decode(format!("negative row index {row_index}")))?;
    let row = serde_json::from_str(&cells_json).map_err(|error| {
        RepositoryError::Decode(format!("row {row_index} has invalid cells: {error}"))
    })?;
    Ok((row_index, row))
}

#[async_trait::async_trait]
impl TabularStore for SqlSheetStore {
    async fn read_all(&self, table: &str) -> Result<Option<Table>, StoreError> {
        Ok(self.load(table).await?)
    }

    async fn write_range(&self, table: &str, start_row: usize, rows: &[Row]) -> Result<(), StoreError> {
        Ok(self.overwrite(table, start_row, rows).await?)
    }

    async fn append_row(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        Ok(self.append(table, row).await?)
    }

    async fn ensure_table(&self, table: &str, headers: &[&str]) -> Result<bool, StoreError> {
        Ok(self.ensure(table, headers).await?)
    }
}
