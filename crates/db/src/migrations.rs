use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &["sheet", "sheet_row", "run_lock"];

    async fn managed_tables(pool: &sqlx::SqlitePool) -> Vec<(String, String)> {
        let mut tables: Vec<(String, String)> = sqlx::query(
            "SELECT name, IFNULL(sql, '') AS sql FROM sqlite_master WHERE type = 'table'",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("sql")))
        .filter(|(name, _)| MANAGED_TABLES.contains(&name.as_str()))
        .collect();
        tables.sort();
        tables
    }

    #[tokio::test]
    async fn migrations_create_store_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let names: Vec<String> = managed_tables(&pool).await.into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["run_lock", "sheet", "sheet_row"]);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        let initial = managed_tables(&pool).await;

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(managed_tables(&pool).await.is_empty(), "full undo removes managed tables");

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(managed_tables(&pool).await, initial);
    }
}
