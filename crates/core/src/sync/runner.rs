use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::chat::ChatId;
use crate::domain::directory::Directory;
use crate::domain::product::{ProductColumns, ProductSnapshot};
use crate::errors::{ApplicationError, DomainError};
use crate::format::{PostFormatter, RenderDate};
use crate::lock::RunLock;
use crate::ports::{MessagingClient, RunLockStore, TabularStore};
use crate::settings::{NavigationRecord, SheetSettingsStore};
use crate::sync::navigation::{NavigationOutcome, NavigationRebuilder};
use crate::sync::reconcile::{DirectoryReconciler, ReconcileReport};
use crate::sync::tables::{ensure_system_tables, RetryingStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub dropped_rows: usize,
    pub skipped_directory_rows: usize,
    pub reconcile: Option<ReconcileReport>,
    pub navigation: NavigationOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run held the lock; nothing was touched.
    Skipped,
}

/// One synchronization pass: products to group posts, then the navigation post.
pub struct PriceSync {
    config: AppConfig,
    store: Arc<dyn TabularStore>,
    messenger: Arc<dyn MessagingClient>,
    lock: RunLock,
    chat: ChatId,
    render_date: Option<RenderDate>,
}

impl PriceSync {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TabularStore>,
        messenger: Arc<dyn MessagingClient>,
        lock_store: Arc<dyn RunLockStore>,
    ) -> Self {
        let store: Arc<dyn TabularStore> = Arc::new(RetryingStore::from_config(store, &config.sheets));
        let lock = RunLock::from_config(lock_store, &config.lock);
        let chat = ChatId::new(config.telegram.chat_id.clone());
        Self { config, store, messenger, lock, chat, render_date: None }
    }

    /// Pins the date rendered into templates instead of reading the clock.
    pub fn with_render_date(mut self, date: RenderDate) -> Self {
        self.render_date = Some(date);
        self
    }

    pub async fn run(&self) -> Result<RunOutcome, ApplicationError> {
        let run_id = Uuid::new_v4().to_string();
        info!(event_name = "sync.run.started", run_id = %run_id, chat = %self.chat, "price sync started");

        let outcome = self.lock.run(self.sync(&run_id)).await;
        self.finish(&run_id, "run", outcome)
    }

    /// Rebuilds only the navigation post from the persisted directory.
    pub async fn rebuild_navigation_only(&self) -> Result<RunOutcome, ApplicationError> {
        let run_id = Uuid::new_v4().to_string();
        info!(event_name = "sync.nav.started", run_id = %run_id, chat = %self.chat, "navigation rebuild started");

        let outcome = self.lock.run(self.navigation_only(&run_id)).await;
        self.finish(&run_id, "nav", outcome)
    }

    fn finish(
        &self,
        run_id: &str,
        kind: &str,
        outcome: Result<Option<RunReport>, ApplicationError>,
    ) -> Result<RunOutcome, ApplicationError> {
        match outcome {
            Ok(Some(report)) => {
                info!(event_name = "sync.run.completed", run_id, kind, "run completed");
                Ok(RunOutcome::Completed(report))
            }
            Ok(None) => {
                warn!(event_name = "sync.run.skipped", run_id, kind, "run skipped: lock is held");
                Ok(RunOutcome::Skipped)
            }
            Err(run_error) => {
                error!(
                    event_name = "sync.run.failed",
                    run_id,
                    kind,
                    error_class = run_error.error_class(),
                    error = %run_error,
                    "run aborted"
                );
                Err(run_error)
            }
        }
    }

    async fn sync(&self, run_id: &str) -> Result<RunReport, ApplicationError> {
        ensure_system_tables(self.store.as_ref(), &self.config).await?;

        let snapshot = self.load_products().await?;
        if snapshot.dropped_without_group > 0 {
            warn!(
                event_name = "sync.products.rows_dropped",
                run_id,
                dropped = snapshot.dropped_without_group,
                "product rows without a group were ignored"
            );
        }

        let mut directory = self.load_directory().await?;
        let skipped_directory_rows = directory.skipped.len();
        let formatter = self.formatter();

        let reconciler = DirectoryReconciler::new(
            self.store.clone(),
            self.messenger.clone(),
            self.chat.clone(),
            self.config.sheets.directory.clone(),
            self.config.behavior.show_out_of_stock_placeholders,
        );
        let reconcile = reconciler.reconcile(run_id, &snapshot, &mut directory, &formatter).await?;

        let navigation =
            self.navigation().rebuild(run_id, &directory.active_entries(), &formatter).await?;

        Ok(RunReport {
            run_id: run_id.to_owned(),
            dropped_rows: snapshot.dropped_without_group,
            skipped_directory_rows,
            reconcile: Some(reconcile),
            navigation,
        })
    }

    async fn navigation_only(&self, run_id: &str) -> Result<RunReport, ApplicationError> {
        ensure_system_tables(self.store.as_ref(), &self.config).await?;
        let directory = self.load_directory().await?;
        let formatter = self.formatter();

        let navigation =
            self.navigation().rebuild(run_id, &directory.active_entries(), &formatter).await?;

        Ok(RunReport {
            run_id: run_id.to_owned(),
            dropped_rows: 0,
            skipped_directory_rows: directory.skipped.len(),
            reconcile: None,
            navigation,
        })
    }

    /// Column resolution happens here, before any messaging call of the run.
    async fn load_products(&self) -> Result<ProductSnapshot, ApplicationError> {
        let name = &self.config.sheets.products;
        let table = self
            .store
            .read_all(name)
            .await?
            .ok_or_else(|| DomainError::MissingTable(name.clone()))?;
        let columns =
            ProductColumns::resolve(name, &table.column_index(), &self.config.columns.product_names())?;
        Ok(ProductSnapshot::from_rows(&columns, table.data_rows()))
    }

    async fn load_directory(&self) -> Result<Directory, ApplicationError> {
        let name = &self.config.sheets.directory;
        let table = self
            .store
            .read_all(name)
            .await?
            .ok_or_else(|| DomainError::MissingTable(name.clone()))?;
        Ok(Directory::parse(name, &table, &self.config.columns.directory_names())?)
    }

    fn formatter(&self) -> PostFormatter {
        let date = self.render_date.clone().unwrap_or_else(|| RenderDate::now(&self.config.templates));
        PostFormatter::from_config(&self.config, date)
    }

    fn navigation(&self) -> NavigationRebuilder {
        let settings = SheetSettingsStore::new(self.store.clone(), self.config.sheets.settings.clone());
        NavigationRebuilder::new(
            self.messenger.clone(),
            NavigationRecord::new(Arc::new(settings)),
            self.chat.clone(),
            self.config.telegram.link_host.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{PriceSync, RunOutcome};
    use crate::config::AppConfig;
    use crate::domain::cell::Cell;
    use crate::domain::directory::MessageId;
    use crate::format::RenderDate;
    use crate::sync::navigation::NavigationOutcome;
    use crate::test_support::{row, Call, MemoryLock, MemoryTables, RecordingMessenger};

    struct Fixture {
        config: AppConfig,
        tables: Arc<MemoryTables>,
        messenger: Arc<RecordingMessenger>,
        lock: Arc<MemoryLock>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = AppConfig::default();
            config.telegram.chat_id = "@prices".to_owned();
            Self {
                config,
                tables: Arc::new(MemoryTables::default()),
                messenger: Arc::new(RecordingMessenger::default()),
                lock: Arc::new(MemoryLock::default()),
            }
        }

        async fn products(&self, rows: &[&[&str]]) {
            let mut table = vec![row(&["Group", "Category", "Flag", "Name", "Price"])];
            table.extend(rows.iter().map(|cells| row(cells)));
            self.tables.insert(&self.config.sheets.products, table).await;
        }

        fn sync(&self) -> PriceSync {
            PriceSync::new(
                self.config.clone(),
                self.tables.clone(),
                self.messenger.clone(),
                self.lock.clone(),
            )
            .with_render_date(RenderDate("01.02.2026".to_owned()))
        }
    }

    #[tokio::test]
    async fn full_run_creates_posts_then_navigation() {
        let fixture = Fixture::new();
        fixture
            .products(&[
                &["Phones", "Apple", "", "iPhone", "15000"],
                &["", "", "", "orphan", "1"],
                &["Laptops", "", "", "ThinkPad", "40000"],
            ])
            .await;

        let outcome = fixture.sync().run().await.expect("run");

        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.reconcile.as_ref().map(|reconcile| reconcile.created), Some(2));
        assert_eq!(
            report.navigation,
            NavigationOutcome::Published { message_id: MessageId(1_002), replaced: None }
        );

        let calls = fixture.messenger.calls().await;
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3], Call::Pin(MessageId(1_002)));

        let settings = fixture.tables.rows(&fixture.config.sheets.settings).await;
        assert_eq!(settings[1], vec![Cell::text("nav_message_id"), Cell::from(1_002_i64)]);
        assert!(!fixture.lock.is_held(&fixture.config.lock.key).await);
    }

    #[tokio::test]
    async fn held_lock_skips_without_side_effects() {
        let fixture = Fixture::new();
        fixture.products(&[&["Phones", "", "", "iPhone", "15000"]]).await;
        fixture.lock.hold(&fixture.config.lock.key).await;

        let outcome = fixture.sync().run().await.expect("run");

        assert_eq!(outcome, RunOutcome::Skipped);
        assert!(fixture.messenger.calls().await.is_empty());
        assert!(fixture.tables.rows(&fixture.config.sheets.directory).await.is_empty());
    }

    #[tokio::test]
    async fn missing_column_aborts_before_any_call_and_releases_lock() {
        let fixture = Fixture::new();
        fixture
            .tables
            .insert(
                &fixture.config.sheets.products,
                vec![row(&["Group", "Category", "Name", "Price"]), row(&["Phones", "", "iPhone", "1"])],
            )
            .await;

        let error = fixture.sync().run().await.expect_err("missing flag column");

        assert_eq!(error.error_class(), "missing_columns");
        assert!(error.is_fatal_configuration());
        assert!(fixture.messenger.calls().await.is_empty());
        assert!(!fixture.lock.is_held(&fixture.config.lock.key).await);
        assert_eq!(fixture.lock.releases(), 1);
    }

    #[tokio::test]
    async fn missing_product_table_is_fatal() {
        let fixture = Fixture::new();

        let error = fixture.sync().run().await.expect_err("no products table");

        assert_eq!(error.error_class(), "missing_table");
        assert!(fixture.messenger.calls().await.is_empty());
    }

    #[tokio::test]
    async fn navigation_only_uses_persisted_directory() {
        let fixture = Fixture::new();
        fixture
            .tables
            .insert(
                &fixture.config.sheets.directory,
                vec![
                    row(&["Group", "message_id", "Status"]),
                    row(&["Phones", "10", "Active"]),
                    row(&["Laptops", "11", "Inactive"]),
                ],
            )
            .await;

        let outcome = fixture.sync().rebuild_navigation_only().await.expect("nav");

        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(report.reconcile, None);
        let calls = fixture.messenger.calls().await;
        let Call::Send { buttons, .. } = &calls[0] else {
            panic!("expected navigation send, got {calls:?}");
        };
        assert_eq!(buttons, &vec![("Phones".to_owned(), "https://t.me/prices/10".to_owned())]);
    }
}
