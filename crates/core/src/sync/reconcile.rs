//! Diffs the product snapshot against the persisted directory and applies the
//! resulting edits, placeholders and new posts.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::chat::ChatId;
use crate::domain::directory::{Directory, DirectoryEntry, GroupStatus, SkippedRow};
use crate::domain::product::ProductSnapshot;
use crate::errors::ApplicationError;
use crate::format::PostFormatter;
use crate::ports::{MessagingClient, TabularStore};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub active_groups: usize,
    pub status_changes: usize,
    pub edited: usize,
    pub placeholders: usize,
    pub untouched_inactive: usize,
    pub created: usize,
    pub failed_calls: usize,
    pub append_failures: usize,
}

pub struct DirectoryReconciler {
    store: Arc<dyn TabularStore>,
    messenger: Arc<dyn MessagingClient>,
    chat: ChatId,
    directory_table: String,
    show_placeholders: bool,
}

impl DirectoryReconciler {
    pub fn new(
        store: Arc<dyn TabularStore>,
        messenger: Arc<dyn MessagingClient>,
        chat: ChatId,
        directory_table: impl Into<String>,
        show_placeholders: bool,
    ) -> Self {
        Self {
            store,
            messenger,
            chat,
            directory_table: directory_table.into(),
            show_placeholders,
        }
    }

    /// Brings the directory and the chat in line with `snapshot`.
    ///
    /// Store failures are fatal. Messaging failures are counted and logged and the
    /// remaining groups are still processed. On return `directory` holds the
    /// reconciled state, including entries created during this call.
    pub async fn reconcile(
        &self,
        run_id: &str,
        snapshot: &ProductSnapshot,
        directory: &mut Directory,
        formatter: &PostFormatter,
    ) -> Result<ReconcileReport, ApplicationError> {
        let groups = snapshot.groups();
        let active: HashSet<&str> = groups.iter().copied().collect();
        let mut report = ReconcileReport { active_groups: groups.len(), ..Default::default() };

        log_skipped_rows(run_id, &self.directory_table, &directory.skipped);

        for index in 0..directory.records.len() {
            let status = if active.contains(directory.records[index].entry.group_name.as_str()) {
                GroupStatus::Active
            } else {
                GroupStatus::Inactive
            };
            if directory.set_status(index, status) {
                report.status_changes += 1;
            }
        }

        if report.status_changes > 0 {
            self.store.write_range(&self.directory_table, 1, &directory.raw_rows).await?;
            info!(
                event_name = "sync.reconcile.statuses_persisted",
                run_id,
                changes = report.status_changes,
                "persisted directory status changes"
            );
        }

        let existing: Vec<DirectoryEntry> = directory.entries().cloned().collect();
        for entry in &existing {
            match entry.status {
                GroupStatus::Active => {
                    let text = formatter.product_post(&entry.group_name, snapshot.rows_for(&entry.group_name));
                    self.edit(run_id, entry, &text, &mut report).await;
                    report.edited += 1;
                }
                GroupStatus::Inactive if self.show_placeholders => {
                    let text = formatter.out_of_stock_post(&entry.group_name);
                    self.edit(run_id, entry, &text, &mut report).await;
                    report.placeholders += 1;
                }
                GroupStatus::Inactive => report.untouched_inactive += 1,
            }
        }

        for group in groups {
            if directory.get(group).is_some() {
                continue;
            }
            let text = formatter.product_post(group, snapshot.rows_for(group));
            let reuse = directory.unusable_row(group);
            if let Some(entry) = self.create(run_id, group, &text, directory, reuse, &mut report).await {
                match reuse {
                    Some(row_offset) => directory.adopt(row_offset, entry),
                    None => directory.push(entry),
                }
                report.created += 1;
            }
        }

        info!(
            event_name = "sync.reconcile.completed",
            run_id,
            active_groups = report.active_groups,
            edited = report.edited,
            placeholders = report.placeholders,
            created = report.created,
            failed_calls = report.failed_calls,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn edit(&self, run_id: &str, entry: &DirectoryEntry, text: &str, report: &mut ReconcileReport) {
        if let Err(delivery_error) = self.messenger.edit(&self.chat, entry.message_id, text).await {
            report.failed_calls += 1;
            warn!(
                event_name = "sync.reconcile.edit_failed",
                run_id,
                group = %entry.group_name,
                message_id = %entry.message_id,
                error = %delivery_error,
                "group post was not updated"
            );
        }
    }

    /// Sends a new post and saves its directory row, overwriting `reuse` when the group
    /// already has a row without a usable message id. `None` when nothing should be
    /// recorded in memory: the send failed, or the row could not be persisted.
    async fn create(
        &self,
        run_id: &str,
        group: &str,
        text: &str,
        directory: &Directory,
        reuse: Option<usize>,
        report: &mut ReconcileReport,
    ) -> Option<DirectoryEntry> {
        let message_id = match self.messenger.send(&self.chat, text, None).await {
            Ok(message_id) => message_id,
            Err(delivery_error) => {
                report.failed_calls += 1;
                warn!(
                    event_name = "sync.reconcile.send_failed",
                    run_id,
                    group,
                    error = %delivery_error,
                    "new group post was not sent; will retry next run"
                );
                return None;
            }
        };

        let entry = DirectoryEntry {
            group_name: group.to_owned(),
            message_id,
            status: GroupStatus::Active,
        };
        let saved = match reuse {
            Some(row_offset) => {
                let row = directory.repaired_row(row_offset, &entry);
                self.store
                    .write_range(&self.directory_table, row_offset + 1, std::slice::from_ref(&row))
                    .await
            }
            None => {
                let row = directory.columns.render(&entry);
                self.store.append_row(&self.directory_table, &row).await
            }
        };
        if let Err(store_error) = saved {
            report.append_failures += 1;
            error!(
                event_name = "sync.reconcile.append_failed",
                run_id,
                group,
                message_id = %message_id,
                error = %store_error,
                "post was sent but its directory row was not saved"
            );
            return None;
        }

        info!(
            event_name = "sync.reconcile.group_created",
            run_id,
            group,
            message_id = %message_id,
            reused_row = ?reuse,
            "created post for new group"
        );
        Some(entry)
    }
}

fn log_skipped_rows(run_id: &str, table: &str, skipped: &[SkippedRow]) {
    for row in skipped {
        match row {
            SkippedRow::BlankGroup { row_offset } => warn!(
                event_name = "sync.directory.row_skipped",
                run_id,
                table,
                row_offset,
                reason = "blank_group",
                "directory row has no group name"
            ),
            SkippedRow::InvalidMessageId { row_offset, group_name } => warn!(
                event_name = "sync.directory.row_skipped",
                run_id,
                table,
                row_offset,
                group = %group_name,
                reason = "invalid_message_id",
                "directory row has no usable message id"
            ),
            SkippedRow::DuplicateGroup { row_offset, group_name } => warn!(
                event_name = "sync.directory.row_skipped",
                run_id,
                table,
                row_offset,
                group = %group_name,
                reason = "duplicate_group",
                "group already listed earlier in the directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{DirectoryReconciler, ReconcileReport};
    use crate::config::AppConfig;
    use crate::domain::cell::Cell;
    use crate::domain::chat::ChatId;
    use crate::domain::directory::{Directory, GroupStatus, MessageId};
    use crate::domain::product::{ProductColumns, ProductSnapshot};
    use crate::domain::table::Table;
    use crate::format::{PostFormatter, RenderDate};
    use crate::test_support::{row, Call, MemoryTables, RecordingMessenger};

    const DIRECTORY: &str = "Post directory";

    fn formatter(config: &AppConfig) -> PostFormatter {
        PostFormatter::from_config(config, RenderDate("01.02.2026".to_owned()))
    }

    fn snapshot(config: &AppConfig, rows: &[&[&str]]) -> ProductSnapshot {
        let mut table = vec![row(&["Group", "Category", "Flag", "Name", "Price"])];
        table.extend(rows.iter().map(|cells| row(cells)));
        let table = Table::new(table);
        let columns =
            ProductColumns::resolve("Prices", &table.column_index(), &config.columns.product_names())
                .expect("columns");
        ProductSnapshot::from_rows(&columns, table.data_rows())
    }

    async fn directory(store: &MemoryTables, config: &AppConfig, rows: &[&[&str]]) -> Directory {
        let mut table = vec![row(&["Group", "message_id", "Status"])];
        table.extend(rows.iter().map(|cells| row(cells)));
        store.insert(DIRECTORY, table).await;
        reload(store, config).await
    }

    async fn reload(store: &MemoryTables, config: &AppConfig) -> Directory {
        let table = Table::new(store.rows(DIRECTORY).await);
        Directory::parse(DIRECTORY, &table, &config.columns.directory_names()).expect("directory")
    }

    fn reconciler(
        store: &Arc<MemoryTables>,
        messenger: &Arc<RecordingMessenger>,
        show_placeholders: bool,
    ) -> DirectoryReconciler {
        DirectoryReconciler::new(
            store.clone(),
            messenger.clone(),
            ChatId::new("@prices"),
            DIRECTORY,
            show_placeholders,
        )
    }

    #[tokio::test]
    async fn new_group_gets_one_post_and_one_directory_row() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory = directory(&store, &config, &[]).await;
        let snapshot = snapshot(&config, &[&["Phones", "Apple", "", "iPhone", "15000"]]);

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        assert_eq!(report.created, 1);
        let calls = messenger.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Send { message_id: MessageId(1_000), .. }));

        let persisted = reload(&store, &config).await;
        let entry = persisted.get("Phones").expect("entry");
        assert_eq!(entry.message_id, MessageId(1_000));
        assert_eq!(entry.status, GroupStatus::Active);
        assert_eq!(directory.active_entries().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_leaves_directory_unchanged() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        messenger.fail("sendMessage").await;
        let mut directory = directory(&store, &config, &[]).await;
        let snapshot = snapshot(&config, &[&["Phones", "", "", "iPhone", "15000"]]);

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        assert_eq!(report.created, 0);
        assert_eq!(report.failed_calls, 1);
        assert_eq!(store.rows(DIRECTORY).await.len(), 1);
        assert!(directory.active_entries().is_empty());
    }

    #[tokio::test]
    async fn failed_append_is_reported_and_not_recorded() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory = directory(&store, &config, &[]).await;
        store.fail_appends_to(DIRECTORY).await;
        let snapshot = snapshot(&config, &[&["Phones", "", "", "iPhone", "15000"]]);

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("append failure is not fatal");

        assert_eq!(report.append_failures, 1);
        assert_eq!(report.created, 0);
        assert!(directory.get("Phones").is_none());
    }

    #[tokio::test]
    async fn vanished_group_is_retired_and_left_untouched_by_default() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory =
            directory(&store, &config, &[&["Phones", "10", "Active"], &["Laptops", "11", "Active"]])
                .await;
        let snapshot = snapshot(&config, &[&["Phones", "", "", "iPhone", "15000"]]);

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        assert_eq!(report.status_changes, 1);
        assert_eq!(report.untouched_inactive, 1);
        assert_eq!(store.range_writes(), 1);
        let calls = messenger.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Edit { message_id: MessageId(10), .. }));

        let persisted = reload(&store, &config).await;
        assert_eq!(persisted.get("Laptops").expect("entry").status, GroupStatus::Inactive);
        assert_eq!(persisted.get("Phones").expect("entry").status, GroupStatus::Active);
    }

    #[tokio::test]
    async fn vanished_group_gets_placeholder_when_enabled() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory = directory(&store, &config, &[&["Laptops", "11", "Active"]]).await;
        let snapshot = snapshot(&config, &[]);
        let formatter = formatter(&config);

        let report = reconciler(&store, &messenger, true)
            .reconcile("run", &snapshot, &mut directory, &formatter)
            .await
            .expect("reconcile");

        assert_eq!(report.placeholders, 1);
        assert_eq!(
            messenger.calls().await,
            vec![Call::Edit { message_id: MessageId(11), text: formatter.out_of_stock_post("Laptops") }]
        );
        assert!(directory.active_entries().is_empty());
    }

    #[tokio::test]
    async fn rerun_with_same_snapshot_is_idempotent() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let rows: &[&[&str]] = &[
            &["Phones", "Apple", "🇺🇸", "iPhone", "25000"],
            &["Phones", "Samsung", "", "Galaxy", "abc"],
            &["Laptops", "", "", "ThinkPad", "40000"],
        ];
        let reconciler = reconciler(&store, &messenger, false);
        let formatter = formatter(&config);

        let mut first = directory(&store, &config, &[]).await;
        reconciler
            .reconcile("run-1", &snapshot(&config, rows), &mut first, &formatter)
            .await
            .expect("first run");
        let created_texts: Vec<(MessageId, String)> = messenger
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { message_id, text, .. } => Some((message_id, text)),
                _ => None,
            })
            .collect();
        messenger.clear().await;

        let mut second = reload(&store, &config).await;
        let report = reconciler
            .reconcile("run-2", &snapshot(&config, rows), &mut second, &formatter)
            .await
            .expect("second run");
        let edited_texts: Vec<(MessageId, String)> = messenger
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                Call::Edit { message_id, text } => Some((message_id, text)),
                _ => None,
            })
            .collect();

        assert_eq!(report, ReconcileReport { active_groups: 2, edited: 2, ..Default::default() });
        assert_eq!(edited_texts, created_texts);
        assert_eq!(store.range_writes(), 0);

        messenger.clear().await;
        let mut third = reload(&store, &config).await;
        reconciler
            .reconcile("run-3", &snapshot(&config, rows), &mut third, &formatter)
            .await
            .expect("third run");
        let third_texts: Vec<Call> = messenger.calls().await;
        assert_eq!(
            third_texts,
            edited_texts
                .into_iter()
                .map(|(message_id, text)| Call::Edit { message_id, text })
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn reactivated_group_reuses_its_message() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory = directory(&store, &config, &[&["Phones", "10", "Inactive"]]).await;
        let snapshot = snapshot(&config, &[&["Phones", "", "", "iPhone", "15000"]]);

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        assert_eq!(report.created, 0);
        assert_eq!(report.status_changes, 1);
        assert!(matches!(&messenger.calls().await[0], Call::Edit { message_id: MessageId(10), .. }));
        let rows = store.rows(DIRECTORY).await;
        assert_eq!(rows[1][2], Cell::text("Active"));
    }

    #[tokio::test]
    async fn unparseable_directory_rows_survive_status_write_back() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory = directory(
            &store,
            &config,
            &[&["Phones", "10", "Active"], &["", "12", "Active"], &["Tablets", "n/a", "Active"]],
        )
        .await;
        let snapshot = snapshot(&config, &[]);

        reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        let rows = store.rows(DIRECTORY).await;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], row(&["Phones", "10", "Inactive"]));
        assert_eq!(rows[2], row(&["", "12", "Active"]));
        assert_eq!(rows[3], row(&["Tablets", "n/a", "Active"]));
    }

    #[tokio::test]
    async fn group_with_unusable_message_id_reuses_its_directory_row() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryTables::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let mut directory =
            directory(&store, &config, &[&["Phones", "10", "Active"], &["Tablets", "n/a", "Active"]]).await;
        let snapshot = snapshot(
            &config,
            &[&["Phones", "", "", "iPhone", "15000"], &["Tablets", "", "", "iPad", "20000"]],
        );

        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut directory, &formatter(&config))
            .await
            .expect("reconcile");

        assert_eq!(report.created, 1);
        let rows = store.rows(DIRECTORY).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], row(&["Phones", "10", "Active"]));
        assert_eq!(rows[2], vec![Cell::text("Tablets"), Cell::from(1000_i64), Cell::text("Active")]);
        assert_eq!(directory.get("Tablets").map(|entry| entry.message_id), Some(MessageId(1000)));
        assert!(directory.skipped.is_empty());

        messenger.clear().await;
        let mut reloaded = reload(&store, &config).await;
        let report = reconciler(&store, &messenger, false)
            .reconcile("run", &snapshot, &mut reloaded, &formatter(&config))
            .await
            .expect("second reconcile");

        assert_eq!(report.created, 0);
        assert_eq!(report.edited, 2);
        assert_eq!(store.rows(DIRECTORY).await.len(), 3);
    }
}
