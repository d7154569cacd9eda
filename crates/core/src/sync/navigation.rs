use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::chat::ChatId;
use crate::domain::directory::{DirectoryEntry, MessageId};
use crate::errors::ApplicationError;
use crate::format::PostFormatter;
use crate::ports::MessagingClient;
use crate::settings::NavigationRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// No active groups and no navigation post on record.
    Empty,
    /// No active groups; the recorded post was taken down and the record cleared.
    Cleared { removed: MessageId },
    /// The new post could not be sent; the previous one stays in place.
    SendFailed { kept: Option<MessageId> },
    /// The new post was sent but not pinned; the previous one was kept.
    PinFailed { message_id: MessageId, kept: Option<MessageId> },
    Published { message_id: MessageId, replaced: Option<MessageId> },
}

/// Replaces the pinned navigation post with one listing the active groups.
pub struct NavigationRebuilder {
    messenger: Arc<dyn MessagingClient>,
    record: NavigationRecord,
    chat: ChatId,
    link_host: String,
}

impl NavigationRebuilder {
    pub fn new(
        messenger: Arc<dyn MessagingClient>,
        record: NavigationRecord,
        chat: ChatId,
        link_host: impl Into<String>,
    ) -> Self {
        Self { messenger, record, chat, link_host: link_host.into() }
    }

    pub async fn rebuild(
        &self,
        run_id: &str,
        active: &[DirectoryEntry],
        formatter: &PostFormatter,
    ) -> Result<NavigationOutcome, ApplicationError> {
        let previous = self.record.load().await?;

        if active.is_empty() {
            let Some(previous) = previous else {
                info!(event_name = "sync.navigation.empty", run_id, "no active groups to list");
                return Ok(NavigationOutcome::Empty);
            };
            self.take_down(run_id, previous).await;
            self.record.save(None).await?;
            info!(
                event_name = "sync.navigation.cleared",
                run_id,
                message_id = %previous,
                "no active groups; navigation post removed"
            );
            return Ok(NavigationOutcome::Cleared { removed: previous });
        }

        let post = formatter.navigation_post(&self.chat, &self.link_host, active);
        let message_id = match self.messenger.send(&self.chat, &post.text, Some(&post.keyboard)).await {
            Ok(message_id) => message_id,
            Err(delivery_error) => {
                warn!(
                    event_name = "sync.navigation.send_failed",
                    run_id,
                    error = %delivery_error,
                    "navigation post was not sent; keeping the previous one"
                );
                return Ok(NavigationOutcome::SendFailed { kept: previous });
            }
        };

        if let Err(delivery_error) = self.messenger.pin(&self.chat, message_id).await {
            warn!(
                event_name = "sync.navigation.pin_failed",
                run_id,
                message_id = %message_id,
                error = %delivery_error,
                "navigation post was not pinned; keeping the previous one"
            );
            self.record.save(Some(message_id)).await?;
            return Ok(NavigationOutcome::PinFailed { message_id, kept: previous });
        }

        let replaced = previous.filter(|previous| *previous != message_id);
        if let Some(replaced) = replaced {
            self.take_down(run_id, replaced).await;
        }
        self.record.save(Some(message_id)).await?;

        info!(
            event_name = "sync.navigation.published",
            run_id,
            message_id = %message_id,
            groups = active.len(),
            "navigation post published"
        );
        Ok(NavigationOutcome::Published { message_id, replaced })
    }

    /// Unpins and deletes a previous navigation post. Failures are only logged.
    async fn take_down(&self, run_id: &str, message_id: MessageId) {
        if let Err(delivery_error) = self.messenger.unpin(&self.chat, message_id).await {
            warn!(
                event_name = "sync.navigation.unpin_failed",
                run_id,
                message_id = %message_id,
                error = %delivery_error,
                "previous navigation post was not unpinned"
            );
        }
        if let Err(delivery_error) = self.messenger.delete(&self.chat, message_id).await {
            warn!(
                event_name = "sync.navigation.delete_failed",
                run_id,
                message_id = %message_id,
                error = %delivery_error,
                "previous navigation post was not deleted"
            );
        }
    }
}
