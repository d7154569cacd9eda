use std::fmt;

use serde::Serialize;

use crate::domain::directory::MessageId;

const SUPERGROUP_PREFIX: &str = "-100";

/// Target chat: either a numeric id (`-1001234567890`) or a public handle (`@channel`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segment used in public message links: supergroup ids lose their
    /// `-100` prefix, handles lose their leading `@`.
    pub fn link_segment(&self) -> &str {
        if let Some(stripped) = self.0.strip_prefix(SUPERGROUP_PREFIX) {
            return stripped;
        }
        self.0.strip_prefix('@').unwrap_or(&self.0)
    }

    pub fn message_link(&self, host: &str, message_id: MessageId) -> String {
        format!("https://{host}/{}/{message_id}", self.link_segment())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Button grid attached to a message. Serializes as the Bot API `reply_markup`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<LinkButton>>,
}

impl InlineKeyboard {
    pub fn one_per_row(buttons: impl IntoIterator<Item = LinkButton>) -> Self {
        Self { inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect() }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &LinkButton> {
        self.inline_keyboard.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatId, InlineKeyboard, LinkButton};
    use crate::domain::directory::MessageId;

    #[test]
    fn supergroup_ids_drop_their_prefix() {
        let chat = ChatId::new("-1001234567890");
        assert_eq!(chat.message_link("t.me", MessageId(42)), "https://t.me/1234567890/42");
    }

    #[test]
    fn handles_drop_the_at_sign() {
        let chat = ChatId::new(" @prices ");
        assert_eq!(chat.message_link("t.me", MessageId(7)), "https://t.me/prices/7");
    }

    #[test]
    fn keyboard_serializes_as_reply_markup() {
        let keyboard = InlineKeyboard::one_per_row([LinkButton {
            text: "Audio".to_owned(),
            url: "https://t.me/prices/7".to_owned(),
        }]);
        let json = serde_json::to_value(&keyboard).expect("serialize keyboard");
        assert_eq!(
            json,
            serde_json::json!({"inline_keyboard": [[{"text": "Audio", "url": "https://t.me/prices/7"}]]})
        );
    }
}
