//! Rendering of group posts, out-of-stock placeholders and the navigation post.
//!
//! Everything here is a pure function of its inputs. The render date is fixed once
//! per run, so formatting the same rows twice yields byte-identical text.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use indexmap::IndexMap;

use crate::config::{AppConfig, TemplatesConfig};
use crate::domain::chat::{ChatId, InlineKeyboard, LinkButton};
use crate::domain::directory::DirectoryEntry;
use crate::domain::product::ProductRow;
use crate::pricing::{group_thousands, PricingRules};

const GROUP_NAME_SLOT: &str = "{groupName}";
const DATE_SLOT: &str = "{date}";

/// The date string substituted into every template of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderDate(pub String);

impl RenderDate {
    pub fn now(templates: &TemplatesConfig) -> Self {
        Self::at(Utc::now(), templates)
    }

    pub fn at(instant: DateTime<Utc>, templates: &TemplatesConfig) -> Self {
        let offset = FixedOffset::east_opt(templates.utc_offset_hours * 3_600)
            .unwrap_or_else(|| Utc.fix());
        Self(instant.with_timezone(&offset).format(&templates.date_format).to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostTemplates {
    pub header: String,
    pub footer: String,
    pub out_of_stock: String,
    pub nav_header: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatOptions {
    pub show_items_without_price: bool,
    pub other_category: String,
    pub price_on_request: String,
    pub currency: String,
    pub thousands_separator: String,
}

/// Navigation message: header text plus one link button per active group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationPost {
    pub text: String,
    pub keyboard: InlineKeyboard,
}

#[derive(Clone, Debug)]
pub struct PostFormatter {
    templates: PostTemplates,
    rules: PricingRules,
    options: FormatOptions,
    date: RenderDate,
}

impl PostFormatter {
    pub fn new(
        templates: PostTemplates,
        rules: PricingRules,
        options: FormatOptions,
        date: RenderDate,
    ) -> Self {
        Self { templates, rules, options, date }
    }

    pub fn from_config(config: &AppConfig, date: RenderDate) -> Self {
        Self::new(
            PostTemplates {
                header: config.templates.header.clone(),
                footer: config.templates.footer.clone(),
                out_of_stock: config.templates.out_of_stock.clone(),
                nav_header: config.templates.nav_header.clone(),
            },
            PricingRules::from_config(&config.pricing),
            FormatOptions {
                show_items_without_price: config.behavior.show_items_without_price,
                other_category: config.templates.other_category.clone(),
                price_on_request: config.templates.price_on_request.clone(),
                currency: config.pricing.currency.clone(),
                thousands_separator: config.pricing.thousands_separator.clone(),
            },
            date,
        )
    }

    /// Full post for one group: header, one block per non-empty category, footer.
    pub fn product_post<'a>(
        &self,
        group_name: &str,
        rows: impl IntoIterator<Item = &'a ProductRow>,
    ) -> String {
        let mut text = self.fill(&self.templates.header, group_name);

        for (category, mut items) in self.bucket_by_category(rows) {
            if !self.options.show_items_without_price {
                items.retain(|row| row.price().is_some());
            }
            if items.is_empty() {
                continue;
            }

            // Stable: equal prices and unpriced rows keep sheet order.
            items.sort_by_key(|row| {
                let price = row.price();
                (price.is_none(), price)
            });

            text.push_str(&format!("\n<b>{}</b>\n", escape_html(&category)));
            for row in items {
                text.push_str(&self.item_line(row));
                text.push('\n');
            }
        }

        text.push_str(&self.templates.footer);
        text
    }

    pub fn out_of_stock_post(&self, group_name: &str) -> String {
        self.fill(&self.templates.out_of_stock, group_name)
    }

    /// Navigation post for the given active entries, sorted by group name.
    pub fn navigation_post(
        &self,
        chat: &ChatId,
        link_host: &str,
        active: &[DirectoryEntry],
    ) -> NavigationPost {
        let mut sorted: Vec<&DirectoryEntry> = active.iter().collect();
        sorted.sort_by(|left, right| locale_compare(&left.group_name, &right.group_name));

        let keyboard = InlineKeyboard::one_per_row(sorted.into_iter().map(|entry| LinkButton {
            text: entry.group_name.clone(),
            url: chat.message_link(link_host, entry.message_id),
        }));

        NavigationPost { text: self.templates.nav_header.replace(DATE_SLOT, &self.date.0), keyboard }
    }

    fn bucket_by_category<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a ProductRow>,
    ) -> IndexMap<String, Vec<&'a ProductRow>> {
        let mut buckets: IndexMap<String, Vec<&'a ProductRow>> = IndexMap::new();
        for row in rows {
            let category =
                row.category.clone().unwrap_or_else(|| self.options.other_category.clone());
            buckets.entry(category).or_default().push(row);
        }
        buckets
    }

    fn item_line(&self, row: &ProductRow) -> String {
        let price = match row.price() {
            Some(purchase) => format!(
                "{}{}",
                group_thousands(self.rules.retail_price(purchase), &self.options.thousands_separator),
                self.options.currency
            ),
            None => self.options.price_on_request.clone(),
        };
        // A missing flag still leaves the separating space.
        let flag = row.flag.as_deref().map(escape_html).unwrap_or_default();
        format!("{flag} {} – {price}", escape_html(&row.name))
    }

    fn fill(&self, template: &str, group_name: &str) -> String {
        template.replace(GROUP_NAME_SLOT, &escape_html(group_name)).replace(DATE_SLOT, &self.date.0)
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Case-insensitive ordering with `ё` sorted right after `е`; ties fall back to
/// the raw strings so the order is total.
pub fn locale_compare(left: &str, right: &str) -> Ordering {
    collation_key(left).cmp(&collation_key(right)).then_with(|| left.cmp(right))
}

fn collation_key(value: &str) -> Vec<(char, u8)> {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'ё' => ('е', 1),
            other => (other, 0),
        })
        .collect()
}
