use crate::config::PricingConfig;

/// Markup-then-round rule applied to every parseable purchase price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingRules {
    pub high_markup: i64,
    pub low_markup: i64,
    pub low_markup_threshold: i64,
    pub rounding_unit: i64,
}

impl PricingRules {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            high_markup: config.high_markup,
            low_markup: config.low_markup,
            low_markup_threshold: config.low_markup_threshold,
            rounding_unit: config.rounding_unit,
        }
    }

    /// Prices at or below the threshold take the low markup, the rest the high
    /// markup; the sum is rounded up to the next multiple of `rounding_unit`.
    pub fn retail_price(&self, purchase_price: i64) -> i64 {
        let markup = if purchase_price <= self.low_markup_threshold {
            self.low_markup
        } else {
            self.high_markup
        };
        round_up(purchase_price.saturating_add(markup), self.rounding_unit)
    }
}

fn round_up(value: i64, unit: i64) -> i64 {
    if unit <= 1 {
        return value;
    }
    let remainder = value.rem_euclid(unit);
    if remainder == 0 {
        value
    } else {
        value.saturating_add(unit - remainder)
    }
}

/// Groups digits in threes, e.g. `31000` with `" "` becomes `31 000`.
pub fn group_thousands(value: i64, separator: &str) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + separator.len() * (digits.len() / 3));
    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push_str(separator);
        }
        grouped.push(digit);
    }
    grouped
}
