use crate::domain::cell::Cell;
use crate::domain::table::{cell_at, ColumnIndex, Row};
use crate::errors::DomainError;

/// One line of the price list, rebuilt from the product table on every run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRow {
    pub group: String,
    pub category: Option<String>,
    pub flag: Option<String>,
    pub name: String,
    pub raw_price: Cell,
}

impl ProductRow {
    pub fn price(&self) -> Option<i64> {
        self.raw_price.leading_integer()
    }
}

/// Configured header names of the product table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductColumnNames {
    pub group: String,
    pub category: String,
    pub flag: String,
    pub name: String,
    pub price: String,
}

/// Resolved column positions of the product table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductColumns {
    pub group: usize,
    pub category: usize,
    pub flag: usize,
    pub name: usize,
    pub price: usize,
}

impl ProductColumns {
    pub fn resolve(
        table: &str,
        index: &ColumnIndex,
        names: &ProductColumnNames,
    ) -> Result<Self, DomainError> {
        let required = [
            names.group.as_str(),
            names.category.as_str(),
            names.flag.as_str(),
            names.name.as_str(),
            names.price.as_str(),
        ];
        let missing = index.missing(&required);
        if !missing.is_empty() {
            return Err(DomainError::MissingColumns {
                table: table.to_owned(),
                columns: missing.into_iter().map(str::to_owned).collect(),
            });
        }

        let position = |name: &str| index.position(name).unwrap_or_default();
        Ok(Self {
            group: position(&names.group),
            category: position(&names.category),
            flag: position(&names.flag),
            name: position(&names.name),
            price: position(&names.price),
        })
    }

    /// `None` when the row carries no group name.
    pub fn read(&self, row: &Row) -> Option<ProductRow> {
        let group = cell_at(row, self.group).as_label()?;
        Some(ProductRow {
            group,
            category: cell_at(row, self.category).as_label(),
            flag: cell_at(row, self.flag).as_label(),
            name: cell_at(row, self.name).as_label().unwrap_or_default(),
            raw_price: cell_at(row, self.price).clone(),
        })
    }
}

/// Product rows that survived filtering, plus how many were dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductSnapshot {
    pub rows: Vec<ProductRow>,
    pub dropped_without_group: usize,
}

impl ProductSnapshot {
    pub fn from_rows(columns: &ProductColumns, rows: &[Row]) -> Self {
        let mut snapshot = Self::default();
        for row in rows {
            match columns.read(row) {
                Some(product) => snapshot.rows.push(product),
                None => snapshot.dropped_without_group += 1,
            }
        }
        snapshot
    }

    /// Distinct group names in first-appearance order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = indexmap::IndexSet::new();
        for row in &self.rows {
            seen.insert(row.group.as_str());
        }
        seen.into_iter().collect()
    }

    pub fn rows_for<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a ProductRow> + 'a {
        self.rows.iter().filter(move |row| row.group == group)
    }
}
