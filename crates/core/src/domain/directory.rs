use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::cell::Cell;
use crate::domain::table::{cell_at, ColumnIndex, Row, Table};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MessageId {
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Number(value) if value.is_finite() && value.fract() == 0.0 => {
                Some(Self(*value as i64))
            }
            Cell::Text(value) => value.trim().parse::<i64>().ok().map(Self),
            _ => None,
        }
    }

    pub fn to_cell(self) -> Cell {
        Cell::from(self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Active,
    Inactive,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    /// Anything other than a case-insensitive `active` reads as inactive.
    pub fn from_cell(cell: &Cell) -> Self {
        match cell.as_label() {
            Some(label) if label.eq_ignore_ascii_case("active") => Self::Active,
            _ => Self::Inactive,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub group_name: String,
    pub message_id: MessageId,
    pub status: GroupStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryColumnNames {
    pub group: String,
    pub message_id: String,
    pub status: String,
}

impl DirectoryColumnNames {
    pub fn headers(&self) -> Vec<&str> {
        vec![self.group.as_str(), self.message_id.as_str(), self.status.as_str()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectoryColumns {
    pub group: usize,
    pub message_id: usize,
    pub status: usize,
    pub width: usize,
}

impl DirectoryColumns {
    pub fn resolve(
        table: &str,
        index: &ColumnIndex,
        names: &DirectoryColumnNames,
    ) -> Result<Self, DomainError> {
        let missing = index.missing(&names.headers());
        if !missing.is_empty() {
            return Err(DomainError::MissingColumns {
                table: table.to_owned(),
                columns: missing.into_iter().map(str::to_owned).collect(),
            });
        }

        let position = |name: &str| index.position(name).unwrap_or_default();
        Ok(Self {
            group: position(&names.group),
            message_id: position(&names.message_id),
            status: position(&names.status),
            width: index.width(),
        })
    }

    /// Lays an entry out as a table row of this directory's width.
    pub fn render(&self, entry: &DirectoryEntry) -> Row {
        let mut row = vec![Cell::Empty; self.width];
        row[self.group] = Cell::text(entry.group_name.clone());
        row[self.message_id] = entry.message_id.to_cell();
        row[self.status] = Cell::text(entry.status.as_str());
        row
    }
}

/// A directory entry together with the table row it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryRecord {
    pub row_offset: usize,
    pub entry: DirectoryEntry,
}

/// Why a directory row was not turned into an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkippedRow {
    BlankGroup { row_offset: usize },
    InvalidMessageId { row_offset: usize, group_name: String },
    DuplicateGroup { row_offset: usize, group_name: String },
}

/// Persisted group-to-message mapping. Raw rows are kept so a status write-back
/// reproduces every row, including ones that could not be parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct Directory {
    pub columns: DirectoryColumns,
    pub raw_rows: Vec<Row>,
    pub records: Vec<DirectoryRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl Directory {
    pub fn parse(
        table_name: &str,
        table: &Table,
        names: &DirectoryColumnNames,
    ) -> Result<Self, DomainError> {
        let columns = DirectoryColumns::resolve(table_name, &table.column_index(), names)?;
        let raw_rows = table.data_rows().to_vec();
        let mut records: Vec<DirectoryRecord> = Vec::new();
        let mut skipped = Vec::new();

        for (row_offset, row) in raw_rows.iter().enumerate() {
            let Some(group_name) = cell_at(row, columns.group).as_label() else {
                skipped.push(SkippedRow::BlankGroup { row_offset });
                continue;
            };
            if records.iter().any(|record| record.entry.group_name == group_name) {
                skipped.push(SkippedRow::DuplicateGroup { row_offset, group_name });
                continue;
            }
            let Some(message_id) = MessageId::from_cell(cell_at(row, columns.message_id)) else {
                skipped.push(SkippedRow::InvalidMessageId { row_offset, group_name });
                continue;
            };

            records.push(DirectoryRecord {
                row_offset,
                entry: DirectoryEntry {
                    group_name,
                    message_id,
                    status: GroupStatus::from_cell(cell_at(row, columns.status)),
                },
            });
        }

        Ok(Self { columns, raw_rows, records, skipped })
    }

    pub fn get(&self, group_name: &str) -> Option<&DirectoryEntry> {
        self.records
            .iter()
            .map(|record| &record.entry)
            .find(|entry| entry.group_name == group_name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.records.iter().map(|record| &record.entry)
    }

    pub fn active_entries(&self) -> Vec<DirectoryEntry> {
        self.entries().filter(|entry| entry.status == GroupStatus::Active).cloned().collect()
    }

    /// Sets a record's status and mirrors it into the raw row.
    /// Returns `true` when the stored value changed.
    pub fn set_status(&mut self, record_index: usize, status: GroupStatus) -> bool {
        let Some(record) = self.records.get_mut(record_index) else {
            return false;
        };
        let row = &mut self.raw_rows[record.row_offset];
        if row.len() <= self.columns.status {
            row.resize(self.columns.status + 1, Cell::Empty);
        }

        let stored = row[self.columns.status].as_label();
        record.entry.status = status;
        row[self.columns.status] = Cell::text(status.as_str());
        stored.as_deref() != Some(status.as_str())
    }

    /// Offset of a row that names `group_name` but carries no usable message id.
    pub fn unusable_row(&self, group_name: &str) -> Option<usize> {
        self.skipped.iter().find_map(|skipped| match skipped {
            SkippedRow::InvalidMessageId { row_offset, group_name: name } if name == group_name => {
                Some(*row_offset)
            }
            _ => None,
        })
    }

    /// The row at `row_offset` with the entry's cells written over it. Cells outside
    /// the directory columns are kept.
    pub fn repaired_row(&self, row_offset: usize, entry: &DirectoryEntry) -> Row {
        let mut row = self.raw_rows.get(row_offset).cloned().unwrap_or_default();
        if row.len() < self.columns.width {
            row.resize(self.columns.width, Cell::Empty);
        }
        row[self.columns.group] = Cell::text(entry.group_name.clone());
        row[self.columns.message_id] = entry.message_id.to_cell();
        row[self.columns.status] = Cell::text(entry.status.as_str());
        row
    }

    /// Records an entry rewritten into a previously unusable row.
    pub fn adopt(&mut self, row_offset: usize, entry: DirectoryEntry) {
        if row_offset >= self.raw_rows.len() {
            self.push(entry);
            return;
        }
        self.raw_rows[row_offset] = self.repaired_row(row_offset, &entry);
        self.skipped.retain(|skipped| {
            !matches!(skipped, SkippedRow::InvalidMessageId { row_offset: offset, .. } if *offset == row_offset)
        });
        self.records.push(DirectoryRecord { row_offset, entry });
    }

    /// Records an entry appended to the table after this directory was read.
    pub fn push(&mut self, entry: DirectoryEntry) {
        let row = self.columns.render(&entry);
        self.raw_rows.push(row);
        self.records.push(DirectoryRecord { row_offset: self.raw_rows.len() - 1, entry });
    }
}
