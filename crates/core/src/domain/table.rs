use std::collections::HashMap;

use crate::domain::cell::Cell;

pub type Row = Vec<Cell>;

/// Full contents of a named table: row 0 is the header row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> &[Cell] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or(&[])
    }

    pub fn column_index(&self) -> ColumnIndex {
        ColumnIndex::from_header(self.header())
    }
}

/// Header name to column position. Later duplicates win, matching a
/// left-to-right scan of the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_header(header: &[Cell]) -> Self {
        let positions = header
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.as_label().map(|name| (name, index)))
            .collect();
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|name| self.position(name).is_none()).collect()
    }

    pub fn width(&self) -> usize {
        self.positions.values().copied().max().map(|last| last + 1).unwrap_or(0)
    }
}

pub fn cell_at(row: &[Cell], index: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(index).unwrap_or(&EMPTY)
}
