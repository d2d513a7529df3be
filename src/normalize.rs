use crate::warehouse::{Cell, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Coerces a cell to a finite float. Anything that is not a number becomes `0.0`.
pub fn coerce_f64(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Null => 0.0,
        Cell::Integer(value) => *value as f64,
        Cell::Real(value) => *value,
        Cell::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Rewrites the named columns of `table` as `Cell::Real`. Columns the table
/// does not carry are skipped. Returns how many cells had to be zeroed.
pub fn normalize_numeric(table: &mut Table, columns: &[&str]) -> usize {
    let indices = columns
        .iter()
        .filter_map(|column| table.column_index(column))
        .collect::<Vec<_>>();

    let mut zeroed = 0usize;
    for row in &mut table.rows {
        for &index in &indices {
            let Some(cell) = row.get_mut(index) else {
                continue;
            };
            let value = coerce_f64(cell);
            if value == 0.0 && !is_numeric_zero(cell) {
                zeroed += 1;
            }
            *cell = Cell::Real(value);
        }
    }

    if zeroed > 0 {
        tracing::debug!(table = %table.name, zeroed, "replaced non-numeric values with zero");
    }
    zeroed
}

fn is_numeric_zero(cell: &Cell) -> bool {
    match cell {
        Cell::Integer(value) => *value == 0,
        Cell::Real(value) => *value == 0.0,
        Cell::Text(text) => text.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false),
        Cell::Null => false,
    }
}

/// Boolean-like flags arrive as `true`/`false`, `1`/`0`, `t`/`f`, `yes`/`no`
/// or numbers depending on the warehouse driver.
pub fn parse_flag(cell: &Cell) -> Option<bool> {
    match cell {
        Cell::Null => None,
        Cell::Integer(value) => match value {
            1 => Some(true),
            0 => Some(false),
            _ => None,
        },
        Cell::Real(value) => {
            if *value == 1.0 {
                Some(true)
            } else if *value == 0.0 {
                Some(false)
            } else {
                None
            }
        }
        Cell::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "1.0" | "yes" | "y" => Some(true),
            "false" | "f" | "0" | "0.0" | "no" | "n" => Some(false),
            _ => None,
        },
    }
}

pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    let Cell::Text(text) = cell else {
        return None;
    };
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.date_naive())
        .ok()
}
