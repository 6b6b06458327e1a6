//! The fixed Badí' month table.
//!
//! Seeded once from [`crate::badi::MONTHS`]; later startups only insert rows
//! missing from a previous partial seed. Never updated or reaped.

use rusqlite::{params, Row};

use super::TreasuryDb;
use crate::badi::{now_stamp, MONTHS};
use crate::error::StoreError;

/// A row from the `month` table.
#[derive(Debug, Clone)]
pub struct MonthRow {
    pub pk: i64,
    pub name: String,
    pub ord: u8,
    pub c_time: String,
    pub m_time: String,
}

impl MonthRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pk: row.get(0)?,
            name: row.get(1)?,
            ord: row.get(2)?,
            c_time: row.get(3)?,
            m_time: row.get(4)?,
        })
    }
}

/// At most one filter dimension for [`TreasuryDb::months`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthFilter {
    Name(String),
    Ordinal(u8),
}

impl TreasuryDb {
    /// Insert any month rows missing from the fixed set. Idempotent; existing
    /// rows are never touched.
    pub(crate) fn seed_months(&self) -> Result<(), StoreError> {
        let stamp = now_stamp();
        for (ord, name) in MONTHS {
            self.conn_ref().execute(
                "INSERT OR IGNORE INTO month (month, ord, c_time, m_time)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, ord, stamp],
            )?;
        }
        Ok(())
    }

    /// Query months, optionally along one filter dimension. Unfiltered
    /// results come back in calendar order.
    pub fn months(&self, filter: Option<MonthFilter>) -> Result<Vec<MonthRow>, StoreError> {
        let base = "SELECT pk, month, ord, c_time, m_time FROM month";
        let mut rows = Vec::new();
        match filter {
            None => {
                let mut stmt = self.conn_ref().prepare(&format!("{base} ORDER BY ord"))?;
                let mapped = stmt.query_map([], MonthRow::from_row)?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            Some(MonthFilter::Name(name)) => {
                let mut stmt = self.conn_ref().prepare(&format!("{base} WHERE month = ?1"))?;
                let mapped = stmt.query_map(params![name], MonthRow::from_row)?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            Some(MonthFilter::Ordinal(ord)) => {
                let mut stmt = self.conn_ref().prepare(&format!("{base} WHERE ord = ?1"))?;
                let mapped = stmt.query_map(params![ord], MonthRow::from_row)?;
                for row in mapped {
                    rows.push(row?);
                }
            }
        }
        Ok(rows)
    }

    /// Primary key of the month with the given ordinal, if seeded.
    pub(crate) fn month_ref(&self, ord: u8) -> Result<Option<i64>, StoreError> {
        Ok(self
            .months(Some(MonthFilter::Ordinal(ord)))?
            .into_iter()
            .next()
            .map(|row| row.pk))
    }
}

// =============================================================================
// Tests
// =============================================================================
