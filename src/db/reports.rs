//! Report types and the pivot that collects data rows under them.
//!
//! A report is a named grouping ("annual_summary", "audit_packet") over
//! existing data rows. The pivot only links; it never copies values.

use rusqlite::{params, Row};

use super::values::ValueRow;
use super::TreasuryDb;
use crate::badi::now_stamp;
use crate::error::StoreError;

/// A row from the `report_type` table.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub pk: i64,
    pub report: String,
    pub c_time: String,
    pub m_time: String,
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pk: row.get(0)?,
            report: row.get(1)?,
            c_time: row.get(2)?,
            m_time: row.get(3)?,
        })
    }
}

impl TreasuryDb {
    /// Insert whichever report names are not yet registered. Returns the
    /// newly added names.
    pub fn ensure_report_types(&self, names: &[&str]) -> Result<Vec<String>, StoreError> {
        let stamp = now_stamp();
        let mut added = Vec::new();
        for name in names {
            let inserted = self.conn_ref().execute(
                "INSERT OR IGNORE INTO report_type (report, c_time, m_time)
                 VALUES (?1, ?2, ?2)",
                params![name, stamp],
            )?;
            if inserted > 0 {
                added.push(name.to_string());
            }
        }
        Ok(added)
    }

    /// All registered report types.
    pub fn report_types(&self) -> Result<Vec<ReportRow>, StoreError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT pk, report, c_time, m_time FROM report_type ORDER BY report",
        )?;
        let mapped = stmt.query_map([], ReportRow::from_row)?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Link a data row into a report. Idempotent; the report must already be
    /// registered.
    pub fn tag_value_for_report(&self, report: &str, data_pk: i64) -> Result<(), StoreError> {
        let report_pk: i64 = self
            .conn_ref()
            .query_row(
                "SELECT pk FROM report_type WHERE report = ?1",
                params![report],
                |row| row.get(0),
            )
            .map_err(|_| StoreError::MissingField(report.to_string()))?;

        let already: bool = self
            .conn_ref()
            .query_row(
                "SELECT 1 FROM report_pivot WHERE rfk = ?1 AND dfk = ?2",
                params![report_pk, data_pk],
                |_row| Ok(true),
            )
            .unwrap_or(false);
        if already {
            return Ok(());
        }

        self.conn_ref().execute(
            "INSERT INTO report_pivot (rfk, dfk) VALUES (?1, ?2)",
            params![report_pk, data_pk],
        )?;
        Ok(())
    }

    /// Every data row linked under a report.
    pub fn report_values(&self, report: &str) -> Result<Vec<ValueRow>, StoreError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT d.pk, f.field, d.value, y.year, m.month, d.c_time, d.m_time
             FROM report_pivot p
             JOIN report_type r ON p.rfk = r.pk
             JOIN data d ON p.dfk = d.pk
             JOIN field_type f ON d.ffk = f.pk
             JOIN fiscal_year y ON d.fy1fk = y.pk
             LEFT JOIN month m ON d.mfk = m.pk
             WHERE r.report = ?1
             ORDER BY f.field",
        )?;
        let mapped = stmt.query_map(params![report], |row| {
            Ok(ValueRow {
                pk: row.get(0)?,
                field: row.get(1)?,
                value: row.get(2)?,
                year: row.get(3)?,
                month: row.get(4)?,
                c_time: row.get(5)?,
                m_time: row.get(6)?,
            })
        })?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    }
}

// =============================================================================
// Tests
// =============================================================================
