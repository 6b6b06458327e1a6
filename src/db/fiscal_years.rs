//! Fiscal-year chain: queries plus the FIRST_RUN / NEXT_YEAR / PREVIOUS_YEAR
//! transitions.
//!
//! The chain is contiguous (every recorded year except the earliest has its
//! predecessor recorded) and always holds the year after the current one.
//! Exactly one row is flagged current once the chain exists.

use rusqlite::{params, Row};

use super::TreasuryDb;
use crate::badi::{now_stamp, BadiDate};
use crate::error::StoreError;
use crate::fiscal::{place_year, YearPlacement};

/// A row from the `fiscal_year` table.
#[derive(Debug, Clone)]
pub struct FiscalYearRow {
    pub pk: i64,
    pub year: i32,
    /// Anchor date: the Badí' month/day this year's row was keyed on.
    pub month: u8,
    pub day: u8,
    pub current: bool,
    pub work_on: bool,
    pub audit: bool,
    pub c_time: String,
    pub m_time: String,
}

impl FiscalYearRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pk: row.get(0)?,
            year: row.get(1)?,
            month: row.get(2)?,
            day: row.get(3)?,
            current: row.get(4)?,
            work_on: row.get(5)?,
            audit: row.get(6)?,
            c_time: row.get(7)?,
            m_time: row.get(8)?,
        })
    }
}

const FISCAL_YEAR_COLUMNS: &str = "pk, year, month, day, current, work_on, audit, c_time, m_time";

/// One filter dimension for [`TreasuryDb::fiscal_years`]. A closed enum:
/// combining dimensions is unrepresentable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    Year(i32),
    Month(u8),
    Day(u8),
    Current(bool),
}

/// The resolved year-pair a save targets: the entered year's row and the
/// row of the year after it (always present once the chain exists).
#[derive(Debug, Clone)]
pub struct YearContext {
    pub placement: YearPlacement,
    pub fy1: FiscalYearRow,
    pub fy2: FiscalYearRow,
}

impl TreasuryDb {
    /// The row flagged current, or `None` on a first-ever run.
    pub fn current_fiscal_year(&self) -> Result<Option<FiscalYearRow>, StoreError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {FISCAL_YEAR_COLUMNS} FROM fiscal_year WHERE current = 1"
        ))?;
        let mut rows = stmt.query_map([], FiscalYearRow::from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// The earliest recorded year, or `None` before first run.
    pub fn earliest_fiscal_year(&self) -> Result<Option<FiscalYearRow>, StoreError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {FISCAL_YEAR_COLUMNS} FROM fiscal_year ORDER BY year ASC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map([], FiscalYearRow::from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Query fiscal years along exactly one filter dimension.
    pub fn fiscal_years(&self, filter: YearFilter) -> Result<Vec<FiscalYearRow>, StoreError> {
        let (clause, param): (&str, i64) = match filter {
            YearFilter::Year(y) => ("year = ?1", y as i64),
            YearFilter::Month(m) => ("month = ?1", m as i64),
            YearFilter::Day(d) => ("day = ?1", d as i64),
            YearFilter::Current(flag) => ("current = ?1", flag as i64),
        };
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {FISCAL_YEAR_COLUMNS} FROM fiscal_year WHERE {clause} ORDER BY year"
        ))?;
        let rows = stmt.query_map(params![param], FiscalYearRow::from_row)?;

        let mut years = Vec::new();
        for row in rows {
            years.push(row?);
        }
        Ok(years)
    }

    /// Look up a single year's row.
    pub fn fiscal_year_by_year(&self, year: i32) -> Result<Option<FiscalYearRow>, StoreError> {
        Ok(self.fiscal_years(YearFilter::Year(year))?.into_iter().next())
    }

    /// Classify an entered date against the chain and apply the transition,
    /// atomically. Rejected entries (`OutOfRange`) leave the chain untouched.
    ///
    /// Returns the year-pair context the caller should stamp writes with.
    pub fn enter_fiscal_year(&self, entered: BadiDate) -> Result<YearContext, StoreError> {
        self.with_transaction(|db| db.apply_year_entry(entered))
    }

    /// Transition logic without transaction management. Callers must already
    /// hold a transaction; `save_panel_values` runs this inside its own.
    pub(crate) fn apply_year_entry(&self, entered: BadiDate) -> Result<YearContext, StoreError> {
        let current = self.current_fiscal_year()?;
        let earliest = self.earliest_fiscal_year()?;
        let placement = place_year(
            entered.year,
            current.as_ref().map(|row| row.year),
            earliest.as_ref().map(|row| row.year),
        );

        match placement {
            YearPlacement::FirstRun => {
                self.insert_fiscal_year(entered.year, entered.month, entered.day, true)?;
                self.insert_fiscal_year(entered.year + 1, entered.month, entered.day, false)?;
                log::info!(
                    "First run: recorded fiscal years {} (current) and {}",
                    entered.year,
                    entered.year + 1
                );
            }
            YearPlacement::SameYear => {}
            YearPlacement::NextYear => {
                let stamp = now_stamp();
                self.conn_ref().execute(
                    "UPDATE fiscal_year SET current = 0, m_time = ?1 WHERE current = 1",
                    params![stamp],
                )?;
                // The entered year already exists as the next-year
                // placeholder; promote it and lay down the new placeholder.
                self.conn_ref().execute(
                    "UPDATE fiscal_year
                     SET current = 1, month = ?1, day = ?2, m_time = ?3
                     WHERE year = ?4",
                    params![entered.month, entered.day, stamp, entered.year],
                )?;
                self.insert_fiscal_year(entered.year + 1, entered.month, entered.day, false)?;
                log::info!("Fiscal year advanced to {}", entered.year);
            }
            YearPlacement::PreviousYear => {
                // Backfill never becomes current retroactively.
                self.insert_fiscal_year(entered.year, entered.month, entered.day, false)?;
                log::info!("Backfilled fiscal year {}", entered.year);
            }
            YearPlacement::OutOfRange => {
                // current and earliest are Some here: FirstRun covers None.
                let latest = current.as_ref().map(|row| row.year).unwrap_or(entered.year);
                let earliest = earliest.as_ref().map(|row| row.year).unwrap_or(latest);
                return Err(StoreError::FiscalGap {
                    entered: entered.year,
                    earliest,
                    latest: latest + 1,
                });
            }
        }

        let fy1 = self
            .fiscal_year_by_year(entered.year)?
            .ok_or(StoreError::NoCurrentYear)?;
        let fy2 = self
            .fiscal_year_by_year(entered.year + 1)?
            .ok_or(StoreError::NoCurrentYear)?;
        Ok(YearContext {
            placement,
            fy1,
            fy2,
        })
    }

    /// Flag or clear a year's audit state.
    pub fn set_audit_year(&self, year: i32, audit: bool) -> Result<(), StoreError> {
        self.conn_ref().execute(
            "UPDATE fiscal_year SET audit = ?1, m_time = ?2 WHERE year = ?3",
            params![audit, now_stamp(), year],
        )?;
        Ok(())
    }

    /// Flag or clear a year as the active work year.
    pub fn set_work_year(&self, year: i32, work_on: bool) -> Result<(), StoreError> {
        self.conn_ref().execute(
            "UPDATE fiscal_year SET work_on = ?1, m_time = ?2 WHERE year = ?3",
            params![work_on, now_stamp(), year],
        )?;
        Ok(())
    }

    fn insert_fiscal_year(
        &self,
        year: i32,
        month: u8,
        day: u8,
        current: bool,
    ) -> Result<i64, StoreError> {
        let stamp = now_stamp();
        self.conn_ref().execute(
            "INSERT INTO fiscal_year (year, month, day, current, work_on, audit, c_time, m_time)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
            params![year, month, day, current, stamp],
        )?;
        Ok(self.conn_ref().last_insert_rowid())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn date(year: i32) -> BadiDate {
        BadiDate::new(year, 2, 19)
    }

    fn stored_years(db: &TreasuryDb) -> Vec<i32> {
        let mut stmt = db
            .conn_ref()
            .prepare("SELECT year FROM fiscal_year ORDER BY year")
            .expect("prepare");
        let years = stmt
            .query_map([], |row| row.get(0))
            .expect("query")
            .collect::<Result<Vec<i32>, _>>()
            .expect("collect");
        years
    }

    fn current_count(db: &TreasuryDb) -> i32 {
        db.conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM fiscal_year WHERE current = 1",
                [],
                |row| row.get(0),
            )
            .expect("count")
    }

    #[test]
    fn test_first_run_seeds_current_and_next() {
        let db = test_db();
        assert!(db.current_fiscal_year().expect("query").is_none());

        let ctx = db.enter_fiscal_year(date(182)).expect("first entry");
        assert_eq!(ctx.placement, YearPlacement::FirstRun);
        assert_eq!(stored_years(&db), vec![182, 183]);

        let current = db.current_fiscal_year().expect("query").expect("row");
        assert_eq!(current.year, 182);
        assert_eq!((current.month, current.day), (2, 19));
        assert!(current.current);

        let next = db.fiscal_year_by_year(183).expect("query").expect("row");
        assert!(!next.current);
        assert_eq!(current_count(&db), 1);
    }

    #[test]
    fn test_next_year_advances_chain() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first entry");

        let ctx = db.enter_fiscal_year(date(183)).expect("advance");
        assert_eq!(ctx.placement, YearPlacement::NextYear);
        assert_eq!(stored_years(&db), vec![182, 183, 184]);

        let old = db.fiscal_year_by_year(182).expect("query").expect("row");
        assert!(!old.current, "182 flips to non-current");
        let current = db.current_fiscal_year().expect("query").expect("row");
        assert_eq!(current.year, 183);
        let placeholder = db.fiscal_year_by_year(184).expect("query").expect("row");
        assert!(!placeholder.current);
        assert_eq!(current_count(&db), 1);
    }

    #[test]
    fn test_previous_year_backfills_without_becoming_current() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first entry");

        let ctx = db.enter_fiscal_year(date(181)).expect("backfill");
        assert_eq!(ctx.placement, YearPlacement::PreviousYear);
        assert_eq!(stored_years(&db), vec![181, 182, 183]);

        let backfilled = db.fiscal_year_by_year(181).expect("query").expect("row");
        assert!(!backfilled.current);
        let current = db.current_fiscal_year().expect("query").expect("row");
        assert_eq!(current.year, 182, "current never moves backward");

        // The backfill's context pairs it with the old earliest year.
        assert_eq!(ctx.fy1.year, 181);
        assert_eq!(ctx.fy2.year, 182);
    }

    #[test]
    fn test_gap_rejected_without_mutation() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first entry");
        let before = stored_years(&db);

        let err = db.enter_fiscal_year(date(185)).expect_err("gap");
        assert!(matches!(err, StoreError::FiscalGap { entered: 185, .. }));
        assert_eq!(stored_years(&db), before, "no rows added on rejection");
        assert_eq!(current_count(&db), 1);

        // Two before the earliest is equally a gap.
        let err = db.enter_fiscal_year(date(180)).expect_err("gap");
        assert!(matches!(err, StoreError::FiscalGap { .. }));
        assert_eq!(stored_years(&db), before);
    }

    #[test]
    fn test_chain_stays_contiguous_and_single_current() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first");
        db.enter_fiscal_year(date(183)).expect("advance");
        db.enter_fiscal_year(date(184)).expect("advance");
        db.enter_fiscal_year(date(181)).expect("backfill");

        let years = stored_years(&db);
        assert_eq!(years, vec![181, 182, 183, 184, 185]);
        for pair in years.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "chain must be contiguous");
        }
        assert_eq!(current_count(&db), 1);
        assert_eq!(
            db.current_fiscal_year().expect("query").expect("row").year,
            184
        );
    }

    #[test]
    fn test_same_year_is_a_no_op_on_the_chain() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first");
        let before = stored_years(&db);

        let ctx = db.enter_fiscal_year(BadiDate::new(182, 9, 5)).expect("same");
        assert_eq!(ctx.placement, YearPlacement::SameYear);
        assert_eq!(ctx.fy1.year, 182);
        assert_eq!(ctx.fy2.year, 183);
        assert_eq!(stored_years(&db), before);
    }

    #[test]
    fn test_fiscal_years_filters() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first");
        db.enter_fiscal_year(date(183)).expect("advance");

        let by_year = db.fiscal_years(YearFilter::Year(183)).expect("query");
        assert_eq!(by_year.len(), 1);
        assert_eq!(by_year[0].year, 183);

        let by_month = db.fiscal_years(YearFilter::Month(2)).expect("query");
        assert_eq!(by_month.len(), 3, "all rows share the anchor month");

        let by_day = db.fiscal_years(YearFilter::Day(19)).expect("query");
        assert_eq!(by_day.len(), 3);

        let current = db.fiscal_years(YearFilter::Current(true)).expect("query");
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].year, 183);

        let rest = db.fiscal_years(YearFilter::Current(false)).expect("query");
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_audit_and_work_year_flags() {
        let db = test_db();
        db.enter_fiscal_year(date(182)).expect("first");

        db.set_audit_year(182, true).expect("audit flag");
        db.set_work_year(183, true).expect("work flag");

        let audited = db.fiscal_year_by_year(182).expect("query").expect("row");
        assert!(audited.audit);
        assert!(!audited.work_on);

        let work = db.fiscal_year_by_year(183).expect("query").expect("row");
        assert!(work.work_on);
        assert!(!work.audit);
    }
}
