//! Per-field data rows and the save/load reconciliation that feeds them.
//!
//! `save_panel_values` is the write path for every form panel: it validates
//! the incoming batch, resolves which fiscal-year pair the save targets,
//! grows the field catalog, and splits the batch into inserts and in-place
//! updates. The whole batch commits or none of it does.

use std::collections::{HashMap, HashSet};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Row, ToSql};

use super::fiscal_years::YearContext;
use super::TreasuryDb;
use crate::badi::{now_stamp, BadiDate};
use crate::currency;
use crate::error::StoreError;
use crate::fiscal::YearPlacement;

/// The panel whose saves may move the fiscal-year chain.
pub const ORGANIZATION_PANEL: &str = "organization";

/// Organization fields that may legitimately arrive empty: they draw a
/// warning, are dropped from the batch, and never abort the save.
const SOFT_FIELDS: [&str; 2] = ["location_city_name", "location_country"];

/// A field value as collected by the form layer. The widget kind decides the
/// variant; the store never guesses from the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Free text.
    Text(String),
    /// A display-formatted currency string ("1952.14").
    Currency(String),
    /// A radio-group selection index.
    Choice(i64),
}

/// A value on its way into the `data` table.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Amount(i64),
    Choice(i64),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Text(s) => ToSqlOutput::from(s.as_str()),
            FieldValue::Amount(n) | FieldValue::Choice(n) => ToSqlOutput::from(*n),
        })
    }
}

/// A value read back from the `data` table. SQLite's dynamic typing keeps
/// text as TEXT and both amounts and choice indices as INTEGER; the form
/// layer knows which integers are currency.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Integer(i64),
}

impl StoredValue {
    /// Display form: text as-is, integers as their decimal rendering.
    pub fn display(&self) -> String {
        match self {
            StoredValue::Text(s) => s.clone(),
            StoredValue::Integer(n) => n.to_string(),
        }
    }

    /// Interpret an integer value as minor-unit currency.
    pub fn as_currency(&self) -> Option<String> {
        match self {
            StoredValue::Integer(n) => Some(currency::from_minor_units(*n)),
            StoredValue::Text(_) => None,
        }
    }
}

impl FromSql for StoredValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(t) => Ok(StoredValue::Text(
                String::from_utf8_lossy(t).into_owned(),
            )),
            ValueRef::Integer(n) => Ok(StoredValue::Integer(n)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A row from the `data` table, joined with its field name, fiscal year and
/// (when present) month name.
#[derive(Debug, Clone)]
pub struct ValueRow {
    pub pk: i64,
    pub field: String,
    pub value: StoredValue,
    pub year: i32,
    pub month: Option<String>,
    pub c_time: String,
    pub m_time: String,
}

impl ValueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pk: row.get(0)?,
            field: row.get(1)?,
            value: row.get(2)?,
            year: row.get(3)?,
            month: row.get(4)?,
            c_time: row.get(5)?,
            m_time: row.get(6)?,
        })
    }
}

/// What a `save_panel_values` call did, by field name.
#[derive(Debug, Clone, Default)]
pub struct SaveOutcome {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub added_fields: Vec<String>,
    /// Soft fields dropped from the batch after a warning.
    pub skipped: Vec<String>,
}

impl TreasuryDb {
    /// Persist one panel's field values.
    ///
    /// Steps, in order: validate the batch (one aggregate error for every
    /// empty required field); resolve the target year pair — via the chain
    /// transition for the organization panel, via the current year otherwise;
    /// grow the field catalog; split fields into inserts and updates against
    /// the pre-save current-year rows; execute. Everything from year
    /// resolution onward runs in a single transaction.
    pub fn save_panel_values(
        &self,
        panel: &str,
        incoming: &HashMap<String, FormValue>,
        entered: BadiDate,
    ) -> Result<SaveOutcome, StoreError> {
        let (cleaned, skipped) = validate_batch(panel, incoming)?;
        if cleaned.is_empty() {
            log::warn!("Save of '{panel}' had no persistable fields");
            return Ok(SaveOutcome {
                skipped,
                ..SaveOutcome::default()
            });
        }

        self.with_transaction(|db| {
            let pre_current = db.current_fiscal_year()?;

            let ctx = if panel == ORGANIZATION_PANEL {
                db.apply_year_entry(entered)?
            } else {
                let fy1 = pre_current.clone().ok_or(StoreError::NoCurrentYear)?;
                let fy2 = db
                    .fiscal_year_by_year(fy1.year + 1)?
                    .ok_or(StoreError::MissingYear(fy1.year + 1))?;
                YearContext {
                    placement: YearPlacement::SameYear,
                    fy1,
                    fy2,
                }
            };

            let names: HashSet<String> = cleaned.iter().map(|(name, _)| name.clone()).collect();
            let added_fields = db.ensure_fields(&names)?;
            let mut field_pks = HashMap::new();
            for row in db.field_types(&names)? {
                field_pks.insert(row.field, row.pk);
            }
            for name in &names {
                if !field_pks.contains_key(name) {
                    log::error!("Field '{name}' vanished from the catalog mid-save");
                    return Err(StoreError::MissingField(name.clone()));
                }
            }

            let mfk = db.month_ref(entered.month)?;

            // Prior state is read against the pre-save current year, not the
            // target: a row only qualifies as an update when that year and
            // the target year coincide.
            let prior: HashMap<i64, i64> = match &pre_current {
                Some(cur) => db.rows_by_field_in_year(field_pks.values().copied(), cur.pk)?,
                None => HashMap::new(),
            };
            let prior_year_is_target = pre_current
                .as_ref()
                .is_some_and(|cur| cur.year == ctx.fy1.year);

            let stamp = now_stamp();
            let mut inserted = Vec::new();
            let mut updated = Vec::new();
            for (name, value) in &cleaned {
                let ffk = field_pks[name];
                match prior.get(&ffk) {
                    Some(row_pk) if prior_year_is_target => {
                        db.conn_ref().execute(
                            "UPDATE data SET value = ?1, m_time = ?2 WHERE pk = ?3",
                            params![value, stamp, row_pk],
                        )?;
                        updated.push(name.clone());
                    }
                    _ => {
                        db.conn_ref().execute(
                            "INSERT INTO data (value, fy1fk, fy2fk, mfk, ffk, c_time, m_time)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                            params![value, ctx.fy1.pk, ctx.fy2.pk, mfk, ffk, stamp],
                        )?;
                        inserted.push(name.clone());
                    }
                }
            }

            log::info!(
                "Saved '{panel}' for year {}: {} inserted, {} updated",
                ctx.fy1.year,
                inserted.len(),
                updated.len()
            );
            Ok(SaveOutcome {
                inserted,
                updated,
                added_fields,
                skipped: skipped.clone(),
            })
        })
    }

    /// Data rows for the given fields in one fiscal year.
    ///
    /// With `month` omitted, rows match regardless of month (full-year
    /// projections). With it present, the row must join the named month and
    /// both fiscal-year boundary rows.
    pub fn transaction_values(
        &self,
        fields: &HashSet<String>,
        year: i32,
        month: Option<&str>,
    ) -> Result<Vec<ValueRow>, StoreError> {
        if fields.is_empty() {
            return Err(StoreError::EmptyFieldQuery);
        }

        let placeholders = vec!["?"; fields.len()].join(", ");
        let mut params_vec: Vec<Value> = vec![Value::Integer(year as i64)];
        let sql = match month {
            None => format!(
                "SELECT d.pk, f.field, d.value, y.year, m.month, d.c_time, d.m_time
                 FROM data d
                 JOIN field_type f ON d.ffk = f.pk
                 JOIN fiscal_year y ON d.fy1fk = y.pk
                 LEFT JOIN month m ON d.mfk = m.pk
                 WHERE y.year = ?1 AND f.field IN ({placeholders})
                 ORDER BY f.field"
            ),
            Some(month) => {
                params_vec.push(Value::Integer(year as i64 + 1));
                params_vec.push(Value::Text(month.to_string()));
                format!(
                    "SELECT d.pk, f.field, d.value, y.year, m.month, d.c_time, d.m_time
                     FROM data d
                     JOIN field_type f ON d.ffk = f.pk
                     JOIN fiscal_year y ON d.fy1fk = y.pk
                     JOIN fiscal_year y2 ON d.fy2fk = y2.pk
                     JOIN month m ON d.mfk = m.pk
                     WHERE y.year = ?1 AND y2.year = ?2 AND m.month = ?3
                       AND f.field IN ({placeholders})
                     ORDER BY f.field"
                )
            }
        };
        params_vec.extend(fields.iter().map(|f| Value::Text(f.clone())));

        let mut stmt = self.conn_ref().prepare(&sql)?;
        let mapped = stmt.query_map(params_from_iter(params_vec), ValueRow::from_row)?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Flattened `{field: display_value}` view of one panel's fields for a
    /// year. Feeds form population and the organization snapshot cache.
    pub fn panel_snapshot(
        &self,
        fields: &HashSet<String>,
        year: i32,
    ) -> Result<HashMap<String, String>, StoreError> {
        let rows = self.transaction_values(fields, year, None)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.field, row.value.display()))
            .collect())
    }

    /// Map of `ffk -> data.pk` for rows whose first-year reference is the
    /// given fiscal-year row.
    fn rows_by_field_in_year(
        &self,
        ffks: impl Iterator<Item = i64>,
        fy1_pk: i64,
    ) -> Result<HashMap<i64, i64>, StoreError> {
        let ffks: Vec<i64> = ffks.collect();
        if ffks.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ffks.len()].join(", ");
        let mut params_vec: Vec<Value> = vec![Value::Integer(fy1_pk)];
        params_vec.extend(ffks.into_iter().map(Value::Integer));

        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT ffk, pk FROM data WHERE fy1fk = ?1 AND ffk IN ({placeholders})"
        ))?;
        let mapped = stmt.query_map(params_from_iter(params_vec), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut map = HashMap::new();
        for entry in mapped {
            let (ffk, pk) = entry?;
            map.insert(ffk, pk);
        }
        Ok(map)
    }
}

/// Validate an incoming batch: collect every empty required field into one
/// error, warn-and-drop empty soft fields, and push currency strings through
/// the codec. Runs before any mutation is attempted.
fn validate_batch(
    panel: &str,
    incoming: &HashMap<String, FormValue>,
) -> Result<(Vec<(String, FieldValue)>, Vec<String>), StoreError> {
    let mut names: Vec<&String> = incoming.keys().collect();
    names.sort();

    let mut cleaned = Vec::new();
    let mut empty = Vec::new();
    let mut skipped = Vec::new();
    for name in names {
        let value = &incoming[name];
        let is_blank = match value {
            FormValue::Text(s) | FormValue::Currency(s) => {
                let t = s.trim();
                t.is_empty() || t == "0"
            }
            FormValue::Choice(_) => false,
        };

        if is_blank {
            if SOFT_FIELDS.contains(&name.as_str()) {
                log::warn!("Optional field '{name}' is empty on '{panel}'; skipping it");
                skipped.push(name.clone());
            } else {
                empty.push(name.clone());
            }
            continue;
        }

        let field_value = match value {
            FormValue::Text(s) => FieldValue::Text(s.trim().to_string()),
            FormValue::Currency(s) => FieldValue::Amount(currency::to_minor_units(s)?),
            FormValue::Choice(n) => FieldValue::Choice(*n),
        };
        cleaned.push((name.clone(), field_value));
    }

    if !empty.is_empty() {
        return Err(StoreError::EmptyFields(empty));
    }
    Ok((cleaned, skipped))
}

// =============================================================================
// Tests
// =============================================================================
