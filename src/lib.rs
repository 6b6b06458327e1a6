//! Bookkeeping core for small non-commercial organizations whose books run
//! on the Badí' calendar.
//!
//! The form layer (out of scope here) collects `{field_name: value}` maps and
//! hands them to [`store::Store::save_panel_values`]; on load it reads the
//! same shape back. In between sit the fiscal-year chain, the append-only
//! field catalog, the per-field data rows, and the reconciliation that
//! decides insert versus update at each save. Amounts are stored as integer
//! minor units, timestamps as Badí'-epoch strings.

pub mod badi;
pub mod currency;
pub mod db;
pub mod error;
pub mod fiscal;
mod migrations;
pub mod place;
pub mod settings;
pub mod snapshot;
pub mod store;

pub use badi::BadiDate;
pub use db::{FormValue, SaveOutcome, StoredValue, TreasuryDb};
pub use error::StoreError;
pub use settings::Settings;
pub use store::Store;
