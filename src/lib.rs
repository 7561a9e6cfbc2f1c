//! # SGR Intake
//!
//! Back end of the credit-guarantee application form: typed ledgers for every
//! repeating section of the form, per-applicant progress snapshots, the
//! rollups an analyst needs (debt by currency, trailing sales window, crop
//! and herd results) and the workbook export.
//!
//! ## Core Concepts
//!
//! - **Applicant Session**: all business state of one applicant, addressed by an 11-digit tax id
//! - **Ledger**: a repeating-row collection, validated row by row when filled through a form
//!   and replaced in bulk when edited as a grid
//! - **Snapshot**: the persisted form of a session; restoring never overwrites what is already
//!   in memory
//! - **Summary**: derived tables, recomputed from the ledgers on every export
//!
//! ## Example
//!
//! ```rust,ignore
//! use sgr_intake::*;
//! use chrono::NaiveDate;
//!
//! let mut service = IntakeService::new(IntakeConfig::default())?;
//! service.identify("30888888885")?;
//!
//! let session = service.session_mut()?;
//! let ledger = session.state.filiatorios.get_or_init();
//! ledger.append(Shareholder::new("Ana Pérez", "27111111112", 60.0))?;
//! ledger.append(Shareholder::new("Luis Gómez", "20222222223", 40.0))?;
//!
//! service.save()?;
//! let download = service.export(NaiveDate::from_ymd_opt(2025, 4, 18).unwrap())?;
//! std::fs::write(&download.file_name, &download.bytes)?;
//! ```

pub mod agro;
pub mod config;
pub mod debt;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod ledger;
pub mod monthly;
pub mod progress;
pub mod regions;
pub mod schema;
pub mod service;
pub mod session;
pub mod utils;
pub mod validation;

pub use agro::*;
pub use config::{GeorefConfig, IntakeConfig};
pub use debt::{grand_total, rollup, summarize, weighted_by_currency, DebtLine, DebtRollup, DebtSummary};
pub use engine::{LedgerSectors, LedgerShare, RollupEngine, SessionSummary};
pub use error::{IntakeError, Result};
pub use export::{
    build_tables, build_workbook, ledger_table, write_workbook, Cell, Sheet, Table, MAX_CELL_CHARS,
};
pub use ingestion::*;
pub use ledger::{Entry, Ledger, LedgerRow, RowId, ShareStatus};
pub use monthly::*;
pub use progress::{
    filter_snapshot, is_transient_key, merge_into_session, MergeReport, ProgressStore, Snapshot,
    StoredSnapshot,
};
pub use regions::{fetch_directory, RegionCache, RegionDirectory, RegionSource};
pub use schema::*;
pub use service::{IntakeService, SessionPhase, WorkbookDownload};
pub use session::{ApplicantId, ApplicantSession, GridKind, PersistableState, Section, TransientState};
pub use utils::*;
pub use validation::{ValidationError, ValidationIssue};

#[cfg(feature = "georef")]
pub use regions::GeorefClient;
