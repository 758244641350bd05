//! Reporting and KPI engine for the church back office
//!
//! Modules:
//! - walker: sequential walk over a paginated collection
//! - aggregate: folds a walk into totals, all-or-nothing
//! - kpi: per-domain KPI policies and the latest-wins tile board
//! - report: report generation and the report screen workspace
//! - export: column/format export workflow and artifact sinks

pub mod access;
pub mod aggregate;
pub mod error;
pub mod export;
pub mod generation;
pub mod kpi;
pub mod report;
pub mod types;
pub mod walker;

#[cfg(test)]
mod testing;

pub use access::{Action, AllowAll, Capabilities, StaticCapabilities};
pub use aggregate::{aggregate, AggregateFailure, AggregateResult, AggregateState};
pub use error::{CoreError, CoreResult, DefaultErrorLogger, ErrorContext, ErrorLogger, ErrorSeverity};
pub use export::{
    ArtifactSink, DirectorySink, ExportArtifact, ExportFormat, ExportRequest, ExportSession, ExportStep,
    SavedExport,
};
pub use generation::{Generation, ResultSlot};
pub use kpi::{
    pledge_kpis, tithe_kpis, welfare_kpis, KpiBoard, KpiDomain, KpiPolicy, KpiTile, LedgerPolicy,
    PledgePolicy, TithePolicy, WelfareKpis,
};
pub use report::{
    MonthlyRow, RawReport, ReportBackend, ReportColumn, ReportDefinition, ReportGenerator, ReportModule,
    ReportParams, ReportWorkspace,
};
pub use types::{number_field, FilterCriteria, Page, PaginationCursor, Record};
pub use walker::{walk, PageFetcher, PageWalker};
