//! Report generator
//!
//! A report is a single request: the back office returns an already
//! aggregated table (dynamic column schema plus rows) for one module and
//! date window. The engine validates the request locally, stores the
//! returned projection, and remembers the full column superset for export.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::access::{Action, Capabilities};
use crate::error::{CoreError, CoreResult};
use crate::export::{ExportArtifact, ExportRequest, ExportSession};
use crate::types::Record;

/// Record domains the report engine can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportModule {
    Members,
    Attendance,
    Tithe,
    Offerings,
    Expenses,
    Pledges,
    Welfare,
    Cells,
    Departments,
    Events,
    Projects,
}

impl ReportModule {
    pub const ALL: [ReportModule; 11] = [
        ReportModule::Members,
        ReportModule::Attendance,
        ReportModule::Tithe,
        ReportModule::Offerings,
        ReportModule::Expenses,
        ReportModule::Pledges,
        ReportModule::Welfare,
        ReportModule::Cells,
        ReportModule::Departments,
        ReportModule::Events,
        ReportModule::Projects,
    ];

    /// Identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportModule::Members => "members",
            ReportModule::Attendance => "attendance",
            ReportModule::Tithe => "tithe",
            ReportModule::Offerings => "offerings",
            ReportModule::Expenses => "expenses",
            ReportModule::Pledges => "pledges",
            ReportModule::Welfare => "welfare",
            ReportModule::Cells => "cells",
            ReportModule::Departments => "departments",
            ReportModule::Events => "events",
            ReportModule::Projects => "projects",
        }
    }
}

impl std::str::FromStr for ReportModule {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ReportModule::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| CoreError::UnknownModule {
                module: s.to_string(),
            })
    }
}

impl std::fmt::Display for ReportModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One column of a report schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub key: String,
    pub label: String,
}

impl ReportColumn {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// Report as sent by the back office
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub columns: Vec<ReportColumn>,
    #[serde(default)]
    pub available_columns: Option<Vec<ReportColumn>>,
    #[serde(default)]
    pub rows: Vec<Record>,
}

/// A generated report, immutable once assigned to the view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub module: ReportModule,
    pub title: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Current projection
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<Record>,
    /// Full schema offered to the export column picker
    pub available_columns: Vec<ReportColumn>,
}

impl ReportDefinition {
    /// Build from the wire shape, falling back to `columns` when the back
    /// office omits the column superset
    pub fn from_raw(module: ReportModule, date_from: NaiveDate, date_to: NaiveDate, raw: RawReport) -> Self {
        let available_columns = match raw.available_columns {
            Some(available) if !available.is_empty() => available,
            _ => raw.columns.clone(),
        };
        Self {
            module,
            title: raw
                .title
                .unwrap_or_else(|| format!("{} report", module.as_str())),
            date_from,
            date_to,
            columns: raw.columns,
            rows: raw.rows,
            available_columns,
        }
    }

    pub fn available_keys(&self) -> Vec<&str> {
        self.available_columns.iter().map(|c| c.key.as_str()).collect()
    }

    pub fn offers_column(&self, key: &str) -> bool {
        self.available_columns.iter().any(|c| c.key == key)
    }
}

/// One month of the yearly analytics series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    #[serde(flatten)]
    pub values: Record,
}

impl MonthlyRow {
    /// Month label as sent by the back office
    pub fn month(&self) -> String {
        match self.values.get("month").or_else(|| self.values.get("label")) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Back-office endpoints the reporting engine consumes
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// One pre-shaped report for a module and date window
    async fn fetch_report(&self, module: ReportModule, from: NaiveDate, to: NaiveDate) -> CoreResult<RawReport>;

    /// Binary artifact for an export request
    async fn export_report(&self, request: &ExportRequest) -> CoreResult<ExportArtifact>;

    /// Server-side pre-aggregated KPIs, consumed as-is
    async fn fetch_kpis(&self) -> CoreResult<Record>;

    /// Monthly analytics series for a year
    async fn fetch_analytics(&self, year: i32) -> CoreResult<Vec<MonthlyRow>>;
}

/// Issues report requests after local validation
pub struct ReportGenerator<B: ?Sized> {
    backend: Arc<B>,
    capabilities: Arc<dyn Capabilities>,
}

impl<B: ?Sized> Clone for ReportGenerator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            capabilities: Arc::clone(&self.capabilities),
        }
    }
}

impl<B> ReportGenerator<B>
where
    B: ReportBackend + ?Sized,
{
    pub fn new(backend: Arc<B>, capabilities: Arc<dyn Capabilities>) -> Self {
        Self { backend, capabilities }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn capabilities(&self) -> &dyn Capabilities {
        self.capabilities.as_ref()
    }

    /// Request a fresh report; there is no caching between calls
    ///
    /// Unknown modules, reversed date ranges and refused capabilities are
    /// rejected before any request is made.
    pub async fn generate(&self, module: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<ReportDefinition> {
        let module: ReportModule = module.parse()?;

        if from > to {
            return Err(CoreError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if !self.capabilities.can(module.as_str(), Action::View) {
            return Err(CoreError::Unauthorized {
                module: module.to_string(),
                action: Action::View.to_string(),
            });
        }

        let raw = self.backend.fetch_report(module, from, to).await?;
        let report = ReportDefinition::from_raw(module, from, to, raw);
        info!(
            "generated {} report {}..{}: {} column(s), {} row(s)",
            module,
            from,
            to,
            report.columns.len(),
            report.rows.len()
        );
        Ok(report)
    }
}

/// Report inputs as currently typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParams {
    pub module: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl ReportParams {
    pub fn new(module: &str, date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            module: module.to_string(),
            date_from,
            date_to,
        }
    }
}

/// Report screen state: pending inputs plus the last generated report
///
/// Editing the inputs never touches the generated report. Export always
/// works from the last successfully generated report.
pub struct ReportWorkspace<B: ?Sized> {
    generator: ReportGenerator<B>,
    pending: ReportParams,
    current: Option<ReportDefinition>,
}

impl<B> ReportWorkspace<B>
where
    B: ReportBackend + ?Sized,
{
    pub fn new(generator: ReportGenerator<B>, pending: ReportParams) -> Self {
        Self {
            generator,
            pending,
            current: None,
        }
    }

    pub fn pending(&self) -> &ReportParams {
        &self.pending
    }

    /// Replace the pending inputs
    pub fn edit(&mut self, pending: ReportParams) {
        self.pending = pending;
    }

    pub fn current(&self) -> Option<&ReportDefinition> {
        self.current.as_ref()
    }

    /// Generate from the pending inputs
    ///
    /// On failure the previously generated report stays in place.
    pub async fn generate(&mut self) -> CoreResult<&ReportDefinition> {
        let params = self.pending.clone();
        match self
            .generator
            .generate(&params.module, params.date_from, params.date_to)
            .await
        {
            Ok(report) => Ok(&*self.current.insert(report)),
            Err(e) => {
                warn!("report generation for '{}' failed: {}", params.module, e);
                Err(e)
            }
        }
    }

    /// Drop the generated report
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Start the column/format picker for the last generated report
    pub fn begin_export(&self) -> CoreResult<ExportSession> {
        self.current
            .as_ref()
            .map(ExportSession::from_report)
            .ok_or(CoreError::NoReport)
    }

    pub fn generator(&self) -> &ReportGenerator<B> {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AllowAll, StaticCapabilities};
    use crate::testing::{date, sample_report, FakeReportBackend};

    fn generator(backend: Arc<FakeReportBackend>) -> ReportGenerator<FakeReportBackend> {
        ReportGenerator::new(backend, Arc::new(AllowAll))
    }

    #[test]
    fn test_module_parsing() {
        assert_eq!("members".parse::<ReportModule>().unwrap(), ReportModule::Members);
        assert_eq!(" Pledges ".parse::<ReportModule>().unwrap(), ReportModule::Pledges);
        assert!(matches!(
            "sermons".parse::<ReportModule>(),
            Err(CoreError::UnknownModule { .. })
        ));
        for module in ReportModule::ALL {
            assert_eq!(module.as_str().parse::<ReportModule>().unwrap(), module);
        }
    }

    #[tokio::test]
    async fn test_generate_issues_one_request_and_keeps_rows() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let gen = generator(backend.clone());

        let report = gen
            .generate("members", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        assert_eq!(backend.report_call_count(), 1);
        assert_eq!(
            backend.report_calls.lock().unwrap()[0],
            (ReportModule::Members, date(2024, 1, 1), date(2024, 1, 31))
        );
        assert_eq!(report.module, ReportModule::Members);
        assert_eq!(report.columns, sample_report().columns);
        assert_eq!(report.rows, sample_report().rows);
        assert_eq!(report.available_keys(), vec!["name", "amount", "totalPaid", "status"]);
    }

    #[tokio::test]
    async fn test_generate_twice_is_not_cached() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let gen = generator(backend.clone());

        gen.generate("members", date(2024, 1, 1), date(2024, 1, 31)).await.unwrap();
        gen.generate("members", date(2024, 1, 1), date(2024, 1, 31)).await.unwrap();
        assert_eq!(backend.report_call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_module_makes_no_request() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let gen = generator(backend.clone());

        let err = gen
            .generate("sermons", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownModule { .. }));
        assert_eq!(backend.report_call_count(), 0);
    }

    #[tokio::test]
    async fn test_reversed_range_makes_no_request() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let gen = generator(backend.clone());

        let err = gen
            .generate("tithe", date(2024, 2, 1), date(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateRange { .. }));
        assert_eq!(backend.report_call_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_capability_makes_no_request() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let gen = ReportGenerator::new(
            backend.clone(),
            Arc::new(StaticCapabilities::new().grant("members", Action::View)),
        );

        let err = gen
            .generate("pledges", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        assert_eq!(backend.report_call_count(), 0);
    }

    #[test]
    fn test_available_columns_fall_back_to_columns() {
        let mut raw = sample_report();
        raw.available_columns = None;
        let report = ReportDefinition::from_raw(ReportModule::Pledges, date(2024, 1, 1), date(2024, 1, 31), raw.clone());
        assert_eq!(report.available_columns, raw.columns);

        raw.available_columns = Some(vec![]);
        let report = ReportDefinition::from_raw(ReportModule::Pledges, date(2024, 1, 1), date(2024, 1, 31), raw.clone());
        assert_eq!(report.available_columns, raw.columns);
        assert_eq!(report.title, "Pledges");
    }

    #[test]
    fn test_raw_report_wire_shape() {
        let raw: RawReport = serde_json::from_value(serde_json::json!({
            "title": "Members",
            "columns": [{"key": "name", "label": "Name"}],
            "availableColumns": [{"key": "name", "label": "Name"}, {"key": "phone", "label": "Phone"}],
            "rows": [{"name": "Ama"}]
        }))
        .unwrap();
        assert_eq!(raw.available_columns.unwrap().len(), 2);
        assert_eq!(raw.rows.len(), 1);
    }

    #[test]
    fn test_monthly_row_month_label() {
        let row: MonthlyRow = serde_json::from_value(serde_json::json!({"month": "Jan", "tithe": 10})).unwrap();
        assert_eq!(row.month(), "Jan");
        let row: MonthlyRow = serde_json::from_value(serde_json::json!({"month": 2, "tithe": 10})).unwrap();
        assert_eq!(row.month(), "2");
    }

    #[tokio::test]
    async fn test_workspace_keeps_last_report_on_failure() {
        let backend = Arc::new(FakeReportBackend::new(sample_report()));
        let mut workspace = ReportWorkspace::new(
            generator(backend.clone()),
            ReportParams::new("pledges", date(2024, 1, 1), date(2024, 3, 31)),
        );

        assert!(matches!(workspace.begin_export(), Err(CoreError::NoReport)));
        workspace.generate().await.unwrap();

        workspace.edit(ReportParams::new("sermons", date(2024, 1, 1), date(2024, 3, 31)));
        assert!(workspace.generate().await.is_err());

        let current = workspace.current().unwrap();
        assert_eq!(current.module, ReportModule::Pledges);
        assert_eq!(workspace.pending().module, "sermons");
        assert_eq!(backend.report_call_count(), 1);

        workspace.clear();
        assert!(workspace.current().is_none());
    }
}
