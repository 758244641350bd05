//! Export orchestrator
//!
//! Two steps: pick columns from the report's available schema, then pick
//! an output format. Choosing a format issues the export request for the
//! module and date range of the report the session was opened from, then
//! hands the returned bytes to an [`ArtifactSink`].

use async_trait::async_trait;
use chrono::NaiveDate;
use ecclesia_utils::{extension_for_content_type, sanitize_filename_part};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::access::{Action, Capabilities};
use crate::error::{CoreError, CoreResult, DefaultErrorLogger, ErrorContext, ErrorLogger};
use crate::report::{ReportBackend, ReportColumn, ReportDefinition, ReportModule};

/// Output formats the back office can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }

    /// Extension used when the response does not declare a known type
    pub fn default_extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "xlsx",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            other => Err(CoreError::ValidationError {
                message: format!("Unsupported export format: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated export request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub module: ReportModule,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub format: ExportFormat,
    pub fields: Vec<String>,
}

impl ExportRequest {
    /// Build a request against `report`
    ///
    /// `fields` must be a non-empty subset of the report's available
    /// column keys.
    pub fn new(report: &ReportDefinition, format: ExportFormat, fields: Vec<String>) -> CoreResult<Self> {
        if fields.is_empty() {
            return Err(CoreError::NoFieldsSelected);
        }
        if let Some(unknown) = fields.iter().find(|f| !report.offers_column(f)) {
            return Err(CoreError::UnknownField { key: unknown.clone() });
        }
        Ok(Self {
            module: report.module,
            date_from: report.date_from,
            date_to: report.date_to,
            format,
            fields,
        })
    }

    /// Query parameters for the export endpoint
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("module".to_string(), self.module.as_str().to_string()),
            ("from".to_string(), self.date_from.format("%Y-%m-%d").to_string()),
            ("to".to_string(), self.date_to.format("%Y-%m-%d").to_string()),
            ("format".to_string(), self.format.as_str().to_string()),
            ("fields".to_string(), self.fields.join(",")),
        ]
    }

    /// `{module}-report-{from}-to-{to}.{ext}`
    pub fn filename(&self, extension: &str) -> String {
        format!(
            "{}-report-{}-to-{}.{}",
            sanitize_filename_part(self.module.as_str()),
            self.date_from.format("%Y-%m-%d"),
            self.date_to.format("%Y-%m-%d"),
            extension
        )
    }
}

/// Binary body returned by the export endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Extension derived from the declared content type
    pub fn extension(&self, requested: ExportFormat) -> &'static str {
        self.content_type
            .as_deref()
            .and_then(extension_for_content_type)
            .unwrap_or_else(|| requested.default_extension())
    }
}

/// Destination for exported files
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `bytes` under `filename`, returning where they ended up
    async fn save(&self, filename: &str, bytes: &[u8]) -> CoreResult<PathBuf>;
}

/// Writes exports into a directory, creating it on demand
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &ecclesia_config::Config) -> Self {
        Self::new(config.export.output_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> CoreResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Where the operator is in the export workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStep {
    Fields,
    Format,
    Done,
}

/// A file that was exported and saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedExport {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Column and format picker bound to one generated report
///
/// The session snapshots the report it was opened from, so later edits to
/// the report inputs cannot change what gets exported.
#[derive(Debug, Clone)]
pub struct ExportSession {
    report: ReportDefinition,
    selected: Vec<String>,
    step: ExportStep,
    last_error: Option<String>,
    saved: Option<SavedExport>,
}

impl ExportSession {
    /// Open with the report's current projection preselected
    pub fn from_report(report: &ReportDefinition) -> Self {
        let selected = report
            .columns
            .iter()
            .filter(|c| report.offers_column(&c.key))
            .map(|c| c.key.clone())
            .collect();
        Self {
            report: report.clone(),
            selected,
            step: ExportStep::Fields,
            last_error: None,
            saved: None,
        }
    }

    pub fn step(&self) -> ExportStep {
        self.step
    }

    pub fn module(&self) -> ReportModule {
        self.report.module
    }

    pub fn available_columns(&self) -> &[ReportColumn] {
        &self.report.available_columns
    }

    /// Selected keys in schema order
    pub fn selected_fields(&self) -> Vec<String> {
        self.report
            .available_columns
            .iter()
            .filter(|c| self.selected.contains(&c.key))
            .map(|c| c.key.clone())
            .collect()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.iter().any(|k| k == key)
    }

    /// Message from the last failed export attempt
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn saved(&self) -> Option<&SavedExport> {
        self.saved.as_ref()
    }

    fn require_step(&self, step: ExportStep) -> CoreResult<()> {
        if self.step == step {
            Ok(())
        } else {
            Err(CoreError::ValidationError {
                message: format!(
                    "Export is at the {:?} step, expected {:?}",
                    self.step, step
                ),
            })
        }
    }

    /// Flip one column; returns whether it is now selected
    pub fn toggle_field(&mut self, key: &str) -> CoreResult<bool> {
        self.require_step(ExportStep::Fields)?;
        if !self.report.offers_column(key) {
            return Err(CoreError::UnknownField { key: key.to_string() });
        }
        if let Some(pos) = self.selected.iter().position(|k| k == key) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(key.to_string());
            Ok(true)
        }
    }

    pub fn select_all(&mut self) -> CoreResult<()> {
        self.require_step(ExportStep::Fields)?;
        self.selected = self
            .report
            .available_columns
            .iter()
            .map(|c| c.key.clone())
            .collect();
        Ok(())
    }

    pub fn clear_selection(&mut self) -> CoreResult<()> {
        self.require_step(ExportStep::Fields)?;
        self.selected.clear();
        Ok(())
    }

    /// Move from column selection to format selection
    pub fn advance(&mut self) -> CoreResult<()> {
        self.require_step(ExportStep::Fields)?;
        if self.selected.is_empty() {
            return Err(CoreError::NoFieldsSelected);
        }
        self.step = ExportStep::Format;
        Ok(())
    }

    /// Return to column selection, keeping the current selection
    pub fn back(&mut self) -> CoreResult<()> {
        self.require_step(ExportStep::Format)?;
        self.step = ExportStep::Fields;
        self.last_error = None;
        Ok(())
    }

    /// Issue the export in `format` and save the result
    ///
    /// On failure the session stays at the format step with
    /// [`last_error`](Self::last_error) set, so the column selection is kept.
    pub async fn choose_format<B, S>(
        &mut self,
        format: ExportFormat,
        backend: &B,
        sink: &S,
        capabilities: &dyn Capabilities,
    ) -> CoreResult<SavedExport>
    where
        B: ReportBackend + ?Sized,
        S: ArtifactSink + ?Sized,
    {
        self.require_step(ExportStep::Format)?;

        let module = self.report.module;
        if !capabilities.can(module.as_str(), Action::Export) {
            let err = CoreError::Unauthorized {
                module: module.to_string(),
                action: Action::Export.to_string(),
            };
            self.last_error = Some(err.user_message());
            return Err(err);
        }

        let request = ExportRequest::new(&self.report, format, self.selected_fields())?;
        match Self::fetch_and_save(&request, backend, sink).await {
            Ok(saved) => {
                info!("exported {} ({} bytes) to {}", saved.filename, saved.size, saved.path.display());
                self.last_error = None;
                self.saved = Some(saved.clone());
                self.step = ExportStep::Done;
                Ok(saved)
            }
            Err(e) => {
                let context = ErrorContext::new("export")
                    .with_data("module", serde_json::json!(module.as_str()))
                    .with_data("format", serde_json::json!(format.as_str()));
                DefaultErrorLogger.log_error(&e, &context);
                warn!("export of {} as {} failed, staying at format step", module, format);
                self.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    async fn fetch_and_save<B, S>(request: &ExportRequest, backend: &B, sink: &S) -> CoreResult<SavedExport>
    where
        B: ReportBackend + ?Sized,
        S: ArtifactSink + ?Sized,
    {
        let artifact = backend.export_report(request).await?;
        let filename = request.filename(artifact.extension(request.format));
        let path = sink.save(&filename, &artifact.bytes).await?;
        Ok(SavedExport {
            path,
            filename,
            content_type: artifact.content_type,
            size: artifact.bytes.len(),
        })
    }
}
