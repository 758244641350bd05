//! In-memory backend doubles for unit tests

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::export::{ExportArtifact, ExportRequest};
use crate::report::{MonthlyRow, RawReport, ReportBackend, ReportColumn, ReportModule};
use crate::types::{FilterCriteria, Page, PaginationCursor, Record};
use crate::walker::PageFetcher;

pub fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

pub fn numbered_records(count: usize) -> Vec<Record> {
    (0..count).map(|i| record(json!({ "id": i }))).collect()
}

pub fn pledge(amount: f64, total_paid: f64) -> Record {
    record(json!({ "amount": amount, "totalPaid": total_paid }))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Serves a fixed record list in correctly paginated slices
pub struct PagedCollection {
    records: Vec<Record>,
    calls: Mutex<usize>,
}

impl PagedCollection {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PageFetcher<Record> for PagedCollection {
    async fn fetch_page(&self, _criteria: &FilterCriteria, page: u32, limit: u32) -> CoreResult<Page<Record>> {
        *self.calls.lock().unwrap() += 1;
        let limit = limit as usize;
        let total_pages = ((self.records.len() + limit - 1) / limit).max(1) as u32;
        let start = (page as usize - 1) * limit;
        let records: Vec<Record> = self.records.iter().skip(start).take(limit).cloned().collect();
        Ok(Page::new(
            records,
            PaginationCursor {
                current_page: page,
                next_page: if page < total_pages { Some(page + 1) } else { None },
                prev_page: if page > 1 { Some(page - 1) } else { None },
                total_pages,
            },
        ))
    }
}

enum Scripted {
    Page(Vec<Record>, Option<u32>),
    Failure(String),
}

/// Answers each page number with a prepared response
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<u32, Scripted>,
    requested: Mutex<Vec<u32>>,
    last: Mutex<Option<(FilterCriteria, u32)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, records: Vec<Record>, next_page: Option<u32>) -> Self {
        self.responses.insert(page, Scripted::Page(records, next_page));
        self
    }

    pub fn failure(mut self, page: u32, message: &str) -> Self {
        self.responses.insert(page, Scripted::Failure(message.to_string()));
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    pub fn last_criteria(&self) -> Option<FilterCriteria> {
        self.last.lock().unwrap().as_ref().map(|(c, _)| c.clone())
    }

    pub fn last_limit(&self) -> Option<u32> {
        self.last.lock().unwrap().as_ref().map(|(_, l)| *l)
    }
}

#[async_trait]
impl PageFetcher<Record> for ScriptedFetcher {
    async fn fetch_page(&self, criteria: &FilterCriteria, page: u32, limit: u32) -> CoreResult<Page<Record>> {
        self.requested.lock().unwrap().push(page);
        *self.last.lock().unwrap() = Some((criteria.clone(), limit));
        match self.responses.get(&page) {
            Some(Scripted::Page(records, next)) => Ok(Page::new(
                records.clone(),
                PaginationCursor {
                    current_page: page,
                    next_page: *next,
                    prev_page: None,
                    total_pages: 0,
                },
            )),
            Some(Scripted::Failure(message)) => Err(CoreError::Network {
                message: message.clone(),
            }),
            None => Err(CoreError::Backend {
                status: 404,
                message: format!("page {} not scripted", page),
            }),
        }
    }
}

/// Misbehaving backend that always reports the same `nextPage`
pub struct ConstantCursorFetcher {
    next_page: Option<u32>,
    requested: Mutex<Vec<u32>>,
}

impl ConstantCursorFetcher {
    pub fn new(next_page: Option<u32>) -> Self {
        Self {
            next_page,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher<Record> for ConstantCursorFetcher {
    async fn fetch_page(&self, _criteria: &FilterCriteria, page: u32, _limit: u32) -> CoreResult<Page<Record>> {
        let mut requested = self.requested.lock().unwrap();
        requested.push(page);
        assert!(requested.len() < 100, "walker did not terminate");
        Ok(Page::new(
            numbered_records(1),
            PaginationCursor {
                current_page: page,
                next_page: self.next_page,
                prev_page: None,
                total_pages: 1,
            },
        ))
    }
}

/// Report backend double that records every call
pub struct FakeReportBackend {
    pub report: RawReport,
    pub artifact_content_type: Option<String>,
    pub fail_export_with: Option<(u16, String)>,
    pub report_calls: Mutex<Vec<(ReportModule, NaiveDate, NaiveDate)>>,
    pub export_calls: Mutex<Vec<ExportRequest>>,
}

impl FakeReportBackend {
    pub fn new(report: RawReport) -> Self {
        Self {
            report,
            artifact_content_type: Some("application/pdf".to_string()),
            fail_export_with: None,
            report_calls: Mutex::new(Vec::new()),
            export_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn report_call_count(&self) -> usize {
        self.report_calls.lock().unwrap().len()
    }

    pub fn export_requests(&self) -> Vec<ExportRequest> {
        self.export_calls.lock().unwrap().clone()
    }
}

pub fn sample_report() -> RawReport {
    RawReport {
        title: Some("Pledges".to_string()),
        columns: vec![
            ReportColumn::new("name", "Name"),
            ReportColumn::new("amount", "Amount"),
        ],
        available_columns: Some(vec![
            ReportColumn::new("name", "Name"),
            ReportColumn::new("amount", "Amount"),
            ReportColumn::new("totalPaid", "Paid"),
            ReportColumn::new("status", "Status"),
        ]),
        rows: vec![
            record(json!({ "name": "A. Mensah", "amount": 500 })),
            record(json!({ "name": "B. Owusu", "amount": 250 })),
        ],
    }
}

#[async_trait]
impl ReportBackend for FakeReportBackend {
    async fn fetch_report(&self, module: ReportModule, from: NaiveDate, to: NaiveDate) -> CoreResult<RawReport> {
        self.report_calls.lock().unwrap().push((module, from, to));
        Ok(self.report.clone())
    }

    async fn export_report(&self, request: &ExportRequest) -> CoreResult<ExportArtifact> {
        self.export_calls.lock().unwrap().push(request.clone());
        if let Some((status, message)) = &self.fail_export_with {
            return Err(CoreError::Backend {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(ExportArtifact {
            content_type: self.artifact_content_type.clone(),
            bytes: b"%PDF-1.4 fake".to_vec(),
        })
    }

    async fn fetch_kpis(&self) -> CoreResult<Record> {
        Ok(record(json!({ "members": 120, "tithe": 4500.5 })))
    }

    async fn fetch_analytics(&self, _year: i32) -> CoreResult<Vec<MonthlyRow>> {
        Ok(vec![])
    }
}
