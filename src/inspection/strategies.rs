use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::markup;
use super::types::InspectionRecord;
use crate::config::JurisdictionConfig;
use crate::error::FetchError;
use crate::ratelimit::RateLimiter;
use crate::transport::{send_with_retry, Request, RetryPolicy, Transport};

static CRITICAL_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*critical").expect("critical count pattern"));
static NONCRITICAL_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*non-?critical").expect("non-critical count pattern"));
static CRITICAL_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)critical").expect("critical label"));
static NONCRITICAL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)non-?critical").expect("non-critical label"));
static LABELLED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date[^0-9]{0,40}(\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2})").expect("labelled date")
});
static ANY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b").expect("date pattern"));
static INSPECTION_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)inspection\s+type\s*:?\s*([A-Za-z][A-Za-z\-]*)").expect("inspection type")
});
static SCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bscore\s*:?\s*(\d{1,3})\b").expect("score pattern"));

/// Everything a strategy may need to reach the portal it is parsing.
pub struct StrategyContext<'a> {
    pub transport: &'a dyn Transport,
    pub limiter: &'a RateLimiter,
    pub retry: &'a RetryPolicy,
    pub jurisdiction: &'a JurisdictionConfig,
    /// Compiled `jurisdiction.inspection_link`
    pub inspection_link: &'a Regex,
}

/// Records a strategy found on a facility page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<InspectionRecord>,
    /// A page the strategy needed could not be fetched, so the records may be incomplete
    pub degraded: bool,
}

impl Extraction {
    pub fn complete(records: Vec<InspectionRecord>) -> Self {
        Self {
            records,
            degraded: false,
        }
    }
}

/// One way of turning a facility page into inspection records.
///
/// Strategies never fail: a page they cannot read yields no records, and the
/// extractor moves on to the next strategy. Pages that could not be fetched
/// mark the extraction as degraded.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, facility_page: &str, ctx: &StrategyContext<'_>) -> Extraction;
}

fn first_count(pattern: &Regex, text: &str) -> u32 {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Reads the inspection history table on the facility page.
///
/// Each row holding an inspection link contributes one record: the first
/// cell is the date and violation counts come from "N critical" and
/// "N non-critical" anywhere in the row.
pub struct TableStrategy;

impl TableStrategy {
    pub fn parse(&self, facility_page: &str, jurisdiction: &str, inspection_link: &Regex) -> Vec<InspectionRecord> {
        let mut records = Vec::new();

        for row in markup::table_rows(facility_page) {
            if markup::links_matching(&row, inspection_link).is_empty() {
                continue;
            }

            let cells = markup::row_cells(&row);
            if cells.len() < 3 {
                tracing::debug!(cells = cells.len(), "Skipping short inspection row");
                continue;
            }

            let date = cells[0].trim();
            if date.is_empty() {
                continue;
            }

            let text = markup::strip_tags(&row);
            records.push(
                InspectionRecord::new(
                    date,
                    first_count(&CRITICAL_COUNT, &text),
                    first_count(&NONCRITICAL_COUNT, &text),
                )
                .with_jurisdiction(jurisdiction),
            );
        }

        records
    }
}

#[async_trait]
impl ExtractionStrategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn extract(&self, facility_page: &str, ctx: &StrategyContext<'_>) -> Extraction {
        Extraction::complete(self.parse(facility_page, &ctx.jurisdiction.name, ctx.inspection_link))
    }
}

/// Follows the most recent inspection links and reads each detail page on its own.
pub struct DetailPageStrategy {
    pub max_pages: usize,
}

impl DetailPageStrategy {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    /// Parse one inspection detail page.
    ///
    /// Violations are counted by label: every "Non-Critical" is a non-critical
    /// finding and every remaining "Critical" a critical one. Returns `None`
    /// when no date can be found.
    pub fn parse_detail(&self, page: &str, jurisdiction: &str) -> Option<InspectionRecord> {
        let text = markup::strip_tags(page);

        let date = LABELLED_DATE
            .captures(&text)
            .or_else(|| ANY_DATE.captures(&text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())?;

        let noncritical = NONCRITICAL_LABEL.find_iter(&text).count();
        let critical = CRITICAL_LABEL.find_iter(&text).count().saturating_sub(noncritical);

        let mut record = InspectionRecord::new(date, critical as u32, noncritical as u32)
            .with_jurisdiction(jurisdiction);
        record.inspection_type = INSPECTION_TYPE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());
        record.score = SCORE
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        Some(record)
    }
}

#[async_trait]
impl ExtractionStrategy for DetailPageStrategy {
    fn name(&self) -> &'static str {
        "detail-pages"
    }

    async fn extract(&self, facility_page: &str, ctx: &StrategyContext<'_>) -> Extraction {
        let links = markup::links_matching(facility_page, ctx.inspection_link);
        let mut extraction = Extraction::default();

        for link in links.iter().take(self.max_pages) {
            let url = markup::absolute_url(&ctx.jurisdiction.base_url, &link.href);
            let request = Request::get(&url);

            match send_with_retry(ctx.transport, ctx.limiter, &request, ctx.retry).await {
                Ok(page) => match self.parse_detail(&page, &ctx.jurisdiction.name) {
                    Some(record) => extraction.records.push(record),
                    None => tracing::debug!(url = %url, "No inspection date on detail page"),
                },
                Err(FetchError::NotFound(_)) => {
                    tracing::debug!(url = %url, "Inspection detail page not found");
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Skipping inspection detail page");
                    extraction.degraded = true;
                }
            }
        }

        extraction
    }
}
