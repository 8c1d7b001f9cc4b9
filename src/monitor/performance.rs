//! Monthly CPU utilisation export.
//!
//! For every managed vSphere host the performance API is asked for a month
//! of hourly CPU averages, written out as one `timestamp,value` CSV per host.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Month, TimeZone, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::policy;
use super::router::RouterClient;
use super::types::{Datapoint, PerformanceResponse};
use crate::domain::model::display_or_unknown;
use crate::domain::ReconciledRecord;
use crate::error::{Error, Result};
use crate::report::ReportWriter;

/// Performance query endpoint, relative to the base URL
pub const QUERY_PATH: &str = "api/performance/query/";

const CPU_METRIC: &str = "vCenter/cpuUsage_cpuUsage";

// =============================================================================
// Report Period
// =============================================================================

/// Calendar month a performance report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub month: Month,
    pub year: i32,
}

impl ReportPeriod {
    pub fn new(month: Month, year: i32) -> Self {
        Self { month, year }
    }

    /// The month we are in, UTC.
    pub fn current() -> Result<Self> {
        let now = Utc::now();
        let month = Month::try_from(now.month() as u8)
            .map_err(|_| Error::Internal(format!("invalid month {}", now.month())))?;
        Ok(Self::new(month, now.year()))
    }

    /// Parse a month given by name (`November`, `nov`) or number (`11`).
    ///
    /// Without a year the current one is used.
    pub fn parse(month: &str, year: Option<i32>) -> Result<Self> {
        let month = month.trim();
        let parsed = match month.parse::<u8>() {
            Ok(n) => Month::try_from(n).ok(),
            Err(_) => Month::from_str(month).ok(),
        };
        let month = parsed.ok_or_else(|| Error::Config(format!("unrecognised month '{}'", month)))?;

        let year = year.unwrap_or_else(|| Utc::now().year());
        if !(1970..=9999).contains(&year) {
            return Err(Error::Config(format!("report year {} out of range", year)));
        }
        Ok(Self::new(month, year))
    }

    pub fn month_name(&self) -> &'static str {
        self.month.name()
    }

    /// First and last second of the month as Unix timestamps.
    pub fn bounds(&self) -> Result<(i64, i64)> {
        let month = self.month.number_from_month();
        let (next_year, next_month) = if month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, month + 1)
        };

        let start = Utc
            .with_ymd_and_hms(self.year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| Error::Internal(format!("no start for {:?}", self)))?;
        let next = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| Error::Internal(format!("no end for {:?}", self)))?;

        Ok((start.timestamp(), next.timestamp() - 1))
    }
}

/// Request body for one host's hourly CPU series.
pub fn query_body(key: &str, start: i64, end: i64) -> Value {
    json!({
        "start": start,
        "end": end,
        "series": true,
        "downsample": "1h-avg",
        "tags": {},
        "returnset": "EXACT",
        "metrics": [
            {
                "metric": CPU_METRIC,
                "rate": false,
                "rateOptions": {},
                "aggregator": "avg",
                "tags": { "key": [key] },
                "name": "Usage-raw",
                "emit": false
            },
            {
                "name": "Usage",
                "expression": "rpn:Usage-raw,100,/"
            }
        ]
    })
}

/// Render datapoints as `timestamp,value` CSV. Null values are skipped.
pub fn render_series(points: &[Datapoint]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["timestamp", "value"])?;

    for point in points {
        if let Some(value) = point.value {
            let timestamp = format!("{}", point.timestamp.round() as i64);
            writer.write_record([timestamp, value.to_string()])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV is not UTF-8: {}", e)))
}

// =============================================================================
// Exporter
// =============================================================================

/// Fetches and writes monthly CPU series for managed hosts.
pub struct PerformanceExporter {
    router: Arc<RouterClient>,
    period: ReportPeriod,
}

impl PerformanceExporter {
    pub fn new(router: Arc<RouterClient>, period: ReportPeriod) -> Self {
        Self { router, period }
    }

    pub fn period(&self) -> ReportPeriod {
        self.period
    }

    /// Fetch one host's series, sorted by timestamp.
    #[instrument(skip(self))]
    pub async fn fetch_series(&self, key: &str) -> Result<Vec<Datapoint>> {
        let (start, end) = self.period.bounds()?;
        let url = self.router.url(QUERY_PATH);
        debug!(start, end, url = %url, "Requesting performance report");

        let Some(body) = self.router.post_json(&url, &query_body(key, start, end)).await? else {
            return Ok(Vec::new());
        };

        let response: PerformanceResponse = serde_json::from_str(&body)?;
        let mut points = response
            .results
            .into_iter()
            .next()
            .map(|series| series.datapoints)
            .unwrap_or_default();
        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(points)
    }

    /// `<name>-<serial>-<Month>-<year>.csv`
    pub fn file_name(&self, record: &ReconciledRecord) -> String {
        let device_name = record.device.as_ref().map(|d| d.name.as_str()).unwrap_or("");
        let server_name = record.server.as_ref().and_then(|s| s.name.as_deref()).unwrap_or("");
        let name = [device_name, server_name]
            .into_iter()
            .find(|n| !n.is_empty())
            .unwrap_or("server");
        let serial = record
            .server
            .as_ref()
            .map(|s| display_or_unknown(&s.serial))
            .unwrap_or(crate::domain::UNKNOWN);

        let stem = format!(
            "{}-{}-{}-{}",
            name,
            serial,
            self.period.month_name(),
            self.period.year
        );
        format!("{}.csv", stem.replace(['/', '\\'], "_"))
    }

    async fn export_one(
        &self,
        record: &ReconciledRecord,
        key: &str,
        writer: &ReportWriter,
    ) -> Result<std::path::PathBuf> {
        let points = self.fetch_series(key).await?;
        let csv = render_series(&points)?;
        writer.write_file(&self.file_name(record), &csv).await
    }

    /// Export every managed vSphere host once. Returns the number of files written.
    pub async fn export(&self, records: &[ReconciledRecord], writer: &ReportWriter) -> usize {
        let mut written = 0;
        let mut exported = HashSet::new();

        for record in records.iter().filter(|r| r.is_managed) {
            let Some(device) = &record.device else {
                continue;
            };
            if !exported.insert(device.uid.as_str()) {
                debug!(uid = %device.uid, "Host matched several servers, already exported");
                continue;
            }
            let Some(key) = policy::metric_key(&device.uid) else {
                debug!(uid = %device.uid, "Not a vSphere host, no performance report");
                continue;
            };

            match self.export_one(record, &key, writer).await {
                Ok(path) => {
                    debug!(uid = %device.uid, path = %path.display(), "Wrote performance report");
                    written += 1;
                }
                Err(e) => warn!(uid = %device.uid, key = %key, "Performance report failed: {}", e),
            }
        }

        info!(
            reports = written,
            month = self.period.month_name(),
            year = self.period.year,
            "Performance export complete"
        );
        written
    }
}
