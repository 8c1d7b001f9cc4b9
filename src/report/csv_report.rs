//! Matched-server CSV report.

use csv::Writer;

use crate::domain::model::display_or_unknown;
use crate::domain::ReconciledRecord;
use crate::error::{Error, Result};

/// Fixed column order of the report.
pub const REPORT_HEADER: [&str; 10] = [
    "name",
    "uuid",
    "serial",
    "domain",
    "domainversion",
    "position",
    "model",
    "pid",
    "description",
    "dn",
];

/// Render one row per managed record. Unmanaged records are left out.
pub fn render_csv(records: &[ReconciledRecord]) -> Result<String> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(REPORT_HEADER)?;

    for server in records
        .iter()
        .filter(|r| r.is_managed)
        .filter_map(|r| r.server.as_ref())
    {
        wtr.write_record([
            display_or_unknown(&server.name),
            display_or_unknown(&server.uuid),
            display_or_unknown(&server.serial),
            server.domain_name.as_str(),
            server.domain_version.as_str(),
            display_or_unknown(&server.position),
            display_or_unknown(&server.model),
            display_or_unknown(&server.part_number),
            display_or_unknown(&server.description),
            server.dn.as_str(),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(data).map_err(|e| Error::Internal(format!("UTF-8 conversion error: {}", e)))
}
