//! JSON Output

use crate::report::Report;

/// Current JSON schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
