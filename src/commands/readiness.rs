//! `check-reference-readiness` / `validate-reference-report`: thin calls
//! into the [`crate::collaborators::ReferenceReadinessGate`] capability —
//! the actual manifest-driven pre-flight logic is an external
//! collaborator out of this crate's scope (spec §1).

use std::path::Path;

use crate::collaborators::ReferenceReadinessGate;
use crate::error::FtError;
use crate::output::Report;

pub fn check_reference_readiness(
    gate: &dyn ReferenceReadinessGate,
    manifest: Option<&Path>,
    strict: bool,
) -> Result<Report, FtError> {
    gate.check(manifest, strict)?;
    Ok(Report::new().field("status", "ready").field("strict", strict))
}

pub fn validate_reference_report(
    gate: &dyn ReferenceReadinessGate,
    report_path: &Path,
) -> Result<Report, FtError> {
    gate.validate_report(report_path)?;
    Ok(Report::new()
        .field("status", "valid")
        .field("report", report_path.to_string_lossy().into_owned()))
}
