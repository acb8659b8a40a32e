//! Capability traits for the two external collaborators spec §1 excludes
//! from the core's scope but that the lifecycle engine still calls
//! through at fixed points: the reference-readiness gate (precondition to
//! `create-feat`) and the living-docs inbox sink (optional archive step).
//!
//! Both ship a permissive/no-op default so the core is fully testable and
//! usable standalone; a real deployment wires in its own implementation.

use std::path::Path;

use crate::error::FtError;

/// Pre-flight check consumed only as a pass/fail precondition to
/// `create-feat` (spec §1). The bundled stub requires the manifest path
/// to exist and be non-empty when `strict` is set; otherwise it always
/// passes.
pub trait ReferenceReadinessGate {
    fn check(&self, manifest: Option<&Path>, strict: bool) -> Result<(), FtError>;

    /// Validate a previously-produced reference-readiness report
    /// (`validate-reference-report` in spec §6's CLI surface). The
    /// bundled stub requires the report to parse as a JSON object with a
    /// truthy `passed` field.
    fn validate_report(&self, report: &Path) -> Result<(), FtError>;
}

pub struct DefaultReferenceReadinessGate;

impl ReferenceReadinessGate for DefaultReferenceReadinessGate {
    fn check(&self, manifest: Option<&Path>, strict: bool) -> Result<(), FtError> {
        if !strict {
            return Ok(());
        }
        let manifest = manifest.ok_or_else(|| FtError::NotFound {
            what: "--manifest is required in strict mode".to_string(),
        })?;
        let metadata = std::fs::metadata(manifest).map_err(|_| FtError::NotFound {
            what: format!("reference manifest {}", manifest.display()),
        })?;
        if metadata.len() == 0 {
            return Err(FtError::NotFound {
                what: format!("reference manifest {} is empty", manifest.display()),
            });
        }
        Ok(())
    }

    fn validate_report(&self, report: &Path) -> Result<(), FtError> {
        let raw = std::fs::read_to_string(report).map_err(|_| FtError::NotFound {
            what: format!("reference readiness report {}", report.display()),
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| FtError::Corrupt {
                path: report.to_path_buf(),
                reason: e.to_string(),
            })?;
        let passed = value
            .as_object()
            .and_then(|obj| obj.get("passed"))
            .and_then(serde_json::Value::as_bool);
        match passed {
            Some(true) => Ok(()),
            Some(false) => Err(FtError::InvalidTransition {
                reason: format!("reference readiness report {} reports passed=false", report.display()),
            }),
            None => Err(FtError::Corrupt {
                path: report.to_path_buf(),
                reason: "report is missing a boolean `passed` field".to_string(),
            }),
        }
    }
}

/// Optional sink consumed when archiving (spec §4.7 step 6). Best-effort:
/// its failures never abort the archive. The bundled stub does nothing —
/// a real deployment writes `decision-*`/`gotcha-*`/`howto-*-result`
/// inbox files.
pub trait LivingDocsSink {
    fn sync(&self, feat_id: &str, archived_dir: &Path) -> Result<(), FtError>;
}

pub struct NoopLivingDocsSink;

impl LivingDocsSink for NoopLivingDocsSink {
    fn sync(&self, _feat_id: &str, _archived_dir: &Path) -> Result<(), FtError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_when_not_strict_even_without_manifest() {
        let gate = DefaultReferenceReadinessGate;
        assert!(gate.check(None, false).is_ok());
    }

    #[test]
    fn check_requires_manifest_in_strict_mode() {
        let gate = DefaultReferenceReadinessGate;
        assert!(gate.check(None, true).is_err());
    }

    #[test]
    fn validate_report_accepts_passed_true() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, r#"{"passed": true}"#).unwrap();
        let gate = DefaultReferenceReadinessGate;
        assert!(gate.validate_report(&path).is_ok());
    }

    #[test]
    fn validate_report_rejects_passed_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, r#"{"passed": false}"#).unwrap();
        let gate = DefaultReferenceReadinessGate;
        assert!(gate.validate_report(&path).is_err());
    }
}
