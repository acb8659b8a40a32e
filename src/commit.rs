//! The commit-message protocol (C6, spec §4.6).
//!
//! `parse` is a single-pass line-anchored lexer — it walks the message
//! once, classifying each line by position and prefix, rather than
//! matching the whole body against a multi-line regex. This mirrors the
//! teacher's preference for small explicit state in its parsers (e.g.
//! `config/frontmatter.rs` scanning line-by-line) over one large pattern.

use crate::error::FtError;
use crate::ssot::schema::{GateResult, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub feat_id: String,
    pub task_id: String,
    pub summary: String,
    pub plan: String,
    pub check: String,
    pub learn: String,
    pub gate_result: GateResult,
    pub task_status: TaskStatus,
}

impl CommitMessage {
    /// Build the commit message for finishing `task_id` of `feat_id`.
    pub fn generate(
        feat_id: &str,
        task_id: &str,
        summary: &str,
        plan: &str,
        check: &str,
        learn: &str,
        gate_result: GateResult,
        task_status: TaskStatus,
    ) -> Result<Self, FtError> {
        let msg = CommitMessage {
            feat_id: feat_id.to_string(),
            task_id: task_id.to_string(),
            summary: summary.to_string(),
            plan: plan.to_string(),
            check: check.to_string(),
            learn: learn.to_string(),
            gate_result,
            task_status,
        };
        msg.validate_cross_field()?;
        Ok(msg)
    }

    fn validate_cross_field(&self) -> Result<(), FtError> {
        if self.task_status == TaskStatus::Done && self.gate_result != GateResult::Pass {
            return Err(FtError::InvalidCommit {
                reason: "Task-Status: done requires Gate-Result: pass".to_string(),
            });
        }
        if self.plan.trim().is_empty() || self.check.trim().is_empty() || self.learn.trim().is_empty()
        {
            return Err(FtError::InvalidCommit {
                reason: "Plan/Check/Learn sections must each have non-empty content".to_string(),
            });
        }
        let task_status_ok = matches!(self.task_status, TaskStatus::Done | TaskStatus::Blocked);
        if !task_status_ok {
            return Err(FtError::InvalidCommit {
                reason: format!(
                    "Task-Status must be done or blocked in a commit trailer, got {}",
                    self.task_status
                ),
            });
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        format!(
            "feat({}): task({}) {}\n\nPlan:\n{}\n\nCheck:\n{}\n\nLearn:\n{}\n\nFeat-ID: {}\nTask-ID: {}\nGate-Result: {}\nTask-Status: {}\n",
            self.feat_id,
            self.task_id,
            self.summary,
            self.plan.trim(),
            self.check.trim(),
            self.learn.trim(),
            self.feat_id,
            self.task_id,
            self.gate_result,
            self.task_status,
        )
    }

    /// Single-pass line-anchored parse of a rendered commit message.
    pub fn parse(text: &str) -> Result<Self, FtError> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Err(FtError::InvalidCommit {
                reason: "commit message is empty".to_string(),
            });
        }

        let subject = lines[0];
        let (feat_id, task_id, summary) = parse_subject(subject)?;

        #[derive(PartialEq)]
        enum Section {
            None,
            Plan,
            Check,
            Learn,
        }

        let mut section = Section::None;
        let mut plan = String::new();
        let mut check = String::new();
        let mut learn = String::new();
        let mut seen = (false, false, false); // plan, check, learn
        let mut trailers = std::collections::HashMap::new();

        for line in &lines[1..] {
            let trimmed = *line;
            if trimmed == "Plan:" {
                section = Section::Plan;
                seen.0 = true;
                continue;
            }
            if trimmed == "Check:" {
                section = Section::Check;
                seen.1 = true;
                continue;
            }
            if trimmed == "Learn:" {
                section = Section::Learn;
                seen.2 = true;
                continue;
            }
            if let Some((key, value)) = trimmed.split_once(": ") {
                if matches!(
                    key,
                    "Feat-ID" | "Task-ID" | "Gate-Result" | "Task-Status"
                ) {
                    trailers.insert(key.to_string(), value.trim().to_string());
                    section = Section::None;
                    continue;
                }
            }
            match section {
                Section::Plan if !trimmed.is_empty() => {
                    if !plan.is_empty() {
                        plan.push('\n');
                    }
                    plan.push_str(trimmed);
                }
                Section::Check if !trimmed.is_empty() => {
                    if !check.is_empty() {
                        check.push('\n');
                    }
                    check.push_str(trimmed);
                }
                Section::Learn if !trimmed.is_empty() => {
                    if !learn.is_empty() {
                        learn.push('\n');
                    }
                    learn.push_str(trimmed);
                }
                _ => {}
            }
        }

        if !(seen.0 && seen.1 && seen.2) {
            return Err(FtError::InvalidCommit {
                reason: "commit message is missing a Plan:/Check:/Learn: section".to_string(),
            });
        }
        if plan.is_empty() || check.is_empty() || learn.is_empty() {
            return Err(FtError::InvalidCommit {
                reason: "Plan/Check/Learn sections must each have non-empty content".to_string(),
            });
        }

        let trailer_feat_id = trailers.get("Feat-ID").ok_or_else(|| FtError::InvalidCommit {
            reason: "missing Feat-ID trailer".to_string(),
        })?;
        let trailer_task_id = trailers.get("Task-ID").ok_or_else(|| FtError::InvalidCommit {
            reason: "missing Task-ID trailer".to_string(),
        })?;
        if trailer_feat_id != &feat_id {
            return Err(FtError::TrailerMismatch {
                expected: feat_id,
                found: trailer_feat_id.clone(),
            });
        }
        if trailer_task_id != &task_id {
            return Err(FtError::TrailerMismatch {
                expected: task_id,
                found: trailer_task_id.clone(),
            });
        }

        let gate_result = match trailers.get("Gate-Result").map(String::as_str) {
            Some("pass") => GateResult::Pass,
            Some("fail") => GateResult::Fail,
            Some(other) => {
                return Err(FtError::InvalidCommit {
                    reason: format!("Gate-Result trailer has unknown value `{other}`"),
                });
            }
            None => {
                return Err(FtError::InvalidCommit {
                    reason: "missing Gate-Result trailer".to_string(),
                });
            }
        };
        let task_status = match trailers.get("Task-Status").map(String::as_str) {
            Some("done") => TaskStatus::Done,
            Some("blocked") => TaskStatus::Blocked,
            Some(other) => {
                return Err(FtError::InvalidCommit {
                    reason: format!("Task-Status trailer has unknown value `{other}`"),
                });
            }
            None => {
                return Err(FtError::InvalidCommit {
                    reason: "missing Task-Status trailer".to_string(),
                });
            }
        };

        let msg = CommitMessage {
            feat_id,
            task_id,
            summary,
            plan,
            check,
            learn,
            gate_result,
            task_status,
        };
        msg.validate_cross_field()?;
        Ok(msg)
    }
}

fn parse_subject(subject: &str) -> Result<(String, String, String), FtError> {
    let rest = subject.strip_prefix("feat(").ok_or_else(|| FtError::InvalidCommit {
        reason: format!("subject line does not match `feat(F-...): task(T-...) ...`: {subject}"),
    })?;
    let (feat_id, rest) = rest.split_once("): task(").ok_or_else(|| FtError::InvalidCommit {
        reason: format!("subject line does not match `feat(F-...): task(T-...) ...`: {subject}"),
    })?;
    let (task_id, rest) = rest.split_once(") ").ok_or_else(|| FtError::InvalidCommit {
        reason: format!("subject line does not match `feat(F-...): task(T-...) ...`: {subject}"),
    })?;
    if !feat_id.starts_with("F-") || feat_id.len() < 3 {
        return Err(FtError::InvalidCommit {
            reason: format!("feat id `{feat_id}` does not look like F-<slug>-<n>"),
        });
    }
    if !task_id.starts_with('T') || parse_task_number_strict(task_id).is_none() {
        return Err(FtError::InvalidCommit {
            reason: format!("task id `{task_id}` does not look like T-NNN"),
        });
    }
    if rest.trim().is_empty() {
        return Err(FtError::InvalidCommit {
            reason: "subject line is missing a summary".to_string(),
        });
    }
    Ok((feat_id.to_string(), task_id.to_string(), rest.to_string()))
}

fn parse_task_number_strict(task_id: &str) -> Option<u32> {
    let digits = task_id.strip_prefix("T-")?;
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> CommitMessage {
        CommitMessage::generate(
            "F-demo-001",
            "T-001",
            "wire up the thing",
            "do the plan",
            "ran the checks",
            "learned something",
            GateResult::Pass,
            TaskStatus::Done,
        )
        .unwrap()
    }

    #[test]
    fn render_then_parse_round_trips() {
        let msg = sample();
        let rendered = msg.render();
        let parsed = CommitMessage::parse(&rendered).unwrap();
        assert_eq!(msg, parsed);
    }

    #[test]
    fn done_without_pass_is_rejected() {
        let err = CommitMessage::generate(
            "F-demo-001",
            "T-001",
            "wire up the thing",
            "plan",
            "check",
            "learn",
            GateResult::Fail,
            TaskStatus::Done,
        )
        .unwrap_err();
        assert!(matches!(err, FtError::InvalidCommit { .. }));
    }

    #[test]
    fn trailer_mismatch_is_detected() {
        let msg = sample();
        let rendered = msg.render().replace("Task-ID: T-001", "Task-ID: T-002");
        let err = CommitMessage::parse(&rendered).unwrap_err();
        assert!(matches!(err, FtError::TrailerMismatch { .. }));
    }

    #[test]
    fn malformed_subject_is_rejected() {
        let err = CommitMessage::parse("not even close to the shape\n").unwrap_err();
        assert!(matches!(err, FtError::InvalidCommit { .. }));
    }

    #[test]
    fn missing_section_is_rejected() {
        let rendered = sample().render();
        let without_learn = rendered.replace("Learn:\nlearned something\n\n", "");
        let err = CommitMessage::parse(&without_learn).unwrap_err();
        assert!(matches!(err, FtError::InvalidCommit { .. }));
    }

    #[rstest]
    #[case("feat(F-demo-001) task(T-001) missing colon")]
    #[case("feat(F-demo-001: task(T-001) broken paren")]
    #[case("feat(F-demo-001): task(T1) bad task id")]
    #[case("feat(demo-001): task(T-001) feat id missing F- prefix")]
    #[case("feat(F-demo-001): task(T-001)")]
    fn malformed_subjects_are_rejected(#[case] subject: &str) {
        let err = CommitMessage::parse(subject).unwrap_err();
        assert!(matches!(err, FtError::InvalidCommit { .. }));
    }

    #[rstest]
    #[case(GateResult::Pass, TaskStatus::Done, true)]
    #[case(GateResult::Fail, TaskStatus::Done, false)]
    #[case(GateResult::Unknown, TaskStatus::Done, false)]
    #[case(GateResult::Fail, TaskStatus::Blocked, true)]
    #[case(GateResult::Pass, TaskStatus::Blocked, true)]
    fn cross_field_rule_matches_spec_table(
        #[case] gate_result: GateResult,
        #[case] task_status: TaskStatus,
        #[case] should_succeed: bool,
    ) {
        let result = CommitMessage::generate(
            "F-demo-001",
            "T-001",
            "summary",
            "plan",
            "check",
            "learn",
            gate_result,
            task_status,
        );
        assert_eq!(result.is_ok(), should_succeed);
    }
}
