//! Build Report
//!
//! Human-facing record of everything a build corrected or gave up on,
//! bucketed by audience (the service a resource belongs to) and by phase.
//!
//! ```text
//! reports/
//! ├── AWS_S3.txt
//! ├── AWS_EC2.txt
//! └── ALL.txt        # subjects without a service
//! ```

use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ModelError;
use crate::patch::PatchReport;

/// Audience for subjects that do not name a service
pub const ALL_AUDIENCE: &str = "ALL";

/// Pipeline phase an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Loading,
    Patching,
    Interpreting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Loading => write!(f, "Loading"),
            Phase::Patching => write!(f, "Patching"),
            Phase::Interpreting => write!(f, "Interpreting"),
        }
    }
}

/// What an entry records
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryKind {
    Failure { path: Option<String>, message: String },
    Patch(PatchReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub phase: Phase,
    pub subject: String,
    pub kind: EntryKind,
}

/// Service bucket of a subject: `Org::Service::Thing` becomes `Org_Service`
pub fn audience_of(subject: &str) -> String {
    let parts: Vec<&str> = subject.split("::").collect();
    match parts.as_slice() {
        [org, service, _, ..] if !org.is_empty() && !service.is_empty() => format!("{}_{}", org, service),
        _ => ALL_AUDIENCE.to_string(),
    }
}

/// Accumulated report of one build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    entries: Vec<ReportEntry>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_failure(&mut self, phase: Phase, subject: &str, path: Option<&str>, message: impl Into<String>) {
        self.entries.push(ReportEntry {
            phase,
            subject: subject.to_string(),
            kind: EntryKind::Failure {
                path: path.map(str::to_string),
                message: message.into(),
            },
        });
    }

    pub fn add_patch(&mut self, report: PatchReport) {
        self.entries.push(ReportEntry {
            phase: Phase::Patching,
            subject: report.subject.clone(),
            kind: EntryKind::Patch(report),
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> + '_ {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Failure { .. }))
    }

    pub fn patches(&self) -> impl Iterator<Item = &PatchReport> + '_ {
        self.entries.iter().filter_map(|e| match &e.kind {
            EntryKind::Patch(report) => Some(report),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries grouped by audience, in insertion order within each audience
    pub fn by_audience(&self) -> BTreeMap<String, Vec<&ReportEntry>> {
        let mut out: BTreeMap<String, Vec<&ReportEntry>> = BTreeMap::new();
        for entry in &self.entries {
            out.entry(audience_of(&entry.subject)).or_default().push(entry);
        }
        out
    }

    /// Text report for one audience, partitioned by phase
    pub fn render_audience(&self, audience: &str) -> String {
        let grouped = self.by_audience();
        let entries = grouped.get(audience).map(Vec::as_slice).unwrap_or_default();

        let mut out = format!("Build report for {}\n", audience);
        for phase in [Phase::Loading, Phase::Patching, Phase::Interpreting] {
            let in_phase: Vec<&&ReportEntry> = entries.iter().filter(|e| e.phase == phase).collect();
            if in_phase.is_empty() {
                continue;
            }
            out.push_str(&format!("\n== {} ({}) ==\n", phase, in_phase.len()));
            for entry in in_phase {
                out.push_str(&render_entry(entry));
            }
        }
        out
    }

    /// Write one `<audience>.txt` per audience into `dir`
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, ModelError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for audience in self.by_audience().keys() {
            let path = dir.join(format!("{}.txt", audience));
            fs::write(&path, self.render_audience(audience))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn render_entry(entry: &ReportEntry) -> String {
    match &entry.kind {
        EntryKind::Failure { path: Some(path), message } => {
            format!("- {} {}: {}\n", entry.subject, path, message)
        }
        EntryKind::Failure { path: None, message } => format!("- {}: {}\n", entry.subject, message),
        EntryKind::Patch(report) => {
            let location = if report.path.is_empty() { "/" } else { report.path.as_str() };
            format!(
                "- {} {}: {}\n{}",
                entry.subject,
                location,
                report.reason,
                render_change(report)
            )
        }
    }
}

/// Unified diff of the pretty-printed value before and after a patch
fn render_change(report: &PatchReport) -> String {
    let before = pretty(&report.old_value);
    let after = report.new_value.as_ref().map(pretty).unwrap_or_default();
    TextDiff::from_lines(&before, &after)
        .unified_diff()
        .context_radius(2)
        .header("before", "after")
        .to_string()
}

fn pretty(value: &serde_json::Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;
    use serde_json::json;

    fn sample_patch(subject: &str) -> PatchReport {
        PatchReport {
            subject: subject.to_string(),
            path: "".into(),
            patch: Patch::Remove { path: "/required".into() },
            reason: "empty required list".into(),
            old_value: json!({"type": "object", "required": []}),
            new_value: Some(json!({"type": "object"})),
        }
    }

    #[test]
    fn test_audience_of() {
        assert_eq!(audience_of("AWS::S3::Bucket"), "AWS_S3");
        assert_eq!(audience_of("AWS::S3"), ALL_AUDIENCE);
        assert_eq!(audience_of("bucket"), ALL_AUDIENCE);
    }

    #[test]
    fn test_render_groups_by_phase() {
        let mut report = BuildReport::new();
        report.add_failure(Phase::Interpreting, "AWS::S3::Bucket", Some("Broken"), "Reference #/x does not resolve");
        report.add_patch(sample_patch("AWS::S3::Bucket"));
        report.add_failure(Phase::Loading, "AWS::EC2::Instance", None, "invalid JSON");

        let text = report.render_audience("AWS_S3");
        let patching = text.find("== Patching (1) ==").unwrap();
        let interpreting = text.find("== Interpreting (1) ==").unwrap();
        assert!(patching < interpreting);
        assert!(text.contains("- AWS::S3::Bucket Broken: Reference #/x does not resolve"));
        assert!(text.contains("-  \"required\": []"));
        assert!(!text.contains("invalid JSON"));
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.patches().count(), 1);
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = BuildReport::new();
        report.add_patch(sample_patch("AWS::S3::Bucket"));
        report.add_failure(Phase::Loading, "broken.json", None, "unreadable");

        let written = report.write_to_dir(dir.path()).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["ALL.txt", "AWS_S3.txt"]);
        let all = fs::read_to_string(dir.path().join("ALL.txt")).unwrap();
        assert!(all.contains("broken.json: unreadable"));
    }
}
