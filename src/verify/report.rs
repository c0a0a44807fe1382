//! Verification findings and their rendering

use crate::vrf::Capability;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Findings for one VRF
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VrfReport {
    pub name: String,
    pub table_id: Option<u32>,
    pub findings: Vec<Finding>,
}

impl VrfReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_id: None,
            findings: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.findings.push(Finding::error(message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.findings.push(Finding::warning(message));
    }

    pub fn passed(&self) -> bool {
        !self.findings.iter().any(Finding::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }
}

/// Result of one verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub capability: Option<Capability>,
    pub vrfs: Vec<VrfReport>,
    pub global: Vec<Finding>,
}

impl Report {
    pub fn new(capability: Option<Capability>) -> Self {
        Self {
            capability,
            vrfs: Vec::new(),
            global: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.vrfs.iter().all(VrfReport::passed) && !self.global.iter().any(Finding::is_error)
    }

    pub fn vrf(&self, name: &str) -> Option<&VrfReport> {
        self.vrfs.iter().find(|vrf| vrf.name == name)
    }

    pub fn global_errors(&self) -> impl Iterator<Item = &Finding> {
        self.global.iter().filter(|f| f.is_error())
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();

        for vrf in &self.vrfs {
            match vrf.table_id {
                Some(id) => {
                    let _ = writeln!(out, "VRF {} (table {})", vrf.name, id);
                }
                None => {
                    let _ = writeln!(out, "VRF {}", vrf.name);
                }
            }
            if vrf.findings.is_empty() {
                let _ = writeln!(out, "    OK");
            }
            for finding in &vrf.findings {
                let _ = writeln!(out, "    {}", line(finding));
            }
        }

        for finding in &self.global {
            let _ = writeln!(out, "{}", line(finding));
        }

        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        let _ = writeln!(out, "Verification {}", verdict);
        out
    }
}

fn line(finding: &Finding) -> String {
    match finding.severity {
        Severity::Error => format!("ERROR: {}", finding.message),
        Severity::Warning => format!("WARNING: {}", finding.message),
    }
}
