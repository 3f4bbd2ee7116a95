//! Report aggregation.
//!
//! Sections are built from parser output and rule findings without
//! recomputing or filtering anything; a report keeps sections in the order
//! they were pushed.

use crate::fields::{ParsedCertificate, ParsedCsr, ParsedKey, ParsedPfxBundle};
use crate::rules::HygieneFinding;
use crate::verify::VerificationResult;
use serde::Serialize;

/// What a section describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Summary {
    Certificate {
        certificate: ParsedCertificate,
        verification: VerificationResult,
    },
    Key {
        key: ParsedKey,
    },
    Csr {
        csr: ParsedCsr,
    },
    Pfx {
        bundle: ParsedPfxBundle,
    },
}

impl Summary {
    pub fn kind(&self) -> &'static str {
        match self {
            Summary::Certificate { .. } => "certificate",
            Summary::Key { .. } => "private key",
            Summary::Csr { .. } => "certificate request",
            Summary::Pfx { .. } => "PKCS#12 bundle",
        }
    }
}

/// One inspected artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    /// Label of the artifact, usually its path plus a position in the file.
    pub artifact: String,
    pub summary: Summary,
    /// Findings in discovery order.
    pub findings: Vec<HygieneFinding>,
    /// Set when a passphrase-dependent part of the artifact could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ReportSection {
    pub fn with_failure(mut self, failure: impl Into<String>) -> Self {
        self.failure = Some(failure.into());
        self
    }
}

/// Assemble a section. Findings are stored exactly as given.
pub fn build_section(
    artifact: impl Into<String>,
    summary: Summary,
    findings: Vec<HygieneFinding>,
) -> ReportSection {
    ReportSection {
        artifact: artifact.into(),
        summary,
        findings,
        failure: None,
    }
}

/// An ordered collection of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    /// Append every section of `other`, keeping its order.
    pub fn append(&mut self, other: Report) {
        self.sections.extend(other.sections);
    }

    pub fn has_failures(&self) -> bool {
        self.sections.iter().any(|s| s.failure.is_some())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
