//! Non-fatal planning diagnostics
//!
//! Warnings never abort a cycle; they are collected in a [`DiagnosticsSink`]
//! owned by the cycle and handed back next to the plan.

use serde::Serialize;
use std::fmt;

use crate::topology::graph::{EdgeKey, NodeId};

/// A condition the planner worked around
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// Only one side reported the link; it cannot be used
    OneSidedLink { source: NodeId, dest: NodeId },
    /// Two radios of the same device see each other
    SameDeviceObservation {
        source: NodeId,
        dest: NodeId,
        device: NodeId,
    },
    /// An observation names a radio missing from the inventory
    UnknownRadio { source: NodeId, dest: NodeId },
    /// An observation exceeded the configured maximum age
    StaleObservation {
        source: NodeId,
        dest: NodeId,
        age_secs: u64,
    },
    /// A foreign sighting names a radio missing from the inventory
    UnknownSightingRadio { module: NodeId },
    /// No crossing link exists to back up this link
    BackupNotFound { link: EdgeKey },
}

impl Diagnostic {
    /// Short machine-friendly name
    pub fn code(&self) -> &'static str {
        match self {
            Self::OneSidedLink { .. } => "one_sided_link",
            Self::SameDeviceObservation { .. } => "same_device_observation",
            Self::UnknownRadio { .. } => "unknown_radio",
            Self::StaleObservation { .. } => "stale_observation",
            Self::UnknownSightingRadio { .. } => "unknown_sighting_radio",
            Self::BackupNotFound { .. } => "backup_not_found",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneSidedLink { source, dest } => {
                write!(f, "ignoring one-sided link {} -> {}", source, dest)
            }
            Self::SameDeviceObservation {
                source,
                dest,
                device,
            } => write!(
                f,
                "ignoring link {} -> {}: both radios belong to {}",
                source, dest, device
            ),
            Self::UnknownRadio { source, dest } => write!(
                f,
                "ignoring link {} -> {}: radio not in the active inventory",
                source, dest
            ),
            Self::StaleObservation {
                source,
                dest,
                age_secs,
            } => write!(
                f,
                "ignoring link {} -> {}: observation is {}s old",
                source, dest, age_secs
            ),
            Self::UnknownSightingRadio { module } => write!(
                f,
                "ignoring foreign sighting on {}: radio not in the active inventory",
                module
            ),
            Self::BackupNotFound { link } => write!(f, "no backup link found for {}", link),
        }
    }
}

/// Collector for the diagnostics of one planning cycle
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(code = diagnostic.code(), "{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Links left without a backup
    pub fn backup_gaps(&self) -> impl Iterator<Item = &EdgeKey> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::BackupNotFound { link } => Some(link),
            _ => None,
        })
    }
}
