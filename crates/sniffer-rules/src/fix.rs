//! Fix convergence loop
//!
//! A fix run alternates between tokenizing the current text, running every
//! sniff with a fixer attached and materializing the proposed edits into new
//! text, until a pass proposes nothing or the pass cap is reached.

use std::collections::HashSet;

use serde::Serialize;
use sniffer_core::{Fixer, TokenStore, Tokenize};
use xxhash_rust::xxh3::xxh3_64;

use crate::logging::{self, RunEvent};
use crate::registry::{SniffFailure, SniffRegistry};
use crate::sink::Diagnostic;
use crate::sniff::FileIdentity;

/// Default cap on fix passes
pub const DEFAULT_MAX_PASSES: usize = 50;

/// How a fix run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    /// A pass proposed no edits
    Converged,
    /// The pass cap was hit while sniffs were still proposing edits
    CapReached,
    /// A pass reproduced the text of an earlier pass
    Oscillating,
    /// Proposed edits could not be applied; the last good text is kept
    Aborted,
}

impl FixStatus {
    pub fn is_converged(self) -> bool {
        self == FixStatus::Converged
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixStatus::Converged => write!(f, "converged"),
            FixStatus::CapReached => write!(f, "cap reached"),
            FixStatus::Oscillating => write!(f, "oscillating"),
            FixStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of a fix run over one file
#[derive(Debug, Clone, Serialize)]
pub struct FixReport {
    /// Fixed text
    #[serde(skip)]
    pub source: String,
    pub status: FixStatus,
    /// Sniff passes run, excluding the final check
    pub passes: usize,
    /// Edits applied across all passes
    pub edits_applied: usize,
    /// Replacements rejected because another sniff replaced the token first
    pub conflicts: usize,
    /// Diagnostics of a check pass over the fixed text
    pub remaining: Vec<Diagnostic>,
    pub failures: Vec<SniffFailure>,
}

impl FixReport {
    pub fn remaining_count(&self) -> usize {
        self.remaining.len()
    }

    pub fn changed(&self, original: &str) -> bool {
        self.source != original
    }
}

enum FixState {
    Tokenize(String),
    RunSniffs(String, TokenStore),
    Materialize(String, TokenStore, Fixer),
    Done(FixStatus, String),
}

/// Fix `source` until it converges or `max_passes` passes have run
pub fn fix(
    registry: &mut SniffRegistry,
    file: &FileIdentity,
    source: &str,
    tokenizer: &dyn Tokenize,
    max_passes: usize,
) -> FixReport {
    let mut identity = file.clone();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut passes = 0;
    let mut edits_applied = 0;
    let mut conflicts = 0;
    let mut failures = Vec::new();

    let mut state = FixState::Tokenize(source.to_string());
    let (status, text) = loop {
        state = match state {
            FixState::Tokenize(text) => {
                if !seen.insert(xxh3_64(text.as_bytes())) {
                    FixState::Done(FixStatus::Oscillating, text)
                } else if passes >= max_passes {
                    FixState::Done(FixStatus::CapReached, text)
                } else {
                    passes += 1;
                    logging::record(RunEvent::PassStarted { path: file.path(), pass: passes });
                    let store = TokenStore::tokenize(tokenizer, &text);
                    FixState::RunSniffs(text, store)
                }
            }
            FixState::RunSniffs(text, store) => {
                let mut fixer = Fixer::new();
                let report = registry.run_pass(&store, &identity, Some(&mut fixer));
                identity = identity.next_revision();
                failures.extend(report.failures);
                conflicts += fixer.conflicts();

                if fixer.is_empty() {
                    FixState::Done(FixStatus::Converged, text)
                } else {
                    FixState::Materialize(text, store, fixer)
                }
            }
            FixState::Materialize(text, store, fixer) => match fixer.materialize(&store) {
                Ok(fixed) if fixed == text => FixState::Done(FixStatus::Converged, text),
                Ok(fixed) => {
                    edits_applied += fixer.edit_count();
                    FixState::Tokenize(fixed)
                }
                Err(error) => {
                    logging::record(RunEvent::EditsRejected {
                        path: file.path(),
                        error: error.to_string(),
                    });
                    FixState::Done(FixStatus::Aborted, text)
                }
            },
            FixState::Done(status, text) => break (status, text),
        };
    };

    let store = TokenStore::tokenize(tokenizer, &text);
    let check = registry.run_pass(&store, &identity, None);
    failures.extend(check.failures);

    logging::record(RunEvent::FixFinished {
        path: file.path(),
        status,
        passes,
        remaining: check.diagnostics.len(),
    });

    FixReport {
        source: text,
        status,
        passes,
        edits_applied,
        conflicts,
        remaining: check.diagnostics,
        failures,
    }
}
