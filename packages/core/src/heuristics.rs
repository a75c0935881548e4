//! Removability heuristics for the primary external store.
//!
//! Platforms only ever report one "external storage" directory, and older
//! generations cannot even say whether it is a real card. The rules here
//! settle the primary store's `removable` flag once per rescan, in a fixed
//! order:
//!
//! 1. the platform's direct query, when the generation has one;
//! 2. otherwise `false` (assume soldered storage);
//! 3. "force non-removable" corrections collected from the mount table;
//! 4. if a distinct secondary volume exists, the primary is built in.
//!
//! This is a best-effort guess. Misclassification on unseen hardware is
//! expected and is not an error.

use serde::Serialize;

/// Why the mount table asked for the primary store to be non-removable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionReason {
    /// The primary's own `dev_mount` line carries a `*nonremovable*` flag.
    NonremovableFlag,
    /// `discard = disable` appeared before the primary's entry.
    DiscardDisabled,
}

/// A refinement of the primary record emitted while parsing.
///
/// Corrections can only downgrade removable to non-removable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Correction {
    ForceNonRemovable(CorrectionReason),
}

/// Inputs to the removability decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovableEvidence<'a> {
    /// Answer of the platform's direct query, `None` if unsupported.
    pub platform_reported: Option<bool>,
    pub corrections: &'a [Correction],
    /// At least one secondary candidate survived deduplication.
    pub secondary_found: bool,
}

/// Applies the precedence rules and returns the final flag.
pub fn resolve_primary_removable(evidence: &RemovableEvidence<'_>) -> bool {
    let mut removable = evidence.platform_reported.unwrap_or(false);

    for correction in evidence.corrections {
        match correction {
            Correction::ForceNonRemovable(reason) => {
                if removable {
                    tracing::warn!(
                        "primary external storage forced non-removable ({:?})",
                        reason
                    );
                }
                removable = false;
            }
        }
    }

    if evidence.secondary_found {
        if removable {
            tracing::warn!("primary external storage forced non-removable (secondary volume found)");
        }
        removable = false;
    }

    removable
}
