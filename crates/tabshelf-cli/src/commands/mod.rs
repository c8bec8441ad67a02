pub mod demo;
pub mod status;
pub mod tab;

use tabshelf_storage::SeedOutcome;

/// One-line human rendering of a seeding result
pub fn describe_seed(outcome: &SeedOutcome) -> String {
    match outcome {
        SeedOutcome::Skipped => "skipped".to_string(),
        SeedOutcome::Succeeded { tab_id } => format!("added demo tab {tab_id}"),
        SeedOutcome::PartiallyFailed {
            tab_id: Some(id),
            stage,
            reason,
        } => format!("failed at {stage} (tab {id}): {reason}"),
        SeedOutcome::PartiallyFailed {
            tab_id: None,
            stage,
            reason,
        } => format!("failed at {stage}: {reason}"),
    }
}
