//! Assign command - buckets a participant and prints the result as JSON

use clap::Args;

use crate::infrastructure::services::AssignmentEngine;

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    /// Experiment name; omit to assign across every active experiment
    #[arg(short, long)]
    pub experiment: Option<String>,

    /// Participant identity (user, device or session id)
    #[arg(short, long)]
    pub participant: String,
}

/// Resolve the assignment against the configured store
pub async fn run(args: AssignArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let store = super::open_store(&config.storage).await?;
    let engine = AssignmentEngine::new(store);

    match args.experiment {
        Some(experiment) => {
            let assignment = engine.assign(&experiment, &args.participant).await?;
            super::print_json(&assignment)
        }
        None => {
            let assignments = engine.assign_all(&args.participant).await?;
            super::print_json(&assignments)
        }
    }
}
