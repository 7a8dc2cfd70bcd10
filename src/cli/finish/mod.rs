//! Finish command - stops an experiment from serving assignments

use super::ExperimentArgs;

pub async fn run(args: ExperimentArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let store = super::open_store(&config.storage).await?;

    let experiment = super::find_experiment(store.as_ref(), &args.name).await?;
    let finished = store.finish(&experiment.id()).await?;

    super::print_json(&finished)
}
