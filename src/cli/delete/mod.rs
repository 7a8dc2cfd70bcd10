//! Delete command - removes an unfinished experiment and its variants

use super::ExperimentArgs;

pub async fn run(args: ExperimentArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let store = super::open_store(&config.storage).await?;

    let experiment = super::find_experiment(store.as_ref(), &args.name).await?;
    store.delete(&experiment.id()).await?;

    super::print_json(&experiment)
}
