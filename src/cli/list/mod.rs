//! List command - prints experiments with their variants

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only unfinished experiments
    #[arg(short, long)]
    pub active: bool,
}

pub async fn run(args: ListArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let store = super::open_store(&config.storage).await?;

    let experiments = if args.active {
        store.list_active().await?
    } else {
        store.list().await?
    };

    super::print_json(&experiments)
}
