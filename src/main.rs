use abexp::cli::{self, Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate => cli::migrate::run().await,
        Command::Create(args) => cli::create::run(args).await,
        Command::List(args) => cli::list::run(args).await,
        Command::Finish(args) => cli::finish::run(args).await,
        Command::Rebalance(args) => cli::rebalance::run(args).await,
        Command::Delete(args) => cli::delete::run(args).await,
        Command::Assign(args) => cli::assign::run(args).await,
    }
}
