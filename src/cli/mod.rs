//! CLI module for the abexp operator tool
//!
//! Provides subcommands:
//! - `migrate`: create the experiment tables in the configured store
//! - `create`, `list`, `finish`, `rebalance`, `delete`: manage experiments
//! - `assign`: bucket a participant and print the assignment as JSON
//!
//! Every command except `migrate` needs a persistent backend; the in-memory
//! store would be empty on each invocation.

pub mod assign;
pub mod create;
pub mod delete;
pub mod finish;
pub mod list;
pub mod migrate;
pub mod rebalance;

use std::io::Write;
use std::sync::Arc;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::{AppConfig, StorageSettings};
use crate::domain::{DomainError, Experiment, ExperimentName, ExperimentStore};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{StorageFactory, StorageType};

/// abexp - deterministic experiment assignment
#[derive(Parser)]
#[command(name = "abexp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ensure the experiment schema exists
    Migrate,

    /// Create an experiment with its weighted variants
    Create(create::CreateArgs),

    /// List experiments, oldest first
    List(list::ListArgs),

    /// Finish an experiment; it stops serving assignments
    Finish(ExperimentArgs),

    /// Replace the weights of every variant of an experiment
    Rebalance(rebalance::RebalanceArgs),

    /// Delete an unfinished experiment and its variants
    Delete(ExperimentArgs),

    /// Assign a participant to an experiment variant
    Assign(assign::AssignArgs),
}

/// Selects one experiment by name
#[derive(Args, Debug, Clone)]
pub struct ExperimentArgs {
    /// Experiment name
    #[arg(short, long)]
    pub name: String,
}

/// Load environment, configuration and logging shared by every command
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    Ok(config)
}

/// Open the configured store, refusing backends whose state dies with the process
pub(crate) async fn open_store(
    settings: &StorageSettings,
) -> anyhow::Result<Arc<dyn ExperimentStore>> {
    if settings.backend == StorageType::Memory {
        bail!(
            "the in-memory store does not persist between commands; \
             set storage.backend = \"postgres\" (APP__STORAGE__BACKEND=postgres)"
        );
    }

    Ok(StorageFactory::create(&settings.to_storage_config()).await?)
}

/// Look up an experiment by name or fail with `NotFound`
pub(crate) async fn find_experiment(
    store: &dyn ExperimentStore,
    name: &str,
) -> Result<Experiment, DomainError> {
    let name = ExperimentName::new(name)?;

    store
        .get_by_name(&name)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", name)))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateExperimentRequest, NewVariant, VariantData};
    use crate::infrastructure::experiment::InMemoryExperimentStore;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_parse_assign() {
        let command = parse(&[
            "abexp",
            "assign",
            "--experiment",
            "checkout",
            "--participant",
            "user42",
        ]);

        match command {
            Command::Assign(args) => {
                assert_eq!(args.experiment.as_deref(), Some("checkout"));
                assert_eq!(args.participant, "user42");
            }
            _ => panic!("Expected assign command"),
        }
    }

    #[test]
    fn test_parse_assign_all() {
        let command = parse(&["abexp", "assign", "--participant", "user42"]);

        assert!(matches!(
            command,
            Command::Assign(assign::AssignArgs { experiment: None, .. })
        ));
    }

    #[test]
    fn test_assign_requires_participant() {
        let result = Cli::try_parse_from(["abexp", "assign", "--experiment", "checkout"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_migrate() {
        assert!(matches!(parse(&["abexp", "migrate"]), Command::Migrate));
    }

    #[test]
    fn test_parse_create() {
        let command = parse(&[
            "abexp",
            "create",
            "--name",
            "checkout",
            "--variant",
            "green=0.3",
            "-v",
            "{\"color\":\"red\"}=0.7",
        ]);

        match command {
            Command::Create(args) => {
                assert_eq!(args.name, "checkout");
                assert_eq!(args.variants.len(), 2);
                assert_eq!(args.variants[0].data, "green");
                assert_eq!(args.variants[1].data, "{\"color\":\"red\"}");
                assert_eq!(args.variants[1].weight, 0.7);
            }
            _ => panic!("Expected create command"),
        }
    }

    #[test]
    fn test_create_requires_variants() {
        let result = Cli::try_parse_from(["abexp", "create", "--name", "checkout"]);
        assert!(result.is_err());

        let result =
            Cli::try_parse_from(["abexp", "create", "--name", "checkout", "--variant", "green"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_finish_and_delete() {
        match parse(&["abexp", "finish", "--name", "checkout"]) {
            Command::Finish(args) => assert_eq!(args.name, "checkout"),
            _ => panic!("Expected finish command"),
        }

        match parse(&["abexp", "delete", "-n", "checkout"]) {
            Command::Delete(args) => assert_eq!(args.name, "checkout"),
            _ => panic!("Expected delete command"),
        }
    }

    #[test]
    fn test_parse_rebalance() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let command = parse(&[
            "abexp",
            "rebalance",
            "--name",
            "checkout",
            "--weight",
            &format!("{}=1.0", id),
        ]);

        match command {
            Command::Rebalance(args) => {
                assert_eq!(args.weights.len(), 1);
                assert_eq!(args.weights[0].0.to_string(), id);
                assert_eq!(args.weights[0].1, 1.0);
            }
            _ => panic!("Expected rebalance command"),
        }

        let result = Cli::try_parse_from([
            "abexp",
            "rebalance",
            "--name",
            "checkout",
            "--weight",
            "not-a-uuid=1.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list() {
        match parse(&["abexp", "list", "--active"]) {
            Command::List(args) => assert!(args.active),
            _ => panic!("Expected list command"),
        }

        match parse(&["abexp", "list"]) {
            Command::List(args) => assert!(!args.active),
            _ => panic!("Expected list command"),
        }
    }

    #[tokio::test]
    async fn test_open_store_refuses_memory_backend() {
        let settings = StorageSettings::default();

        let err = open_store(&settings).await.err().unwrap();

        assert!(err.to_string().contains("does not persist"));
    }

    #[tokio::test]
    async fn test_find_experiment_by_name() {
        let store = InMemoryExperimentStore::new();
        let created = store
            .create(CreateExperimentRequest::new(
                ExperimentName::new("checkout").unwrap(),
                vec![NewVariant::new(VariantData::new("green").unwrap(), 1.0)],
            ))
            .await
            .unwrap();

        let found = find_experiment(&store, " checkout ").await.unwrap();
        assert_eq!(found.id(), created.id());

        let missing = find_experiment(&store, "pricing").await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }
}
