//! Create command - registers an experiment and its weighted variants

use clap::Args;
use tracing::info;

use crate::domain::{CreateExperimentRequest, ExperimentName, NewVariant, VariantData};

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Experiment name
    #[arg(short, long)]
    pub name: String,

    /// Variant as `<data>=<weight>`; repeat once per variant, in bucketing order
    #[arg(short, long = "variant", required = true, value_parser = parse_variant)]
    pub variants: Vec<VariantArg>,
}

/// One `<data>=<weight>` pair from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct VariantArg {
    pub data: String,
    pub weight: f64,
}

/// Split at the last `=` so payloads may contain `=` themselves
pub fn parse_variant(raw: &str) -> Result<VariantArg, String> {
    let (data, weight) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected <data>=<weight>, got '{}'", raw))?;

    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{}': {}", weight, e))?;

    if data.is_empty() {
        return Err("variant data cannot be empty".to_string());
    }

    Ok(VariantArg {
        data: data.to_string(),
        weight,
    })
}

pub async fn run(args: CreateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let store = super::open_store(&config.storage).await?;

    let variants = args
        .variants
        .into_iter()
        .map(|v| -> anyhow::Result<NewVariant> {
            Ok(NewVariant::new(VariantData::new(v.data)?, v.weight))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let request = CreateExperimentRequest::new(ExperimentName::new(&args.name)?, variants);

    let experiment = store.create(request).await?;
    info!(experiment_id = %experiment.id(), "Experiment ready");

    super::print_json(&experiment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        let variant = parse_variant("blue=0.25").unwrap();
        assert_eq!(variant.data, "blue");
        assert_eq!(variant.weight, 0.25);
    }

    #[test]
    fn test_parse_variant_keeps_inner_equals() {
        let variant = parse_variant("a=b=0.5").unwrap();
        assert_eq!(variant.data, "a=b");
        assert_eq!(variant.weight, 0.5);
    }

    #[test]
    fn test_parse_variant_rejects_malformed() {
        assert!(parse_variant("blue").is_err());
        assert!(parse_variant("blue=heavy").is_err());
        assert!(parse_variant("=0.5").is_err());
    }
}
