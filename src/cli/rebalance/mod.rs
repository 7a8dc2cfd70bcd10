//! Rebalance command - replaces an experiment's variant weights at once

use clap::Args;

use crate::domain::VariantId;

#[derive(Args, Debug, Clone)]
pub struct RebalanceArgs {
    /// Experiment name
    #[arg(short, long)]
    pub name: String,

    /// New weight as `<variant-id>=<weight>`; every variant must be listed
    #[arg(short, long = "weight", required = true, value_parser = parse_weight)]
    pub weights: Vec<(VariantId, f64)>,
}

pub fn parse_weight(raw: &str) -> Result<(VariantId, f64), String> {
    let (id, weight) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <variant-id>=<weight>, got '{}'", raw))?;

    let id = VariantId::parse(id).map_err(|e| e.to_string())?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{}': {}", weight, e))?;

    Ok((id, weight))
}

pub async fn run(args: RebalanceArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let store = super::open_store(&config.storage).await?;

    let experiment = super::find_experiment(store.as_ref(), &args.name).await?;
    let updated = store.rebalance(&experiment.id(), args.weights).await?;

    super::print_json(&updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        let id = VariantId::generate();
        let (parsed, weight) = parse_weight(&format!("{}=0.4", id)).unwrap();

        assert_eq!(parsed, id);
        assert_eq!(weight, 0.4);
    }

    #[test]
    fn test_parse_weight_rejects_malformed() {
        assert!(parse_weight("0.4").is_err());
        assert!(parse_weight("variant-a=0.4").is_err());
        assert!(parse_weight(&format!("{}=lots", VariantId::generate())).is_err());
    }
}
