//! Operator tool for inspecting lookup vindex definitions offline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use holo_vindex::{DeclarativeSchema, VindexParams, VindexRegistry};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vindexctl")]
#[command(about = "Inspect and validate HoloStore lookup vindex definitions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build one vindex and print its configuration and queries.
    Describe {
        /// Vindex type (`lookup` or `lookup_unique`).
        #[arg(long = "type")]
        type_name: String,
        #[arg(long, default_value = "vindex")]
        name: String,
        /// Vindex option as key=value; repeatable.
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Load a JSON map of vindex definitions and report problems.
    Check {
        #[arg(long)]
        file: PathBuf,
        /// Optional JSON map of table name to column list to validate against.
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("holo_vindex=info,warn")),
        )
        .init();

    let args = Args::parse();
    let registry = VindexRegistry::with_lookup_types();

    match args.command {
        Command::Describe {
            type_name,
            name,
            params,
        } => {
            let params = parse_params(&params)?;
            let vindex = registry.create(&type_name, &name, &params)?;
            let (query, bind_names) = vindex.query();
            let doc = json!({
                "name": vindex.name(),
                "type": vindex.type_name(),
                "cost": vindex.cost(),
                "unique": vindex.is_unique(),
                "write_only": vindex.is_backfilling(),
                "params": vindex.to_json()?,
                "query": query,
                "bind_names": bind_names,
                "unknown_params": vindex.unknown_params(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Check { file, schema } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let set = registry.load_json(&raw)?;
            info!(vindexes = set.len(), "loaded vindex definitions");

            let schema = match schema {
                Some(path) => Some(load_schema(&path)?),
                None => None,
            };
            let mut failures = 0usize;
            for (name, vindex) in set.iter() {
                let mut notes = Vec::new();
                if !vindex.unknown_params().is_empty() {
                    notes.push(format!("unknown params: {}", vindex.unknown_params().join(",")));
                }
                if vindex.is_backfilling() {
                    notes.push("write_only".to_string());
                }
                if let Some(schema) = &schema {
                    if let Err(err) = vindex.config().validate_against(schema) {
                        failures += 1;
                        notes.push(format!("schema: {err}"));
                    }
                }
                if notes.is_empty() {
                    println!("{name}: ok");
                } else {
                    println!("{name}: {}", notes.join("; "));
                }
            }
            if failures > 0 {
                bail!("{failures} vindex definition(s) failed schema validation");
            }
        }
    }

    Ok(())
}

fn parse_params(raw: &[String]) -> Result<VindexParams> {
    let mut params = VindexParams::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("param '{item}' must be key=value");
        };
        params.insert(key.trim().to_string(), value.to_string());
    }
    Ok(params)
}

fn load_schema(path: &Path) -> Result<DeclarativeSchema> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let tables: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&raw).context("parse schema json")?;
    let mut schema = DeclarativeSchema::new();
    for (table, columns) in &tables {
        schema.add_table(table, columns);
    }
    Ok(schema)
}
