use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use modelset::query::DbCreateTable;
use modelset::{
    create_child, import_script, Config, DataSet, DbSelectStatement, ModelId, QueryBuilder,
    Schema, SchemaDocument, SetKey, SqlGenerator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "modelset")]
#[command(about = "ModelSet - DataSet schemas rendered as dialect SQL", long_about = None)]
struct Args {
    /// Directory holding modelset.toml and an optional .env
    #[arg(long, global = true, default_value = ".")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print CREATE TABLE for a model
    CreateTable {
        /// JSON schema document
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        model: String,
    },
    /// Print the SELECT for a model's table
    Select {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        model: String,
        /// Also print the sequential-key statements loading every child level
        #[arg(long)]
        children: bool,
    },
    /// Print the import script for a JSON data file
    Import {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        model: String,
        #[arg(long)]
        data: PathBuf,
    },
    /// Parse, validate and re-serialize a JSON data file
    Check {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        model: String,
        #[arg(long)]
        data: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    // Initialize logging
    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "modelset=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let dialect = config.dialect()?;
    tracing::info!("Target dialect: {}", dialect);

    match args.command {
        Command::CreateTable { schema, model } => {
            let (schema, model) = load_schema(&schema, &model)?;
            let mut generator = SqlGenerator::new(&schema, dialect);
            generator.create_table(&DbCreateTable::for_model(&schema, model)?)?;
            println!("{}", generator.finish());
        }
        Command::Select {
            schema,
            model,
            children,
        } => {
            let (schema, model) = load_schema(&schema, &model)?;
            let statement = QueryBuilder::select_table(Arc::clone(&schema), model)?;
            let mut generator = SqlGenerator::new(&schema, dialect);
            generator.select(&statement)?;
            if children {
                child_statements(&mut generator, &schema, &statement)?;
            }
            println!("{}", generator.finish());
        }
        Command::Import {
            schema,
            model,
            data,
        } => {
            let (schema, model) = load_schema(&schema, &model)?;
            let dataset = load_data(schema, model, &config, &data)?;
            println!("{}", import_script(&dataset, dialect)?);
        }
        Command::Check {
            schema,
            model,
            data,
        } => {
            let (schema, model) = load_schema(&schema, &model)?;
            let dataset = load_data(Arc::clone(&schema), model, &config, &data)?;
            check(&dataset, schema, model, &config)?;
        }
    }

    Ok(())
}

fn load_schema(path: &Path, model: &str) -> anyhow::Result<(Arc<Schema>, ModelId)> {
    let schema = SchemaDocument::load(path)
        .and_then(|document| document.build())
        .with_context(|| format!("Failed to load schema {}", path.display()))?;
    let id = schema.model_by_name(model)?.id;
    Ok((schema, id))
}

fn load_data(
    schema: Arc<Schema>,
    model: ModelId,
    config: &Config,
    path: &Path,
) -> anyhow::Result<DataSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let dataset = DataSet::parse_json(schema, model, config.options(), &content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(dataset)
}

/// Emit the child statements of `parent`, descending through non-recursive
/// relationships. Recursive relationships are loaded one level deep.
fn child_statements(
    generator: &mut SqlGenerator<'_>,
    schema: &Schema,
    parent: &DbSelectStatement,
) -> anyhow::Result<()> {
    for relationship in &schema.model(parent.model).children {
        let child = create_child(schema, parent, *relationship)?;
        generator.child_query(&child)?;
        if !schema.relationship(*relationship).recursive {
            child_statements(generator, schema, &child.select)?;
        }
    }
    Ok(())
}

/// Data sets grouped by depth, root first.
fn levels(dataset: &DataSet) -> anyhow::Result<Vec<Vec<SetKey>>> {
    let schema = dataset.schema();
    let mut levels = vec![vec![dataset.root()]];
    loop {
        let mut next = Vec::new();
        for set in levels.last().into_iter().flatten() {
            for row in dataset.rows(*set)? {
                let Some(model) = dataset.model(*row) else {
                    continue;
                };
                for relationship in &schema.model(model).children {
                    next.extend(dataset.existing_child_set(*row, *relationship));
                }
            }
        }
        if next.is_empty() {
            return Ok(levels);
        }
        levels.push(next);
    }
}

fn check(
    dataset: &DataSet,
    schema: Arc<Schema>,
    model: ModelId,
    config: &Config,
) -> anyhow::Result<()> {
    let mut violations = 0;
    for (depth, sets) in levels(dataset)?.iter().enumerate() {
        let mut rows = 0;
        for set in sets {
            rows += dataset.count(*set)?;
            for error in dataset.validate_set(*set)? {
                violations += 1;
                println!("  {} {}: {}", "✗".red(), error.constraint, error.message);
            }
        }
        println!("  level {}: {} rows in {} sets", depth, rows, sets.len());
    }

    let json = dataset.to_json_string()?;
    let reparsed = DataSet::parse_json(schema, model, config.options(), &json)?;
    if reparsed.to_json_value()? == dataset.to_json_value()? {
        println!("{} round-trip", "✓".green());
    } else {
        println!("{} round-trip", "✗".red());
        anyhow::bail!("re-serialized data differs from the original");
    }
    if violations > 0 {
        anyhow::bail!("{} constraint violations", violations);
    }
    println!("{} {} constraints", "✓".green(), "all".bold());
    Ok(())
}
