//! sqlshift: MySQL to T-SQL from the command line
//!
//! # Usage
//!
//! ```bash
//! # Translate a statement
//! sqlshift "SELECT * FROM wp_posts LIMIT 5, 10"
//!
//! # With parameters and a schema dump
//! sqlshift "INSERT INTO wp_posts (post_title) VALUES (%s)" --bind "Hello" --schema wp.sql
//!
//! # Show what every pass did
//! sqlshift explain "SELECT DISTINCT post_title AS t FROM wp_posts ORDER BY post_date"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlshift::prelude::*;
use sqlshift::scan::split_top_level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlshift")]
#[command(version)]
#[command(about = "Rewrite MySQL statements into T-SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlshift 'SELECT * FROM wp_posts LIMIT 10'
    sqlshift 'UPDATE wp_options SET option_value = %s WHERE option_name = %s' --bind x --bind siteurl
    sqlshift replay session.sql --schema wp.sql")]
struct Cli {
    /// The MySQL statement to translate
    statement: Option<String>,

    /// Parameter bindings, in placeholder order
    #[arg(short, long)]
    bind: Vec<String>,

    /// Treat the bindings as serialized blobs
    #[arg(long)]
    serialized: bool,

    /// DDL files whose CREATE TABLE statements seed the schema map
    #[arg(short, long)]
    schema: Vec<PathBuf>,

    /// The statement translated before this one on the same connection
    #[arg(long)]
    previous: Option<String>,

    /// Config file (TOML)
    #[arg(short, long, env = "SQLSHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a statement and show every pass that changed it
    Explain {
        statement: String,
    },
    /// Print the tables learned from the --schema files
    Schema,
    /// List the translation passes in pipeline order
    Passes,
    /// Run a file of statements through one session, recording what would execute
    Replay {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqlshift=debug")
    } else {
        EnvFilter::try_from_env("SQLSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let translator = build_translator(&cli)?;

    match &cli.command {
        Some(Commands::Explain { statement }) => explain(&translator, &statement_from(&cli, statement), &cli),
        Some(Commands::Schema) => show_schema(translator.schema(), cli.format)?,
        Some(Commands::Replay { file }) => replay(translator, file, cli.format).await?,
        Some(Commands::Passes) => show_passes(),
        None => match &cli.statement {
            Some(text) => {
                let outcome = translator.translate(&statement_from(&cli, text), cli.previous.as_deref());
                print_outcome(&outcome, cli.format)?;
            }
            None => {
                println!("{}", "sqlshift: MySQL statements on SQL Server".cyan().bold());
                println!();
                println!("Usage: sqlshift <STATEMENT> [OPTIONS]");
                println!();
                println!("Try: sqlshift --help");
            }
        },
    }
    Ok(())
}

fn build_translator(cli: &Cli) -> Result<Translator> {
    let config = match &cli.config {
        Some(path) => TranslatorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TranslatorConfig::load_default().context("loading default config")?,
    };
    let schema = Arc::new(SchemaMap::new());
    for path in &cli.schema {
        load_schema(&schema, path)?;
    }
    Ok(Translator::with_config(schema, config))
}

fn load_schema(schema: &SchemaMap, path: &Path) -> Result<()> {
    let ddl = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let learned = split_top_level(&ddl, b';')
        .into_iter()
        .filter_map(|statement| schema.update_for(statement.trim()))
        .count();
    tracing::info!(path = %path.display(), tables = learned, "schema loaded");
    Ok(())
}

fn statement_from(cli: &Cli, text: &str) -> Statement {
    let mut statement = Statement::from_marked(text);
    for value in &cli.bind {
        statement = statement.bind(parse_binding(value, cli.serialized));
    }
    if cli.serialized {
        statement = statement.serialized();
    }
    statement
}

fn parse_binding(value: &str, serialized: bool) -> Param {
    if serialized {
        return Param::Opaque(value.to_string());
    }
    if let Ok(n) = value.parse::<i64>() {
        Param::Int(n)
    } else if let Ok(f) = value.parse::<f64>() {
        Param::Float(f)
    } else if value == "NULL" {
        Param::Null
    } else {
        Param::Text(value.to_string())
    }
}

fn print_outcome(outcome: &TranslationOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => {
            for sql in &outcome.preceding {
                println!("{} {}", "before".dimmed(), sql.yellow());
            }
            for sql in outcome.main.iter().filter(|m| !m.is_empty()) {
                println!("{}", sql.white());
            }
            for following in &outcome.following {
                let tag = match following.policy {
                    RunPolicy::Always => "after",
                    RunPolicy::OnSuccess => "on success",
                };
                println!("{} {}", tag.dimmed(), following.sql.yellow());
            }
            if let Some(slice) = outcome.slice {
                println!(
                    "{} rows {}..{}",
                    "slice".dimmed(),
                    slice.from.to_string().cyan(),
                    (slice.from + slice.count).to_string().cyan()
                );
            }
        }
    }
    Ok(())
}

fn explain(translator: &Translator, statement: &Statement, cli: &Cli) {
    println!("{}", "Translation".cyan().bold());
    println!();
    println!("{} {} ({})", "Input:".dimmed(), statement.text.trim().yellow(), statement.kind());
    println!();

    let outcome = translator.translate(statement, cli.previous.as_deref());
    if outcome.trace.is_empty() {
        println!("{}", "No pass changed the statement.".dimmed());
    }
    for record in &outcome.trace {
        println!("  {} {}", "•".cyan(), record.pass.name().green().bold());
        println!("    {} {}", "-".red(), record.before.dimmed());
        println!("    {} {}", "+".green(), record.after.white());
    }
    println!();
    println!("{}", "Output:".green().bold());
    if let Err(e) = print_outcome(&outcome, OutputFormat::Text) {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }
}

fn show_schema(schema: &SchemaMap, format: OutputFormat) -> Result<()> {
    let tables = schema.tables();
    if let OutputFormat::Json = format {
        let tables: Vec<_> = tables.iter().map(|t| t.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }
    if tables.is_empty() {
        println!("{}", "(no tables; pass --schema FILE)".dimmed());
        return Ok(());
    }
    for table in tables {
        println!("{}", table.name.white().bold());
        for column in &table.columns {
            let mut flags = Vec::new();
            if table.primary_key.contains(&column.name) {
                flags.push("pk");
            }
            if table.unique.contains(&column.name) {
                flags.push("unique");
            }
            if column.meta.identity {
                flags.push("identity");
            }
            println!(
                "  {:24} {:20} {:8} {}",
                column.name.cyan(),
                column.meta.sql_type,
                column.meta.class.to_string().yellow(),
                flags.join(",").dimmed()
            );
        }
    }
    Ok(())
}

fn show_passes() {
    println!("{}", "Translation passes".cyan().bold());
    println!();
    for (i, pass) in Pass::ALL.iter().enumerate() {
        println!(
            "{:>3}  {:22} {}",
            (i + 1).to_string().dimmed(),
            pass.name().yellow(),
            pass.description()
        );
    }
}

async fn replay(translator: Translator, file: &Path, format: OutputFormat) -> Result<()> {
    let script = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let mut session = Session::new(translator, DryRun::default());
    for text in split_top_level(&script, b';') {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        session.query(Statement::from_marked(text)).await?;
    }
    let statements = session.into_executor().statements().to_vec();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statements)?),
        OutputFormat::Text => {
            for sql in &statements {
                println!("{sql};");
            }
            println!();
            println!("{} statement(s)", statements.len().to_string().cyan());
        }
    }
    Ok(())
}
