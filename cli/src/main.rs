use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args, Parser, Subcommand};
use dal_doc_db::{
    BuildConfig, ConfigurationError, DEFAULT_PREFIX, DefinitionDir, SchemaSource, SnapshotSource,
    SourceConfig, write_snapshot,
};
use dal_doc_sqlite::{
    BuildInputs, DocumentationBuilder, DocumentationStore, InsertCounts, SqliteSource, StoreQuery,
    StoreStatus,
};
use rusqlite::{Connection, OpenFlags};
use tracing_subscriber::EnvFilter;

/// How query results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "dal-doc")]
#[command(version, about = "Build and browse documentation of a data-access layer")]
struct Cli {
    /// Log build progress to stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate every definition and rebuild the documentation store.
    Build(BuildArgs),
    /// Validate definitions against the schema without writing anything.
    Check(BuildArgs),
    /// Write schema.json and schema.yml for a SQLite database.
    Snapshot(SnapshotArgs),
    /// Show row counts of a documentation store.
    Status(StatusArgs),
    /// List the entry points that use a field or a business entity.
    Usage(UsageArgs),
    /// Print every store row by natural key, one table at a time.
    Dump(StoreArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// YAML build configuration; the options below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite database whose schema is documented.
    #[arg(long, conflicts_with = "schema")]
    source_db: Option<PathBuf>,
    /// Schema snapshot (`.json`, `.yml` or `.yaml`) used instead of a database.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Root directory of request definitions.
    #[arg(long)]
    requests: Option<PathBuf>,
    /// Root directory of procedure definitions.
    #[arg(long)]
    procedures: Option<PathBuf>,
    /// Documentation store file.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Directory receiving the schema snapshot.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Table prefix inside the store.
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Debug, Args)]
struct SnapshotArgs {
    /// SQLite database to introspect.
    #[arg(long)]
    source_db: PathBuf,
    /// Output directory.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Documentation store file.
    #[arg(long)]
    store: PathBuf,
    /// Table prefix.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["field", "entity"])))]
struct UsageArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Qualified field name, e.g. `user.login`.
    #[arg(long)]
    field: Option<String>,
    /// Business entity name.
    #[arg(long)]
    entity: Option<String>,
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => run_build(args),
        Command::Check(args) => run_check(args),
        Command::Snapshot(args) => run_snapshot(args),
        Command::Status(args) => run_status(args),
        Command::Usage(args) => run_usage(args),
        Command::Dump(args) => run_dump(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_build(args: BuildArgs) -> Result<(), String> {
    let config = load_config(&args)?;
    let report = DocumentationBuilder::run_config(config).map_err(|e| e.to_string())?;
    println!(
        "Build complete. Store written to '{}'.",
        report.store.display()
    );
    print_counts(&report.counts);
    println!("  Schema snapshot: {}", report.snapshot.yaml.display());
    Ok(())
}

fn run_check(args: BuildArgs) -> Result<(), String> {
    let config = load_config(&args)?;

    // Only the inputs matter here; store locations may be absent.
    let problems: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|p| {
            !matches!(
                p,
                ConfigurationError::MissingParameter("store" | "snapshot_dir")
            )
        })
        .collect();
    if !problems.is_empty() {
        return Err(join_problems(&problems));
    }

    let (Some(source), Some(requests), Some(procedures)) = (
        schema_source(&config.source),
        config.requests.as_ref(),
        config.procedures.as_ref(),
    ) else {
        return Err("incomplete configuration".to_string());
    };
    let requests = DefinitionDir::requests(requests);
    let procedures = DefinitionDir::procedures(procedures);

    let mut builder = DocumentationBuilder::new(config.prefix.as_deref().unwrap_or(DEFAULT_PREFIX))
        .map_err(|e| e.to_string())?;
    let validated = builder
        .prepare(BuildInputs {
            source: source.as_ref(),
            requests: &requests,
            procedures: &procedures,
        })
        .map_err(|e| e.to_string())?;

    println!(
        "Check passed: {} requests and {} procedures against {} tables ({} fields).",
        validated.request_count(),
        validated.procedure_count(),
        validated.registry.table_count(),
        validated.registry.field_count()
    );
    Ok(())
}

fn run_snapshot(args: SnapshotArgs) -> Result<(), String> {
    let raw = SqliteSource::new(&args.source_db)
        .extract_schema()
        .map_err(|e| e.to_string())?;
    let files = write_snapshot(&raw, &args.output)
        .map_err(|e| format!("Failed to write snapshot to '{}': {e}", args.output.display()))?;
    println!("Snapshot of {} tables written:", raw.len());
    println!("  {}", files.json.display());
    println!("  {}", files.yaml.display());
    Ok(())
}

fn run_status(args: StatusArgs) -> Result<(), String> {
    let store = open_store(&args.store)?;
    let status = store
        .status()
        .map_err(|e| format!("Failed to get store status: {e}"))?;
    match args.format {
        CliOutputFormat::Json => println!("{}", to_json(&status)?),
        CliOutputFormat::Text => print_status(&status),
    }
    Ok(())
}

fn run_usage(args: UsageArgs) -> Result<(), String> {
    let store = open_store(&args.store)?;
    let query = StoreQuery::new(store.connection(), store.prefix()).map_err(|e| e.to_string())?;

    let lines = match (&args.field, &args.entity) {
        (Some(field), _) => {
            let usage = query.field_usage(field).map_err(|e| e.to_string())?;
            if args.format == CliOutputFormat::Json {
                println!("{}", to_json(&usage)?);
                return Ok(());
            }
            usage
                .iter()
                .map(|u| format!("{} {} ({})", u.kind, u.entry_point, u.role))
                .collect::<Vec<_>>()
        }
        (None, Some(entity)) => {
            let usage = query.entity_usage(entity).map_err(|e| e.to_string())?;
            if args.format == CliOutputFormat::Json {
                println!("{}", to_json(&usage)?);
                return Ok(());
            }
            usage
                .iter()
                .map(|u| format!("{} {} ({})", u.kind, u.entry_point, u.action))
                .collect::<Vec<_>>()
        }
        (None, None) => return Err("either --field or --entity is required".to_string()),
    };

    if lines.is_empty() {
        println!("No entry point uses it.");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn run_dump(args: StoreArgs) -> Result<(), String> {
    let store = open_store(&args)?;
    let query = StoreQuery::new(store.connection(), store.prefix()).map_err(|e| e.to_string())?;
    let dump = query.dump().map_err(|e| format!("Failed to dump store: {e}"))?;
    for (table, rows) in dump {
        println!("[{table}]");
        for row in rows {
            println!("  {row}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Loads the optional config file and applies command-line overrides.
fn load_config(args: &BuildArgs) -> Result<BuildConfig, String> {
    let base = match &args.config {
        Some(path) => BuildConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => BuildConfig::default(),
    };
    Ok(base.merged(overrides(args)))
}

fn overrides(args: &BuildArgs) -> BuildConfig {
    BuildConfig {
        source: SourceConfig {
            sqlite: args.source_db.clone(),
            snapshot: args.schema.clone(),
        },
        requests: args.requests.clone(),
        procedures: args.procedures.clone(),
        store: args.store.clone(),
        snapshot_dir: args.snapshot_dir.clone(),
        prefix: args.prefix.clone(),
    }
}

fn schema_source(source: &SourceConfig) -> Option<Box<dyn SchemaSource>> {
    match (&source.sqlite, &source.snapshot) {
        (Some(path), _) => Some(Box::new(SqliteSource::new(path))),
        (None, Some(path)) => Some(Box::new(SnapshotSource::new(path))),
        (None, None) => None,
    }
}

fn join_problems(problems: &[ConfigurationError]) -> String {
    let messages: Vec<String> = problems.iter().map(ToString::to_string).collect();
    format!("invalid configuration: {}", messages.join("; "))
}

/// Opens an existing store without creating it.
fn open_store(args: &StoreArgs) -> Result<DocumentationStore, String> {
    let conn = open_read_only(&args.store)?;
    DocumentationStore::new(conn, &args.prefix)
        .map_err(|e| format!("Failed to open documentation store: {e}"))
}

fn open_read_only(path: &Path) -> Result<Connection, String> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn print_counts(counts: &InsertCounts) {
    println!("  Tables: {}", counts.tables);
    println!("  Fields: {}", counts.fields);
    println!("  Tags: {}", counts.tags);
    println!("  Business entities: {}", counts.entities);
    println!("  Actions: {}", counts.actions);
    println!("  Requests: {}", counts.requests);
    println!("  Procedures: {}", counts.procedures);
    println!("  Links: {}", counts.links);
}

fn print_status(status: &StoreStatus) {
    println!("Store Status:");
    println!(
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    println!("  Table count: {}", status.table_count);
    println!("  Field count: {}", status.field_count);
    println!("  Tag count: {}", status.tag_count);
    println!("  Entity count: {}", status.entity_count);
    println!("  Action count: {}", status.action_count);
    println!("  Request count: {}", status.request_count);
    println!("  Procedure count: {}", status.procedure_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dal-doc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_overrides_only_set_given_options() {
        let cli = parse(&["build", "--schema", "s.yml", "--prefix", "api_"]);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        let config = overrides(&args);
        assert_eq!(config.source.snapshot, Some(PathBuf::from("s.yml")));
        assert_eq!(config.source.sqlite, None);
        assert_eq!(config.prefix.as_deref(), Some("api_"));
        assert_eq!(config.store, None);
    }

    #[test]
    fn test_source_db_conflicts_with_schema() {
        let result = Cli::try_parse_from([
            "dal-doc",
            "build",
            "--source-db",
            "app.db",
            "--schema",
            "s.yml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_usage_requires_a_target() {
        assert!(Cli::try_parse_from(["dal-doc", "usage", "--store", "doc.db"]).is_err());
        let cli = parse(&["usage", "--store", "doc.db", "--entity", "user"]);
        let Command::Usage(args) = cli.command else {
            panic!("expected usage");
        };
        assert_eq!(args.store.prefix, DEFAULT_PREFIX);
        assert_eq!(args.format, CliOutputFormat::Text);
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = parse(&["status", "--store", "doc.db", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_schema_source_prefers_sqlite() {
        let source = SourceConfig {
            sqlite: Some("app.db".into()),
            snapshot: Some("s.yml".into()),
        };
        let location = schema_source(&source).unwrap().location();
        assert!(location.contains("app.db"));
        assert!(schema_source(&SourceConfig::default()).is_none());
    }

    #[test]
    fn test_join_problems_lists_every_parameter() {
        let message = join_problems(&[
            ConfigurationError::MissingParameter("source"),
            ConfigurationError::MissingParameter("requests"),
        ]);
        assert!(message.contains("source"));
        assert!(message.contains("requests"));
    }
}
