use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use csv::ReaderBuilder;
use prettytable::{Cell, Row as TableRow, Table};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use heapdb::{
    Catalog, CatalogError, ColumnDef, ConfigError, DataType, DbEnv, EnvConfig, HeapTable,
    RecordError, Row, StoreError, TableMetadata, TableSchema, Value,
};

#[derive(Parser)]
#[command(name = "heapdb", version, about = "Heap-file tables over a block store")]
struct Cli {
    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a table from column specs like `id:INT name:TEXT`
    Create {
        table: String,
        #[arg(required = true)]
        columns: Vec<String>,
    },
    /// Insert one row given as `column=value` pairs
    Insert {
        table: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Print every row of a table
    Scan {
        table: String,
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Insert each record of a CSV file whose header names the columns
    Import { table: String, file: PathBuf },
    /// Remove a table and its data
    Drop { table: String },
    /// Run a create/insert/select/project round against scratch tables
    Selftest,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Record(#[from] RecordError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Usage(String),

    #[error("selftest failed: {0}")]
    SelfTest(String),
}

type CliResult<T> = Result<T, CliError>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> CliResult<EnvConfig> {
    let mut config = match &cli.config {
        Some(path) => EnvConfig::load(path)?,
        None => EnvConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli)?;
    debug!(
        data_dir = %config.data_dir.display(),
        cache_blocks = config.cache_blocks,
        "opening environment"
    );
    let env = DbEnv::open(config)?;

    match cli.command {
        Command::Create { table, columns } => create_table(&env, &table, &columns),
        Command::Insert { table, values } => insert_row(&env, &table, &values),
        Command::Scan { table, columns } => scan_table(&env, &table, &columns),
        Command::Import { table, file } => import_csv(&env, &table, &file),
        Command::Drop { table } => drop_table(&env, &table),
        Command::Selftest => selftest(&env),
    }
}

fn parse_column_spec(spec: &str) -> CliResult<ColumnDef> {
    let (name, type_name) = spec
        .split_once(':')
        .ok_or_else(|| CliError::Usage(format!("expected name:TYPE, got '{}'", spec)))?;
    let data_type = DataType::parse(type_name)
        .ok_or_else(|| CliError::Usage(format!("unknown column type '{}'", type_name)))?;
    Ok(ColumnDef::new(name, data_type))
}

fn open_table(env: &DbEnv, catalog: &Catalog, name: &str) -> CliResult<HeapTable> {
    let schema = catalog.get_table(name)?.to_schema()?;
    let mut table = HeapTable::new(env, name, schema);
    table.open()?;
    Ok(table)
}

fn column_type(schema: &TableSchema, column: &str) -> CliResult<DataType> {
    schema
        .find_column(column)
        .map(|idx| schema.columns()[idx].data_type())
        .ok_or_else(|| RecordError::UnknownColumn(column.to_string()).into())
}

fn create_table(env: &DbEnv, name: &str, specs: &[String]) -> CliResult<()> {
    let columns = specs
        .iter()
        .map(|s| parse_column_spec(s))
        .collect::<CliResult<Vec<_>>>()?;
    let schema = TableSchema::new(columns)?;

    let mut catalog = Catalog::load_or_default(env.data_dir())?;
    match catalog.get_table(name) {
        Ok(existing) if existing.to_schema()? != schema => {
            return Err(CatalogError::TableExists(name.to_string()).into());
        }
        Ok(_) => {}
        Err(_) => catalog.add_table(TableMetadata::from_schema(name, &schema))?,
    }

    let mut table = HeapTable::new(env, name, schema);
    table.create_if_not_exists()?;
    table.close()?;
    catalog.save(env.data_dir())?;

    println!("Table {} ready", name);
    Ok(())
}

fn insert_row(env: &DbEnv, name: &str, assignments: &[String]) -> CliResult<()> {
    let catalog = Catalog::load_or_default(env.data_dir())?;
    let mut table = open_table(env, &catalog, name)?;

    let mut row = Row::with_capacity(assignments.len());
    for assignment in assignments {
        let (column, literal) = assignment.split_once('=').ok_or_else(|| {
            CliError::Usage(format!("expected column=value, got '{}'", assignment))
        })?;
        let data_type = column_type(table.schema(), column)?;
        row.insert(column, Value::parse(literal, data_type)?);
    }

    let handle = table.insert(&row)?;
    table.close()?;

    println!("Inserted {}", handle);
    Ok(())
}

fn scan_table(env: &DbEnv, name: &str, columns: &[String]) -> CliResult<()> {
    let catalog = Catalog::load_or_default(env.data_dir())?;
    let mut table = open_table(env, &catalog, name)?;

    let names: Vec<String> = if columns.is_empty() {
        table.schema().column_names().map(str::to_string).collect()
    } else {
        columns.to_vec()
    };
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut output = Table::new();
    output.set_titles(TableRow::new(name_refs.iter().map(|n| Cell::new(n)).collect()));

    let handles = table.select()?;
    for handle in &handles {
        let row = table.project_columns(*handle, &name_refs)?;
        let cells = name_refs
            .iter()
            .map(|n| Cell::new(&row.get(n).map(Value::to_string).unwrap_or_default()))
            .collect();
        output.add_row(TableRow::new(cells));
    }
    table.close()?;

    output.printstd();
    println!("{} row(s)", handles.len());
    Ok(())
}

fn import_csv(env: &DbEnv, name: &str, path: &Path) -> CliResult<()> {
    let catalog = Catalog::load_or_default(env.data_dir())?;
    let mut table = open_table(env, &catalog, name)?;

    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let types = headers
        .iter()
        .map(|h| column_type(table.schema(), h.trim()))
        .collect::<CliResult<Vec<_>>>()?;

    let mut count = 0usize;
    for result in reader.records() {
        let record = result?;
        let mut row = Row::with_capacity(headers.len());
        for ((header, field), data_type) in headers.iter().zip(record.iter()).zip(&types) {
            row.insert(header.trim(), Value::parse(field, *data_type)?);
        }
        table.insert(&row)?;
        count += 1;
    }
    table.close()?;

    info!(table = name, rows = count, "csv imported");
    println!("Imported {} row(s) into {}", count, name);
    Ok(())
}

fn drop_table(env: &DbEnv, name: &str) -> CliResult<()> {
    let mut catalog = Catalog::load_or_default(env.data_dir())?;
    let schema = catalog.get_table(name)?.to_schema()?;

    let mut table = HeapTable::new(env, name, schema);
    match table.drop() {
        // The catalog entry is still removed when the data file is already gone
        Ok(()) | Err(RecordError::TableNotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    catalog.remove_table(name)?;
    catalog.save(env.data_dir())?;

    println!("Table {} dropped", name);
    Ok(())
}

fn selftest(env: &DbEnv) -> CliResult<()> {
    let schema = TableSchema::new(vec![
        ColumnDef::new("a", DataType::Int),
        ColumnDef::new("b", DataType::Text),
    ])?;

    let mut scratch = HeapTable::new(env, "_selftest1", schema.clone());
    scratch.create()?;
    scratch.drop()?;
    println!("create/drop ok");

    let mut table = HeapTable::new(env, "_selftest2", schema);
    table.create_if_not_exists()?;
    println!("create_if_not_exists ok");

    let row = Row::new().with("a", 12).with("b", "Hello!");
    table.insert(&row)?;
    println!("insert ok");

    let handles = table.select()?;
    if handles.len() != 1 {
        table.drop()?;
        return Err(CliError::SelfTest(format!(
            "select returned {} handles, expected 1",
            handles.len()
        )));
    }
    println!("select ok");

    let projected = table.project(handles[0])?;
    table.drop()?;
    if projected.get("a") != Some(&Value::Int(12)) {
        return Err(CliError::SelfTest("wrong value for column a".to_string()));
    }
    if projected.get("b") != Some(&Value::Text("Hello!".to_string())) {
        return Err(CliError::SelfTest("wrong value for column b".to_string()));
    }
    println!("project ok");

    println!("selftest ok");
    Ok(())
}
