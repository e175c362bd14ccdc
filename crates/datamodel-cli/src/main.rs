//! Data model schema CLI.
//!
//! Provides the `datamodel` binary for inspecting and initializing the
//! on-device form databases. It is a thin caller of `datamodel-storage`.
//!
//! Reads configuration from environment variables, overridable by flags:
//! - `DATAMODEL_HOME`: directory holding one `<name>.sqlite` per logical
//!   database (default: "./data")
//! - `DATAMODEL_APP_KEY`: application key for schema versioning
//!   (default: "default")

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use datamodel_core::{rows_from_document, SchemaDocument};
use datamodel_storage::{root_fingerprints, schema_fingerprint, DatabaseRegistry, StorageError, SystemTable};

/// Current generation of the system table creation set.
const APP_VERSION: i64 = 1;

/// Form data model schema tools.
#[derive(Parser)]
#[command(name = "datamodel", about = "Form data model schema tools")]
struct Cli {
    /// Directory holding the database files.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Application key used for the schema version record.
    #[arg(long, global = true)]
    app_key: Option<String>,

    /// Logical database name.
    #[arg(short, long, global = true, default_value = "default")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the system tables.
    Init {
        /// Target schema version.
        #[arg(long, default_value_t = APP_VERSION)]
        version: i64,
    },

    /// Show the stored schema version and which system tables exist.
    Status,

    /// List registered tables.
    Tables,

    /// Print the storage table name of a table id.
    Resolve {
        /// Table id to look up.
        table_id: String,
    },

    /// Print the schema document of a table.
    Schema {
        /// Table id to describe.
        table_id: String,

        /// Pretty-print the document.
        #[arg(long)]
        pretty: bool,
    },

    /// List every column of a table with its path and type.
    Columns {
        /// Table id to describe.
        table_id: String,

        /// Only list columns backed by a physical column.
        #[arg(long)]
        persisted: bool,
    },

    /// Register a table from a schema document file.
    Register {
        /// Table id to register.
        table_id: String,

        /// Storage table name (default: the table id).
        #[arg(long)]
        db_table_name: Option<String>,

        /// Path to a schema document JSON file.
        #[arg(long)]
        document: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let home = cli.home.unwrap_or_else(|| {
        std::env::var("DATAMODEL_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"))
    });
    let app_key = cli.app_key.unwrap_or_else(|| {
        std::env::var("DATAMODEL_APP_KEY").unwrap_or_else(|_| "default".to_string())
    });

    tracing::debug!(home = %home.display(), app_key = %app_key, db = %cli.db, "opening registry");
    let registry = DatabaseRegistry::new(home, &app_key, APP_VERSION);
    let exit_code = match run(&registry, &cli.db, cli.command) {
        Ok(code) => code,
        Err(e) => report(&e),
    };
    process::exit(exit_code);
}

/// Executes a subcommand.
///
/// Returns exit code: 0 = success, 4 = table not registered.
fn run(registry: &DatabaseRegistry, db: &str, command: Commands) -> Result<i32, StorageError> {
    match command {
        Commands::Init { version } => {
            let outcome = registry.ensure_schema(db, version)?;
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(0)
        }
        Commands::Status => {
            let (version, tables) =
                registry.with_database(db, |d| Ok((d.schema_version(registry.app_key())?, d.table_names()?)))?;
            match version {
                Some(v) => println!("version: {}", v),
                None => println!("version: none"),
            }
            let present: Vec<SystemTable> = tables.iter().filter_map(|t| SystemTable::from_name(t)).collect();
            for table in SystemTable::ALL {
                let state = if present.contains(&table) { "present" } else { "missing" };
                println!("{:<28} {}", table.name(), state);
            }
            Ok(0)
        }
        Commands::Tables => {
            let tables = registry.with_database(db, |d| d.list_tables())?;
            println!("{}", serde_json::to_string_pretty(&tables)?);
            Ok(0)
        }
        Commands::Resolve { table_id } => {
            match registry.with_database(db, |d| d.resolve_table_name(&table_id))? {
                Some(name) => {
                    println!("{}", name);
                    Ok(0)
                }
                None => {
                    eprintln!("table '{}' is not registered", table_id);
                    Ok(4)
                }
            }
        }
        Commands::Schema { table_id, pretty } => {
            let doc = registry.with_database(db, |d| d.schema_document(&table_id))?;
            let json = if pretty {
                serde_json::to_string_pretty(&doc)?
            } else {
                serde_json::to_string(&doc)?
            };
            println!("{}", json);
            println!("fingerprint: {}", schema_fingerprint(&doc)?);
            for (root, hash) in root_fingerprints(&doc)? {
                println!("  {}: {}", root, hash);
            }
            Ok(0)
        }
        Commands::Columns { table_id, persisted } => {
            let defs = registry.with_database(db, |d| d.build_column_definitions(&table_id))?;
            for (key, def) in defs.iter() {
                if persisted && !def.is_persisted {
                    continue;
                }
                println!("{:<24} {:<12} {}", key, def.element_type.as_str(), defs.path(key).join("."));
            }
            Ok(0)
        }
        Commands::Register {
            table_id,
            db_table_name,
            document,
        } => {
            let text = std::fs::read_to_string(&document)?;
            let doc: SchemaDocument = serde_json::from_str(&text)?;
            let rows = rows_from_document(&doc).map_err(|source| StorageError::MalformedSchema {
                table_id: table_id.clone(),
                source,
            })?;
            let db_table_name = db_table_name.unwrap_or_else(|| table_id.clone());
            registry.with_database(db, |d| d.register_table(&table_id, &db_table_name, &rows))?;
            println!("registered '{}' as '{}' ({} columns)", table_id, db_table_name, rows.len());
            Ok(0)
        }
    }
}

/// Prints an error and maps it to an exit code: 1 = malformed schema,
/// 2 = schema initialization failure, 3 = other storage or I/O error.
fn report(err: &StorageError) -> i32 {
    eprintln!("Error: {}", err);
    if err.is_malformed_schema() {
        1
    } else if err.is_migration_failure() {
        2
    } else {
        3
    }
}
