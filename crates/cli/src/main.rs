// daybook CLI - supplier order ingestion and daily payment/re-order records

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use daybook_engine::sheet::HEADER_SNAPSHOT_ROWS;
use daybook_io::{export, ExcelSource, SqliteStore};
use daybook_recon::ledger;
use daybook_recon::model::{IngestBatch, RecordKind};
use daybook_recon::store::RecordStore;
use daybook_recon::{IngestConfig, Ingestor};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Supplier order sheet ingestion and daily records")]
#[command(version)]
struct Cli {
    /// SQLite database path (default: user data dir)
    #[arg(long, global = true, env = "DAYBOOK_DB")]
    db: Option<PathBuf>,

    /// TOML config overriding the standard sheet layout
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a workbook and print the per-sheet summary
    #[command(after_help = "\
Examples:
  daybook load order-0812.xlsx
  daybook load upload.tmp --name 주문입고-0812.xls --json")]
    Load {
        /// Workbook file (.xlsx, .xls, HTML-masquerading .xls)
        file: PathBuf,

        /// Display filename when `file` is a temp path
        #[arg(long)]
        name: Option<String>,

        /// Print the full load outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a workbook and save one sheet's data rows as daily records
    #[command(after_help = "\
Examples:
  daybook ingest receipt-0812.xls --date 2024-01-05 --kind payment
  daybook ingest order.xlsx --date 2024-01-05 --kind reorder --sheet 0812")]
    Ingest {
        file: PathBuf,

        /// Record date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Record kind: payment or reorder
        #[arg(long)]
        kind: RecordKind,

        /// Sheet name (default: first loaded sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Operator recorded as creator
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Persist a full sheet for a date, recomputing sums and flags first
    SaveSheet {
        file: PathBuf,

        #[arg(long)]
        date: String,

        #[arg(long)]
        kind: RecordKind,

        #[arg(long)]
        sheet: Option<String>,

        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// List records for a date with per-company totals
    List {
        #[arg(long)]
        date: String,

        #[arg(long)]
        kind: RecordKind,

        #[arg(long)]
        json: bool,
    },

    /// List every date that has records of a kind
    Dates {
        #[arg(long)]
        kind: RecordKind,
    },

    /// Show per-company running totals
    Totals,

    /// Recompute sums and difference flags for every stored sheet
    Sweep,

    /// Delete ALL records of a kind (irreversible)
    Clear {
        #[arg(long)]
        kind: RecordKind,

        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Export a stored sheet to .xlsx
    Export {
        #[arg(long)]
        date: String,

        #[arg(long)]
        kind: RecordKind,

        #[arg(long)]
        sheet: String,

        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Load { file, name, json } => {
            let display = display_name(&file, name.as_deref());
            let mut ingestor = Ingestor::new(config);
            let outcome = ingestor.load_workbook(&ExcelSource, &file, &display);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).map_err(|e| e.to_string())?
                );
            } else if outcome.success {
                println!(
                    "{display}: loaded {} of {} sheet(s)",
                    outcome.sheets.len(),
                    outcome.total_sheets
                );
                for loaded in &outcome.sheets {
                    let meta = &loaded.meta;
                    let ambiguous = if meta.ambiguous { " (ambiguous)" } else { "" };
                    println!(
                        "  {}  {} rows x {} cols  [{}]{ambiguous}",
                        meta.sheet_name, meta.rows, meta.cols, meta.kind
                    );
                }
            }
            if !outcome.success {
                return Err(outcome.error.unwrap_or_else(|| "load failed".into()));
            }
            Ok(())
        }

        Commands::Ingest {
            file,
            date,
            kind,
            sheet,
            user,
        } => {
            let mut store = open_store(cli.db.as_deref())?;
            let display = display_name(&file, None);
            let mut ingestor = Ingestor::new(config.clone());
            let outcome = ingestor.load_workbook(&ExcelSource, &file, &display);
            if !outcome.success {
                return Err(outcome.error.unwrap_or_else(|| "load failed".into()));
            }
            let loaded = pick_sheet(&outcome.sheets, sheet.as_deref())?;

            let rows = loaded.sheet.rows.clone();
            let receipt = ledger::ingest(
                &mut store,
                &config.columns,
                &IngestBatch {
                    date,
                    kind,
                    header_rows: loaded.sheet.header_snapshot(),
                    rows: rows
                        .get(HEADER_SNAPSHOT_ROWS..)
                        .map(<[_]>::to_vec)
                        .unwrap_or_default(),
                    created_by: user,
                },
            )
            .map_err(|e| e.to_string())?;

            println!("{}", receipt.message);
            Ok(())
        }

        Commands::SaveSheet {
            file,
            date,
            kind,
            sheet,
            user,
        } => {
            let mut store = open_store(cli.db.as_deref())?;
            let display = display_name(&file, None);
            let mut ingestor = Ingestor::new(config.clone());
            let outcome = ingestor.load_workbook(&ExcelSource, &file, &display);
            if !outcome.success {
                return Err(outcome.error.unwrap_or_else(|| "load failed".into()));
            }
            let loaded = pick_sheet(&outcome.sheets, sheet.as_deref())?;

            let mut sheet = loaded.sheet.clone();
            ledger::save_sheet(&mut store, &config.aggregate, &date, kind, &mut sheet, &user)
                .map_err(|e| e.to_string())?;
            println!("saved sheet '{}' for {date} ({kind})", sheet.name);
            Ok(())
        }

        Commands::List { date, kind, json } => {
            let store = open_store(cli.db.as_deref())?;
            let date = parse_date(&date)?;
            let records = store.records_by_date(date, kind).map_err(|e| e.to_string())?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?
                );
                return Ok(());
            }

            let total: f64 = records.iter().map(|r| r.amount).sum();
            println!("{} {kind} record(s) for {date}, total {total}", records.len());
            for record in &records {
                println!(
                    "  {}  {} {} {}  qty {}  amount {}",
                    record.company,
                    record.product_code.as_deref().unwrap_or("-"),
                    record.product_name.as_deref().unwrap_or("-"),
                    record.product_option.as_deref().unwrap_or("-"),
                    record.quantity,
                    record.amount
                );
            }
            Ok(())
        }

        Commands::Dates { kind } => {
            let store = open_store(cli.db.as_deref())?;
            for date in store.distinct_dates(kind).map_err(|e| e.to_string())? {
                println!("{date}");
            }
            Ok(())
        }

        Commands::Totals => {
            let store = open_store(cli.db.as_deref())?;
            for total in store.company_totals().map_err(|e| e.to_string())? {
                println!(
                    "{}  {} record(s)  total {}  last {}",
                    total.company, total.record_count, total.total_amount, total.last_date
                );
            }
            Ok(())
        }

        Commands::Sweep => {
            let mut store = open_store(cli.db.as_deref())?;
            let touched =
                ledger::sweep(&mut store, &config.aggregate).map_err(|e| e.to_string())?;
            println!("recomputed {touched} stored sheet(s)");
            Ok(())
        }

        Commands::Clear { kind, yes } => {
            if !yes {
                return Err(format!(
                    "refusing to delete all {kind} records without --yes"
                ));
            }
            let mut store = open_store(cli.db.as_deref())?;
            let deleted = store.delete_kind(kind).map_err(|e| e.to_string())?;
            println!("deleted {deleted} {kind} record(s)");
            Ok(())
        }

        Commands::Export {
            date,
            kind,
            sheet,
            output,
        } => {
            let store = open_store(cli.db.as_deref())?;
            let date = parse_date(&date)?;
            let stored = store
                .stored_sheet(date, kind, &sheet)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no stored sheet '{sheet}' for {date} ({kind})"))?;
            export::export_sheet(&stored.rows, &stored.sheet_name, &output)?;
            println!("exported to {}", output.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<IngestConfig, String> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
            IngestConfig::from_toml(&text).map_err(|e| e.to_string())
        }
        None => Ok(IngestConfig::default()),
    }
}

fn open_store(db: Option<&std::path::Path>) -> Result<SqliteStore, String> {
    let path = match db {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = dirs::data_dir()
                .ok_or_else(|| "cannot determine user data dir; pass --db".to_string())?
                .join("daybook");
            std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
            dir.join("daybook.db")
        }
    };
    SqliteStore::open(&path).map_err(|e| e.to_string())
}

fn display_name(file: &std::path::Path, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string()),
    }
}

fn pick_sheet<'a>(
    sheets: &'a [daybook_recon::model::LoadedSheet],
    name: Option<&str>,
) -> Result<&'a daybook_recon::model::LoadedSheet, String> {
    match name {
        Some(name) => sheets
            .iter()
            .find(|s| s.meta.sheet_name == name)
            .ok_or_else(|| format!("sheet '{name}' not found in workbook")),
        None => sheets.first().ok_or_else(|| "workbook has no sheets".into()),
    }
}

fn parse_date(value: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("cannot parse date '{value}' (expected YYYY-MM-DD)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_kind_parses_as_clap_value() {
        let cli = Cli::parse_from([
            "daybook", "list", "--date", "2024-01-05", "--kind", "payment",
        ]);
        match cli.command {
            Commands::List { kind, .. } => assert_eq!(kind, RecordKind::Payment),
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn display_name_prefers_override() {
        let path = std::path::Path::new("/tmp/upload.tmp");
        assert_eq!(display_name(path, Some("order-0812.xls")), "order-0812.xls");
        assert_eq!(display_name(path, None), "upload.tmp");
    }
}
