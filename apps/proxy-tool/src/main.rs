//! Command-line front end for the data proxy.
//!
//! Loads a table from a JSON document, pages or filters it, applies edits
//! through the proxy, optionally commits them, and prints the visible rows.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use data_proxy_core::{
    DataProxy, MemoryTable, ProxyConfig, ResyncProgress, ScanExecutor, TableDocument, Value,
};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the proxy tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Table document (JSON with `name`, `columns` and `rows`)
    table: PathBuf,

    /// Proxy configuration file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows per page, 0 for all rows
    #[arg(long)]
    sample_size: Option<usize>,

    /// First base row of the page
    #[arg(long)]
    sample_start: Option<usize>,

    /// Filter text, e.g. "age > 30" or "ORDER BY name"
    #[arg(long)]
    filter: Option<String>,

    /// Order by this column (0-based); repeat to flip direction
    #[arg(long)]
    order: Vec<usize>,

    /// Edit a visible cell: ROW:COLUMN=JSON, COLUMN by name or number
    #[arg(long = "set", value_name = "ROW:COLUMN=JSON")]
    edits: Vec<String>,

    /// Mark a visible row for deletion
    #[arg(long = "delete", value_name = "ROW")]
    deletes: Vec<usize>,

    /// Append a row given as a JSON array; null asks for the column default
    #[arg(long = "append", value_name = "JSON")]
    appends: Vec<String>,

    /// Write pending changes back to the table
    #[arg(long)]
    commit: bool,

    /// Save the table document here after committing
    #[arg(long)]
    out: Option<PathBuf>,

    /// Resync page changes in steps instead of at once
    #[arg(long)]
    defer_sync: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Cell edit parsed from `ROW:COLUMN=JSON`.
#[derive(Debug, Clone, PartialEq)]
struct Edit {
    row: usize,
    column: String,
    value: Value,
}

fn parse_edit(text: &str) -> Result<Edit> {
    let (target, json) = text
        .split_once('=')
        .with_context(|| format!("edit '{}' lacks '='", text))?;
    let (row, column) = target
        .split_once(':')
        .with_context(|| format!("edit '{}' lacks ROW:COLUMN", text))?;
    Ok(Edit {
        row: row.trim().parse().context("bad row number")?,
        column: column.trim().to_string(),
        value: serde_json::from_str(json).with_context(|| format!("bad value in '{}'", text))?,
    })
}

fn resolve_column(proxy: &DataProxy<'_>, column: &str) -> Result<usize> {
    if let Ok(index) = column.parse::<usize>() {
        return Ok(index);
    }
    proxy
        .columns()
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(column))
        .with_context(|| format!("no column named '{}'", column))
}

fn load_config(args: &Args) -> Result<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ProxyConfig::from_json_str(&text)?
        }
        None => ProxyConfig::default(),
    };
    if let Some(size) = args.sample_size {
        config.sample_size = size;
    }
    if let Some(start) = args.sample_start {
        config.sample_start = start;
    }
    config.defer_sync |= args.defer_sync;
    Ok(config)
}

fn render_row(proxy: &DataProxy<'_>, row: usize, columns: &[usize]) -> Result<String> {
    let mut flags = String::new();
    if proxy.row_is_new(row) {
        flags.push('N');
    }
    if proxy.row_is_marked_delete(row) {
        flags.push('D');
    } else if proxy.row_has_changed(row) && !proxy.row_is_new(row) {
        flags.push('M');
    }
    let values = proxy.get_values(row, columns)?;
    Ok(format!(
        "{:>5} {:<2} {}",
        row,
        flags,
        serde_json::to_string(&values)?
    ))
}

/// Runs the tool and returns the lines to print.
fn run(args: &Args) -> Result<Vec<String>> {
    let text = fs::read_to_string(&args.table)
        .with_context(|| format!("reading {}", args.table.display()))?;
    let document: TableDocument = serde_json::from_str(&text).context("parsing table document")?;
    let table = MemoryTable::from_document(document)?;
    let config = load_config(args)?;
    let proxy = DataProxy::with_config(&table, Arc::new(ScanExecutor), config)?;

    if args.defer_sync {
        let mut steps = 0;
        while proxy.tick() == ResyncProgress::Pending {
            steps += 1;
        }
        tracing::debug!("initial resync took {} steps", steps);
    }
    if let Some(filter) = &args.filter {
        proxy.set_filter_text(Some(filter))?;
    }
    for &col in &args.order {
        proxy.set_order_column(col)?;
    }

    for text in &args.edits {
        let edit = parse_edit(text)?;
        let col = resolve_column(&proxy, &edit.column)?;
        proxy
            .set_value(edit.row, col, edit.value)
            .with_context(|| format!("applying '{}'", text))?;
    }
    for &row in &args.deletes {
        proxy.mark_delete(row)?;
    }
    for json in &args.appends {
        let values: Vec<Option<Value>> =
            serde_json::from_str(json).with_context(|| format!("bad row '{}'", json))?;
        let row = proxy.append_values(values)?;
        tracing::debug!("appended proxy row {}", row);
    }

    let pending = proxy.count_modified();
    if args.commit && pending > 0 {
        proxy.apply_all().context("commit failed")?;
        tracing::info!("committed {} rows", pending);
    }
    if let Some(out) = &args.out {
        if proxy.is_modified() {
            bail!("refusing to save with {} uncommitted rows", proxy.count_modified());
        }
        let json = serde_json::to_string_pretty(&table.to_document())?;
        fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    }

    let columns: Vec<usize> = (0..proxy.column_count()).collect();
    let names: Vec<String> = proxy.columns().into_iter().map(|c| c.name).collect();
    let mut lines = vec![format!("{:>5} {:<2} {}", "row", "", names.join(", "))];
    for row in 0..proxy.row_count().unwrap_or(0) {
        lines.push(render_row(&proxy, row, &columns)?);
    }
    lines.push(format!(
        "{} rows shown, page {}..{}, {} pending",
        proxy.row_count().unwrap_or(0),
        proxy.sample_start(),
        proxy.sample_end().map_or("-".to_string(), |e| e.to_string()),
        proxy.count_modified()
    ));
    Ok(lines)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    for line in run(&args)? {
        println!("{}", line);
    }
    Ok(())
}
