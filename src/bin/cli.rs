use clap::{Args, Parser, Subcommand, ValueEnum};
use gantt_dates::calendar::WorkCalendar;
use gantt_dates::persistence::{ExportError, write_rows_csv};
use gantt_dates::validation::{check_date_order, check_structure_with_limit};
use gantt_dates::{
    BuildError, CalendarError, ConfigError, GanttRow, PredecessorGraph, RepositoryError,
    ResolverConfig, ValidationError, RowOrder, TaskId, TaskRepository, TaskTree, TreeBuilder, WorkCalendarConfig,
    gantt_rows, load_config, load_snapshot_from_json, resolve_trees, rows_to_dataframe,
};
use polars::prelude::{AnyValue, DataFrame, PolarsError};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_FAILURE: u8 = 1;
const EXIT_PREDECESSOR_CYCLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "gantt", version, about = "Resolve Gantt task dates from a task snapshot")]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate start/end dates and print one row per visible task
    Resolve {
        #[command(flatten)]
        source: Source,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Refuse to resolve when predecessor links form a cycle or a task
        /// starts after it ends
        #[arg(long)]
        strict: bool,

        /// List tasks parent first instead of by date
        #[arg(long)]
        hierarchy: bool,
    },

    /// Check containment depth and predecessor cycles without resolving
    Check {
        #[command(flatten)]
        source: Source,
    },
}

#[derive(Args, Debug)]
struct Source {
    /// JSON snapshot: {"calendar": ..., "tasks": [...]}
    snapshot: Option<PathBuf>,

    /// SQLite database written by `SqliteTaskRepository`
    #[cfg(feature = "sqlite")]
    #[arg(long, conflicts_with = "snapshot")]
    db: Option<PathBuf>,

    /// Only the subtree under this task; all root tasks otherwise
    #[arg(long)]
    root: Option<TaskId>,

    /// Resolver config file (JSON)
    #[arg(long, env = "GANTT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("table error: {0}")]
    Table(#[from] PolarsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no task source given")]
    NoSource,
}

struct Loaded {
    trees: Vec<TaskTree>,
    calendar: WorkCalendar,
    config: ResolverConfig,
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

type Opened = (Box<dyn TaskRepository>, Option<WorkCalendarConfig>);

fn open_source(source: &Source) -> Result<Opened, CliError> {
    #[cfg(feature = "sqlite")]
    {
        if let Some(path) = &source.db {
            debug!(path = %path.display(), "opening sqlite repository");
            let repository = gantt_dates::SqliteTaskRepository::open(path)?;
            return Ok((Box::new(repository), None));
        }
    }
    let path = source.snapshot.as_ref().ok_or(CliError::NoSource)?;
    debug!(path = %path.display(), "loading snapshot");
    let snapshot = load_snapshot_from_json(path)?;
    let calendar = snapshot.calendar.clone();
    Ok((Box::new(snapshot.into_repository()?), calendar))
}

fn load(source: &Source) -> Result<Loaded, CliError> {
    let config = match &source.config {
        Some(path) => load_config(path)?,
        None => ResolverConfig::default(),
    };
    let (repository, snapshot_calendar) = open_source(source)?;
    let calendar = config.calendar(snapshot_calendar.as_ref())?;
    let builder = TreeBuilder::new(repository.as_ref());
    let trees = match source.root {
        Some(root) => vec![builder.build(root)?],
        None => builder.build_all()?,
    };
    info!(trees = trees.len(), "task trees built");
    Ok(Loaded {
        trees,
        calendar,
        config,
    })
}

fn cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row| {
            columns
                .iter()
                .map(|col| col.get(row).map(|av| cell(&av)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = names.iter().map(|n| n.len()).collect();
    for row in &cells {
        for (ci, s) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(s.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(w + 2));
        sep.push('+');
    }

    let line = |values: &[String]| {
        let mut out = String::from("|");
        for (ci, s) in values.iter().enumerate() {
            out.push(' ');
            out.push_str(s);
            out.push_str(&" ".repeat(widths[ci].saturating_sub(s.chars().count())));
            out.push_str(" |");
        }
        out
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&line(&names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn write_rows(rows: &[GanttRow], format: Format, out: &mut dyn Write) -> Result<(), CliError> {
    match format {
        Format::Table => {
            let df = rows_to_dataframe(rows)?;
            out.write_all(render_df_as_text_table(&df).as_bytes())?;
        }
        Format::Csv => write_rows_csv(rows, &mut *out)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Report predecessor cycles on stderr; true when any were found.
fn report_cycles(trees: &[TaskTree]) -> bool {
    let mut found = false;
    for tree in trees {
        for cycle in PredecessorGraph::build(tree).cycles() {
            let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            eprintln!("predecessor cycle among tasks {}", ids.join(", "));
            found = true;
        }
    }
    found
}

fn run_resolve(
    source: &Source,
    format: Format,
    output: Option<&PathBuf>,
    strict: bool,
    hierarchy: bool,
) -> Result<ExitCode, CliError> {
    let Loaded {
        mut trees,
        calendar,
        config,
    } = load(source)?;

    if strict || config.strict_cycles {
        if report_cycles(&trees) {
            return Ok(ExitCode::from(EXIT_PREDECESSOR_CYCLE));
        }
        for tree in &trees {
            check_date_order(tree)?;
        }
    }

    let resolved: usize = resolve_trees(&mut trees, &calendar).iter().sum();
    debug!(resolved, "nodes resolved");

    let order = if hierarchy {
        RowOrder::Hierarchy
    } else {
        RowOrder::Schedule
    };
    let rows: Vec<GanttRow> = trees
        .iter_mut()
        .flat_map(|tree| gantt_rows(tree, &calendar, order))
        .collect();

    match output {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            write_rows(&rows, format, &mut file)?;
            info!(path = %path.display(), rows = rows.len(), "rows written");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_rows(&rows, format, &mut lock)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(source: &Source) -> Result<ExitCode, CliError> {
    let Loaded { trees, config, .. } = load(source)?;
    let mut structure_ok = true;
    for tree in &trees {
        if !check_structure_with_limit(tree, tree.root(), config.max_structure_depth) {
            let root = tree.node(tree.root());
            eprintln!(
                "task {} exceeds depth {} or contains itself",
                root.id(),
                config.max_structure_depth
            );
            structure_ok = false;
        }
    }
    let cycles = report_cycles(&trees);
    if !structure_ok {
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    if cycles {
        return Ok(ExitCode::from(EXIT_PREDECESSOR_CYCLE));
    }
    println!("ok: {} tree(s) checked", trees.len());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let result = match &cli.command {
        Command::Resolve {
            source,
            format,
            output,
            strict,
            hierarchy,
        } => run_resolve(source, *format, output.as_ref(), *strict, *hierarchy),
        Command::Check { source } => run_check(source),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
