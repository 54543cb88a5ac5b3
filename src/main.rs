use clap::{Parser, Subcommand};
use outline_split::config::{self, PartitionConfig};
use outline_split::index::PartitionIndex;
use outline_split::plan::{OutputSnapshot, Plan};
use outline_split::source::{PdfSource, SourceDocument, SourceOpener};
use outline_split::split::{self, SplitOptions, SplitSummary};
use outline_split::{flatten, outline, output, plan, validate};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "outline-split")]
#[command(about = "Split a PDF into one document per bookmark")]
#[command(long_about = "\
Split a PDF into one document per bookmark

Reads the document's bookmark outline (exported as XML or JSON), treats the
second level as groups and the third as sections, and writes every section's
page range to its own PDF:

  kb/
  ├── partitions.json                     # Page ranges of every artifact
  ├── Vol 1 - Architecture/
  │   ├── Part A - Overview/source.pdf    # Source pages [2, 9)
  │   └── Part B - Acronyms/source.pdf
  └── Vol 2 - Controller/
      └── Part A - Radio/source.pdf

Runs are idempotent: sections already on disk are skipped, so an interrupted
run is finished by running it again. 'validate' deletes corrupt artifacts so
the next 'split' regenerates them; 'repair' does both.

Run 'outline-split gen-config' to generate a documented outline-split.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./outline-split.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bookmark export (.xml or .json)
    #[arg(long, global = true)]
    outline: Option<PathBuf>,

    /// Source PDF
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output directory
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Maximum parallel workers (capped at the number of CPU cores)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Split at most this many sections in this run
    #[arg(long, global = true)]
    limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and split every section that is not on disk yet
    Split,
    /// Show the plan without writing anything
    Plan,
    /// Delete corrupt artifacts so the next split regenerates them
    Validate,
    /// Validate, then split whatever is missing
    Repair,
    /// Print a stock outline-split.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match &cli.command {
        Command::Plan => {
            let config = load_config(&cli)?;
            let prepared = prepare(&config)?;
            output::print_plan(&prepared.plan, prepared.total_pages);
        }
        Command::Split => {
            let config = load_config(&cli)?;
            let summary = run_split(&config)?;
            exit_on_failures(&summary)?;
        }
        Command::Validate => {
            let config = load_config(&cli)?;
            run_validate(&config.output.dir)?;
        }
        Command::Repair => {
            let config = load_config(&cli)?;
            println!("==> Stage 1: Validating {}", config.output.dir.display());
            run_validate(&config.output.dir)?;

            println!("==> Stage 2: Splitting missing sections");
            let summary = run_split(&config)?;
            exit_on_failures(&summary)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_validate(output_dir: &Path) -> Result<(), validate::ValidateError> {
    let report = validate::validate(output_dir)?;
    output::print_validation(&report, output_dir);
    Ok(())
}

/// Config file layered under command-line flags.
fn load_config(cli: &Cli) -> Result<PartitionConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Path::new("."))?,
    };
    if let Some(path) = &cli.outline {
        config.outline.path = Some(path.clone());
    }
    if let Some(path) = &cli.source {
        config.source.path = Some(path.clone());
    }
    if let Some(dir) = &cli.output {
        config.output.dir = dir.clone();
    }
    if cli.workers.is_some() {
        config.processing.max_processes = cli.workers;
    }
    if cli.limit.is_some() {
        config.processing.limit = cli.limit;
    }
    config.validate()?;
    Ok(config)
}

struct Prepared {
    source: PdfSource,
    total_pages: u32,
    plan: Plan,
}

/// Load the outline and source, then plan against the current output tree.
fn prepare(config: &PartitionConfig) -> Result<Prepared, Box<dyn std::error::Error>> {
    let outline_path = config
        .outline
        .path
        .as_deref()
        .ok_or("no outline given: pass --outline or set [outline] path")?;
    let source_path = config
        .source
        .path
        .as_deref()
        .ok_or("no source PDF given: pass --source or set [source] path")?;

    let root = outline::load_outline(outline_path)?;
    log::info!(
        "loaded outline \"{}\" ({} bookmarks)",
        root.name,
        root.node_count()
    );
    let flattened = flatten::flatten(&root);

    let source = PdfSource::new(source_path);
    let total_pages = source.open()?.page_count();
    log::info!("source {} has {} pages", source_path.display(), total_pages);

    let snapshot = OutputSnapshot::scan(&config.output.dir, &config.output.artifact_name);
    let mut plan = plan::plan(&flattened.descriptors, total_pages, &snapshot);
    plan.add_collisions(&flattened.collisions);
    if let Some(limit) = config.processing.limit {
        plan.limit(limit);
    }

    Ok(Prepared {
        source,
        total_pages,
        plan,
    })
}

fn run_split(config: &PartitionConfig) -> Result<SplitSummary, Box<dyn std::error::Error>> {
    let prepared = prepare(config)?;
    let output_dir = &config.output.dir;

    PartitionIndex::from_plan(
        &prepared.plan,
        prepared.total_pages,
        &config.output.artifact_name,
    )
    .save_if_changed(output_dir)?;

    let skipped = prepared.plan.already_present();
    if prepared.plan.tasks.is_empty() {
        println!("Nothing to split ({} already on disk)", skipped);
        return Ok(SplitSummary::default());
    }

    let options = SplitOptions {
        output_root: output_dir.clone(),
        artifact_name: config.output.artifact_name.clone(),
        workers: split::effective_workers(config.processing.max_processes),
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_split_event(&event) {
                println!("{}", line);
            }
        }
    });
    let summary = split::split(&prepared.source, &prepared.plan.tasks, &options, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;
    let summary = summary?;

    output::print_split_summary(&summary);
    if prepared.plan.deferred > 0 {
        println!(
            "{} sections deferred by the limit; run again to continue",
            prepared.plan.deferred
        );
    }
    Ok(summary)
}

fn exit_on_failures(summary: &SplitSummary) -> Result<(), Box<dyn std::error::Error>> {
    if summary.failed > 0 {
        return Err(format!("{} sections failed to split", summary.failed).into());
    }
    Ok(())
}
