//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use innscan_browser::{PdfArchiver, Waiter, WebDriverLauncher};
use innscan_core::{IdOutcome, Pipeline, ProgressReporter, RunSummary, Stage, read_ids};
use innscan_shared::{AppConfig, BrowserConfig, Inn, WaitConfig, init_config};
use innscan_sources::{DadataAdapter, FedresursAdapter, KadArbitrAdapter};
use innscan_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// innscan: bankruptcy and registry lookup for lists of taxpayer IDs.
#[derive(Parser)]
#[command(
    name = "innscan",
    version,
    about = "Look up taxpayer IDs in the bankruptcy, court and business registries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `run`, asking for the ID table.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every ID in a CSV table and store the results.
    Run {
        /// CSV file with an ID column. Asked for on stdin when omitted.
        input: Option<PathBuf>,
    },

    /// Print the stored record for one ID, or list every stored ID.
    Show {
        /// 10- or 12-digit taxpayer ID. Lists all records when omitted.
        inn: Option<String>,
    },

    /// Remove the stored record for one ID and all of its cases.
    Delete {
        /// 10- or 12-digit taxpayer ID.
        inn: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

impl Cli {
    fn is_run(&self) -> bool {
        matches!(self.command, None | Some(Command::Run { .. }))
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Batch runs also log to the configured run-log file, which is truncated
/// first so it only ever holds the latest run.
pub(crate) fn init_tracing(cli: &Cli, config: &AppConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let filter = match cli.verbose {
        0 => "innscan=info",
        1 => "innscan=debug",
        _ => "innscan=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let run_log = if cli.is_run() {
        let path = Path::new(&config.paths.log_file);
        let file = std::fs::File::create(path)
            .wrap_err_with(|| format!("cannot create run log {}", path.display()))?;
        Some(Mutex::new(file))
    } else {
        None
    };

    let (terminal, file) = match cli.log_format {
        LogFormat::Text => (
            fmt::layer().with_target(false).boxed(),
            run_log.map(|w| {
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(w)
                    .boxed()
            }),
        ),
        LogFormat::Json => (
            fmt::layer().json().boxed(),
            run_log.map(|w| fmt::layer().json().with_writer(w).boxed()),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(terminal)
        .with(file)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        None => cmd_run(&config, None).await,
        Some(Command::Run { input }) => cmd_run(&config, input).await,
        Some(Command::Show { inn: Some(inn) }) => cmd_show(&config, &inn).await,
        Some(Command::Show { inn: None }) => cmd_list(&config).await,
        Some(Command::Delete { inn }) => cmd_delete(&config, &inn).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, input: Option<PathBuf>) -> Result<()> {
    let input = match input {
        Some(path) => path,
        None => prompt_input_path()?,
    };

    let ids = read_ids(&input, &config.input.id_column)?;
    if ids.is_empty() {
        return Err(eyre!(
            "no IDs in column '{}' of {}",
            config.input.id_column,
            input.display()
        ));
    }
    info!(input = %input.display(), count = ids.len(), "loaded ID list");

    let waiter = Waiter::new(WaitConfig::from(config));
    let launcher = WebDriverLauncher::new(&BrowserConfig::try_from(config)?)?;
    let archiver = PdfArchiver::new(
        launcher.clone(),
        waiter,
        Duration::from_millis(config.browser.archive_settle_ms),
    );

    let primary = FedresursAdapter::new(
        launcher.clone(),
        archiver,
        waiter,
        &config.sources.primary_url,
        &config.paths.archive_dir,
    );
    let cases = KadArbitrAdapter::new(launcher.clone(), waiter, &config.sources.case_url);
    let enrichment = DadataAdapter::new(launcher, waiter, &config.sources.enrichment_url);

    let storage = Storage::open(Path::new(&config.paths.database)).await?;
    let pipeline = Pipeline::new(primary, cases, enrichment, storage);

    let progress = CliProgress::new(ids.len());
    let summary = pipeline.run(&ids, &progress).await;

    println!();
    println!("  Run finished.");
    println!("  Run ID:      {}", summary.run_id);
    println!("  Started:     {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  IDs:         {}", summary.total);
    println!("  Saved:       {}", summary.saved);
    println!("  Not found:   {}", summary.not_found);
    println!("  Invalid:     {}", summary.invalid);
    println!("  Save failed: {}", summary.persist_failed);
    if summary.failed > 0 {
        println!("  Failed:      {}", summary.failed);
    }
    if summary.duplicates > 0 {
        println!("  Duplicates:  {}", summary.duplicates);
    }
    println!("  Elapsed:     {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Database:    {}", config.paths.database);
    println!("  Log:         {}", config.paths.log_file);
    println!();

    Ok(())
}

/// Ask for the ID table on stdin.
fn prompt_input_path() -> Result<PathBuf> {
    print!("Path to the ID table (CSV): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    // Paths dragged into a terminal arrive quoted.
    let path = line.trim().trim_matches(|c| c == '"' || c == '\'');
    if path.is_empty() {
        return Err(eyre!("no input file given"));
    }
    Ok(PathBuf::from(path))
}

async fn cmd_show(config: &AppConfig, inn: &str) -> Result<()> {
    let inn = Inn::parse(inn)?;
    let storage = Storage::open_readonly(Path::new(&config.paths.database)).await?;

    let Some(entity) = storage.get_entity(inn.as_str()).await? else {
        return Err(eyre!("no stored record for {inn}"));
    };
    let cases = storage.list_cases(inn.as_str()).await?;

    let field = |label: &str, value: Option<&str>| {
        println!("  {label:<19} {}", value.unwrap_or("-"));
    };

    println!();
    field("INN:", Some(entity.inn.as_str()));
    field("Name:", entity.display_name.as_deref());
    field("OGRN:", entity.ogrn.as_deref());
    field("Full name:", entity.name_full.as_deref());
    field("Short name:", entity.name_short.as_deref());
    field("Responsible person:", entity.responsible_person.as_deref());
    field("OKATO:", entity.okato.as_deref());
    field("OKTMO:", entity.oktmo.as_deref());
    field("OKPO:", entity.okpo.as_deref());
    field("Status:", entity.status.as_deref());
    field("Address:", entity.address.as_deref());
    field("Archive:", entity.archive_path.as_deref());
    field(
        "Cases:",
        Some(entity.case_numbers.as_str()).filter(|s| !s.is_empty()),
    );

    for case in &cases {
        println!();
        println!("  Case {}", case.case_number);
        field("  Judge:", case.judge_name.as_deref());
        field("  Claimant:", case.claimant_name.as_deref());
        field("  Creditors:", Some(case.creditors.as_str()).filter(|s| !s.is_empty()));
        field(
            "  Third parties:",
            Some(case.third_parties.as_str()).filter(|s| !s.is_empty()),
        );
        field("  Others:", Some(case.others.as_str()).filter(|s| !s.is_empty()));
    }
    println!();

    Ok(())
}

async fn cmd_list(config: &AppConfig) -> Result<()> {
    let storage = Storage::open_readonly(Path::new(&config.paths.database)).await?;
    let entities = storage.list_entities().await?;

    if entities.is_empty() {
        println!("No stored records.");
        return Ok(());
    }

    println!();
    for entity in &entities {
        println!(
            "  {:<12} {:<40} {}",
            entity.inn,
            entity.display_name.as_deref().unwrap_or("-"),
            entity.case_numbers
        );
    }
    println!();
    println!("  {} records", entities.len());
    println!();

    Ok(())
}

async fn cmd_delete(config: &AppConfig, inn: &str) -> Result<()> {
    let inn = Inn::parse(inn)?;
    let storage = Storage::open(Path::new(&config.paths.database)).await?;

    if storage.delete_entity(inn.as_str()).await? {
        info!(inn = %inn, "deleted stored record");
        println!("Deleted {inn} and its cases.");
    } else {
        println!("No stored record for {inn}.");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, id: &str, stage: Stage) {
        self.bar.set_message(format!("{id}: {stage}"));
    }

    fn id_started(&self, id: &str, current: usize, _total: usize) {
        self.bar.set_position(current.saturating_sub(1) as u64);
        self.bar.set_message(id.to_string());
    }

    fn id_finished(&self, id: &str, outcome: IdOutcome) {
        self.bar.inc(1);
        let verdict = match outcome {
            IdOutcome::Saved { cases, .. } => format!("saved ({cases} cases)"),
            IdOutcome::Invalid => "invalid ID".to_string(),
            IdOutcome::NotFound => "not in registry".to_string(),
            IdOutcome::PersistFailed => "save failed".to_string(),
            IdOutcome::Failed => "failed, see log".to_string(),
        };
        self.bar.set_message(format!("{id}: {verdict}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
