//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dossier_core::{ProgressReporter, ResearchPipeline};
use dossier_shared::{
    AppConfig, DossierError, PhaseSummary, ResearchReport, Subject, Tier, init_config,
    load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::report::{render_json, render_markdown, write_report};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Dossier: research a person on the web and synthesize a report.
#[derive(Parser)]
#[command(
    name = "dossier",
    version,
    about = "Research a person across multiple search phases and synthesize a structured report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Research depth.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum TierArg {
    Basic,
    Deep,
}

impl From<TierArg> for Tier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Basic => Tier::Basic,
            TierArg::Deep => Tier::Deep,
        }
    }
}

/// What to print when no output directory is given.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a person and produce a dossier.
    Research {
        /// Full name of the person.
        name: String,

        /// Current or most relevant company.
        #[arg(long)]
        company: Option<String>,

        /// Job title or role.
        #[arg(long)]
        role: Option<String>,

        /// Known profile URL; used verbatim as the resolved identifier.
        #[arg(long)]
        profile_url: Option<String>,

        /// Research tier (defaults to `pipeline.default_tier` from config).
        #[arg(long)]
        tier: Option<TierArg>,

        /// Directory to write `<slug>-<id>.md` and `.json` into.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Stdout format when `--out` is not given.
        #[arg(long, default_value = "markdown")]
        format: OutputFormat,
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

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for the report.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dossier=info",
        1 => "dossier=debug",
        _ => "dossier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Research {
            name,
            company,
            role,
            profile_url,
            tier,
            out,
            format,
        } => {
            let args = ResearchArgs {
                name,
                company,
                role,
                profile_url,
                tier: tier.map(Tier::from),
                out,
                format,
            };
            cmd_research(args).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

struct ResearchArgs {
    name: String,
    company: Option<String>,
    role: Option<String>,
    profile_url: Option<String>,
    tier: Option<Tier>,
    out: Option<PathBuf>,
    format: OutputFormat,
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_research(args: ResearchArgs) -> Result<()> {
    let config = load_config()?;
    let subject = build_subject(&args)?;
    let tier = args.tier.unwrap_or(config.pipeline.default_tier);

    let pipeline = ResearchPipeline::from_config(
        config.search_provider(),
        config.language_model(),
        &config.pipeline,
    )?;

    info!(subject = %subject.name, %tier, "starting research");

    let reporter = CliProgress::new();
    let report = pipeline
        .research_with_progress(&subject, tier, &reporter)
        .await
        .map_err(describe_failure)?;

    match &args.out {
        Some(dir) => {
            let written = write_report(dir, &report)?;
            print_summary(&report);
            println!("  Report: {}", written.markdown.display());
            println!("  Data:   {}", written.json.display());
            println!();
        }
        None => match args.format {
            OutputFormat::Markdown => println!("{}", render_markdown(&report)),
            OutputFormat::Json => println!("{}", render_json(&report)?),
        },
    }

    Ok(())
}

fn build_subject(args: &ResearchArgs) -> Result<Subject> {
    let mut subject = Subject::new(args.name.as_str())?;
    if let Some(company) = &args.company {
        subject = subject.with_company(company.as_str());
    }
    if let Some(role) = &args.role {
        subject = subject.with_role(role.as_str());
    }
    if let Some(url) = &args.profile_url {
        subject = subject.with_known_identifier(url.as_str());
    }
    Ok(subject)
}

/// Turn a fatal pipeline error into an actionable message.
fn describe_failure(err: DossierError) -> color_eyre::Report {
    let hint = match &err {
        DossierError::Config { .. } => Some(
            "Set the API credentials named in the config (see `dossier config show`).".to_string(),
        ),
        DossierError::Synthesis { evidence_count, .. } => Some(format!(
            "{evidence_count} search results were gathered but no report could be written."
        )),
        _ => None,
    };
    match hint {
        Some(hint) => eyre!("{err}\n{hint}"),
        None => eyre!(err),
    }
}

fn print_summary(report: &ResearchReport) {
    println!();
    println!("  Dossier complete for {}", report.subject.name);
    println!("  ID:       {}", report.id);
    println!("  Tier:     {}", report.tier);
    println!("  Phases:   {}", report.phases_completed);
    println!("  Evidence: {}", report.evidence_count);
    if let Some(identifier) = &report.resolved_identifier {
        println!("  Profile:  {identifier}");
    }
    println!(
        "  Time:     {:.1}s",
        std::time::Duration::from_millis(report.elapsed_ms).as_secs_f64()
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn phase_finished(&self, summary: &PhaseSummary) {
        let line = match &summary.skipped {
            Some(reason) => format!("  {}: skipped ({reason})", summary.phase.label()),
            None => format!(
                "  {}: {} queries, {} results{}",
                summary.phase.label(),
                summary.queries_planned,
                summary.items_gathered,
                if summary.queries_failed > 0 {
                    format!(", {} failed", summary.queries_failed)
                } else {
                    String::new()
                }
            ),
        };
        self.spinner.println(line);
    }

    fn done(&self, _report: &ResearchReport) {
        self.spinner.finish_and_clear();
    }

    fn aborted(&self, _error: &DossierError) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
