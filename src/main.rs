use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use journal_lookup::config::{
    find_settings_file, load_settings, AppInfo, LookupConfig, Settings, DEFAULT_LOOKUP_FILE,
};
use journal_lookup::models::DateWindow;
use journal_lookup::pipeline::{Pipeline, RunOutcome};
use journal_lookup::print_status;
use journal_lookup::report::{renderer_for, OutputFormat, ReportAssembler};
use journal_lookup::sources::{EntrezTransport, RetrievalClient};
use journal_lookup::ui::{self, FetchProgress, Status};
use journal_lookup::utils::HttpClient;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Journal Lookup - find new PubMed publications for a set of journals and topics
#[derive(Parser, Debug)]
#[command(name = "journal-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find new PubMed publications for a set of journals and topics and build a report", long_about = None)]
struct Cli {
    /// Lookup file: contact e-mail, journals and topics as three paragraphs
    #[arg(long, short, default_value = DEFAULT_LOOKUP_FILE)]
    config: PathBuf,

    /// Settings file (TOML)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// First entry date, YYYY/MM/DD (default: one week ago)
    #[arg(long, short)]
    start: Option<String>,

    /// Last entry date, YYYY/MM/DD (default: open-ended)
    #[arg(long, short)]
    end: Option<String>,

    /// Report file to create; an existing file is never overwritten
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(long, short)]
    format: Option<OutputFormat>,

    /// Fetch attempts per publication
    #[arg(long)]
    attempts: Option<u32>,

    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// Fold command-line overrides into the loaded settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(output) = &self.output {
            settings.report.output = output.clone();
        }
        if let Some(format) = self.format {
            settings.report.format = format;
        }
        if let Some(attempts) = self.attempts {
            settings.retrieval.max_attempts = attempts.max(1);
        }
    }

    fn log_level<'a>(&self, settings: &'a Settings) -> &'a str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => settings.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("journal_lookup={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().or_else(find_settings_file);
    let mut settings = load_settings(settings_path.as_deref())?;
    cli.apply(&mut settings);

    init_tracing(cli.log_level(&settings), cli.log_format);
    if let Some(path) = &settings_path {
        tracing::info!("Using settings file: {}", path.display());
    }

    let info = AppInfo::default();
    if !cli.quiet {
        ui::print_banner(&info);
    }

    let today = chrono::Local::now().date_naive();
    let window = DateWindow::from_args(cli.start.as_deref(), cli.end.as_deref(), today)?;
    let lookup = LookupConfig::load(&cli.config)
        .with_context(|| format!("Could not load lookup file {}", cli.config.display()))?;

    let retrieval = &settings.retrieval;
    let http = HttpClient::with_timeout(retrieval.timeout())?;
    let transport = EntrezTransport::new(http, lookup.contact.clone())
        .base_url(retrieval.base_url.clone())
        .tool(retrieval.tool.clone())
        .api_key(retrieval.api_key.clone())
        .retmax(retrieval.retmax);

    let pipeline = Pipeline::new(
        RetrievalClient::new(transport, retrieval.retry_policy()),
        ReportAssembler::new(info, settings.report.budgets, today),
        renderer_for(settings.report.format),
    );

    let progress = if cli.quiet {
        FetchProgress::hidden()
    } else {
        FetchProgress::for_stdout()
    };

    let outcome = pipeline
        .run(&lookup, window, &settings.report.output, &progress)
        .await?;

    if cli.quiet {
        return Ok(());
    }

    ui::print_divider();
    println!("{}", ui::stats_line(outcome.stats()));

    match outcome {
        RunOutcome::NoResults(_) => {
            print_status!(
                Status::Warning,
                "No results found for the chosen journals and topics"
            );
        }
        RunOutcome::Written {
            path,
            journal_counts,
            ..
        } => {
            ui::print_section("Journals Found");
            println!("{}", ui::journal_table(&journal_counts));
            print_status!(Status::Success, "Report written to {}", path.display());
        }
    }

    Ok(())
}
