use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use drift_report::classifier::DriftClassifier;
use drift_report::config::{
    Config, ConfigOverrides, DisplayFormat, ProfileOverrides, SinkKind, INTEGRATION_PROFILE,
};
use drift_report::diagnostics::TracingDiagnostics;
use drift_report::output::json::render_json;
use drift_report::output::table::render_profiles_table;
use drift_report::sink::{build_sink, OutputSink};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "drift-report",
    about = "Summarize infrastructure drift found in go test JSON logs"
)]
struct Cli {
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, global = true)]
    sink: Option<SinkKind>,
    #[arg(short, long, value_enum, global = true)]
    format: Option<DisplayFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct ProfileArgs {
    #[arg(short, long)]
    artifact: Option<String>,
    #[arg(short = 'k', long = "output-key")]
    output_key: Option<String>,
    #[arg(short, long = "indicator")]
    indicators: Vec<String>,
    #[arg(long = "default-message")]
    default_message: Option<String>,
    /// Single-newline join and indicator fallback of the oldest report format.
    #[arg(long)]
    legacy: bool,
    #[arg(long = "only-failed-tests")]
    only_failed_tests: bool,
}

impl From<ProfileArgs> for ProfileOverrides {
    fn from(value: ProfileArgs) -> Self {
        Self {
            artifact: value.artifact,
            output_key: value.output_key,
            indicators: (!value.indicators.is_empty()).then_some(value.indicators),
            default_message: value.default_message,
            legacy: value.legacy,
            only_failed_tests: value.only_failed_tests,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify one or more artifacts and publish their reports.
    Scan {
        #[arg(short = 'p', long = "profile")]
        profiles: Vec<String>,
        #[command(flatten)]
        overrides: ProfileArgs,
    },
    Profiles,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        sink: cli.sink,
        format: cli.format,
    });

    match cli.command {
        Commands::Scan {
            profiles,
            overrides,
        } => run_scan(&config, profiles, overrides.into()).await,
        Commands::Profiles => {
            match config.output.format {
                DisplayFormat::Json => println!("{}", render_json(&config.profiles)?),
                _ => println!("{}", render_profiles_table(&config)),
            }
            Ok(())
        }
        Commands::Config { init, show } => {
            handle_config_command(init, show, &config, &config_path)
        }
    }
}

async fn run_scan(
    config: &Config,
    mut profiles: Vec<String>,
    overrides: ProfileOverrides,
) -> Result<()> {
    if profiles.is_empty() {
        profiles.push(INTEGRATION_PROFILE.to_string());
    }
    profiles.sort();
    profiles.dedup();
    if profiles.len() > 1 && !overrides.is_empty() {
        bail!("profile overrides apply to a single --profile, got {}", profiles.len());
    }

    let mut classifiers = Vec::new();
    for name in &profiles {
        let mut profile = config.profile(name)?.clone();
        profile.apply_overrides(overrides.clone())?;
        classifiers.push(DriftClassifier::new(profile.resolve(name)?));
    }

    let labeled = classifiers.len() > 1;
    let sink: Arc<dyn OutputSink> =
        Arc::from(build_sink(config.output.sink, config.output.format, labeled));
    let mut tasks = JoinSet::new();
    for classifier in classifiers {
        let sink = Arc::clone(&sink);
        tasks.spawn(async move {
            let name = classifier.profile().name.clone();
            let diagnostics = TracingDiagnostics::new(name.clone());
            let result = classifier.run(sink.as_ref(), &diagnostics).await;
            (name, result)
        });
    }

    let total = profiles.len();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(report))) => {
                info!(profile = %name, drift = report.has_drift(), "profile published");
            }
            Ok((name, Err(err))) => failures.push(err.context(format!("profile {name} failed"))),
            Err(join_err) => failures.push(anyhow!("profile task aborted: {join_err}")),
        }
    }

    match failures.len() {
        0 => Ok(()),
        1 if total == 1 => Err(failures.remove(0)),
        n => {
            for failure in &failures {
                error!("{failure:#}");
            }
            Err(anyhow!("{n} of {total} profiles failed"))
        }
    }
}

fn handle_config_command(
    init: bool,
    show: bool,
    config: &Config,
    config_path: &Path,
) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}
