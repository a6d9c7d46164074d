//! Stepwise CLI - run YAML step plans in order

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use stepwise::{FixSuggestion, Plan, Runner, RunnerConfig, StepwiseError};

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Stepwise - run step plans one step at a time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan file
    Run {
        /// Path to the plan YAML file
        file: String,

        /// Print the ordered results as a JSON array
        #[arg(long)]
        json: bool,

        /// Dump the event log as JSON to stderr after the run
        #[arg(long)]
        events: bool,

        /// Shell used for exec steps
        #[arg(long)]
        shell: Option<String>,

        /// Timeout for each exec step, in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Validate a plan file (parse only)
    Validate {
        /// Path to the plan YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            json,
            events,
            shell,
            timeout,
        } => run_plan(&file, json, events, shell, timeout).await,
        Commands::Validate { file } => validate_plan(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run_plan(
    file: &str,
    json: bool,
    events: bool,
    shell: Option<String>,
    timeout: Option<u64>,
) -> Result<(), StepwiseError> {
    let yaml = tokio::fs::read_to_string(file).await?;
    let plan = Plan::parse(&yaml)?;

    let mut config = RunnerConfig::from_env()?;
    if let Some(shell) = shell {
        config = config.with_shell(shell);
    }
    if let Some(secs) = timeout {
        config = config.with_exec_timeout(RunnerConfig::checked_timeout(secs)?);
    }

    if !json {
        println!(
            "{} Running {} steps | shell: {} | timeout: {}s",
            "→".cyan(),
            plan.steps.len().to_string().cyan().bold(),
            config.shell.cyan(),
            config.exec_timeout.as_secs()
        );
    }

    let runner = Runner::new(config);
    let result = runner.run(&plan).await;

    if events {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&runner.event_log().to_json())?
        );
    }

    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.values())?);
    } else {
        for output in &outcome.outputs {
            println!("  {} {} {}", "✓".green(), output.id.bold(), display_value(&output.output));
        }
        println!(
            "{} {} results in {}ms",
            "✓".green(),
            outcome.len(),
            outcome.duration_ms
        );
    }

    Ok(())
}

fn validate_plan(file: &str) -> Result<(), StepwiseError> {
    let plan = Plan::from_file(file)?;

    println!("{} Plan '{}' is valid", "✓".green(), file);
    println!("  Steps: {}", plan.steps.len());
    for step in &plan.steps {
        let contained = if step.contain { " (contained)" } else { "" };
        println!("  - {} [{}]{}", step.id, step.action.kind(), contained);
    }

    Ok(())
}

/// Strings print raw, everything else as compact JSON
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
