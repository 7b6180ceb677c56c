use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use agent_provider::{CancelSignal, ToolPayload};
use anyhow::Context;
use clap::Parser;
use coding_agent::instructions::system_instructions_from_env;
use coding_agent::{providers, Agent, AgentConfig, AgentEvent, AgentOutcome};
use serde_json::Value;
use signal_hook::iterator::Signals;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Coding agent - answers a prompt by calling sandboxed file and script tools
#[derive(Parser, Debug)]
#[command(name = "coding-agent", version)]
struct Args {
    /// Prompt to send to the model
    prompt: String,

    /// Working directory the tools are confined to (defaults to the current directory)
    #[arg(short = 'w', long)]
    work_dir: Option<PathBuf>,

    /// Print token usage and log every tool call
    #[arg(short, long)]
    verbose: bool,

    /// Maximum number of model round-trips
    #[arg(long)]
    max_iters: Option<usize>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let work_dir = match args.work_dir {
        Some(path) => path,
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let mut config = AgentConfig::from_env().with_verbose(args.verbose);
    if let Some(max_iters) = args.max_iters {
        config = config.with_max_iters(max_iters);
    }

    let backend = providers::provider_from_env()?;
    let profile = backend.profile();
    tracing::info!(provider = %profile.provider_id, model = %profile.model_id, "provider ready");

    let cancel = cancel_on_signals()?;
    let agent = Agent::new(backend, config).with_instructions(system_instructions_from_env());
    let verbose = args.verbose;
    let report = agent.run_with(&args.prompt, &work_dir, Some(&cancel), &mut |event| {
        print_event(event, verbose)
    })?;

    let code = match report.outcome {
        AgentOutcome::Completed { .. } => ExitCode::SUCCESS,
        AgentOutcome::IterationLimit => {
            eprintln!(
                "Stopped after {} iterations without a final answer.",
                report.iterations
            );
            ExitCode::SUCCESS
        }
        AgentOutcome::Aborted { reason } => {
            eprintln!("Aborted: {reason}");
            ExitCode::FAILURE
        }
        AgentOutcome::Cancelled => {
            eprintln!("Cancelled.");
            ExitCode::from(130)
        }
    };

    Ok(code)
}

fn print_event(event: &AgentEvent, verbose: bool) {
    match event {
        AgentEvent::Usage { iteration, usage } if verbose => println!(
            "[iter {iteration}] prompt_tokens={} resp_tokens={}",
            usage.prompt_tokens, usage.response_tokens
        ),
        AgentEvent::ToolResult { result } => match &result.payload {
            ToolPayload::Result(value) => println!("Function Result: {}", display_value(value)),
            ToolPayload::Error(message) => println!("Function Error: {message}"),
        },
        AgentEvent::FinalText { text } => println!("Response Text: {text}"),
        _ => {}
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// First SIGINT/SIGTERM requests cancellation between iterations; a second one exits.
fn cancel_on_signals() -> anyhow::Result<CancelSignal> {
    let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([libc::SIGINT, libc::SIGTERM])
        .context("failed to register signal handlers")?;

    let flag = Arc::clone(&cancel);
    thread::Builder::new()
        .name("coding-agent-signals".to_string())
        .spawn(move || {
            for _ in signals.forever() {
                if flag.swap(true, Ordering::SeqCst) {
                    std::process::exit(130);
                }
                eprintln!("Cancelling after the current step; press Ctrl-C again to exit.");
            }
        })
        .context("failed to spawn signal thread")?;

    Ok(cancel)
}
