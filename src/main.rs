//! # Person Research Agent
//!
//! Researches a person and the company they work with from public web
//! sources, has a Gemini model summarize what was found, and prints a
//! briefing report.
//!
//! ## Quick Start
//! ```bash
//! # .env
//! GEMINI_API_KEY=...
//! JINA_API_KEY=...
//!
//! cargo run -- --person "Jane Doe" --company "Acme" --save
//! ```
//!
//! Run without arguments for an interactive prompt.

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Configuration management
mod config;

/// Research orchestration
mod agent;

/// Web search backends and query templates
mod search;

/// Model prompts and classification
mod analyzer;

/// Normalization and extraction
mod processor;

/// Report rendering and saving
mod report;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::agent::{ResearchAgent, ResearchMode, ResearchOutcome};
use crate::config::Config;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "person-research-agent",
    version,
    about = "Researches a person and their company and writes a briefing report",
    long_about = r#"
Person Research Agent - meeting prep from public sources.

For the given person and company it will:
  1. Search the web for biography, company and social content
  2. Have a Gemini model analyze each set of results
  3. Extract key points, opinions and contact handles
  4. Print a report (and optionally save it)

PREREQUISITES:
  GEMINI_API_KEY and JINA_API_KEY set in the environment or a .env file.

EXAMPLES:
  # Full research
  person-research-agent --person "Jane Doe" --company "Acme"

  # Quick profile, saved to reports/
  person-research-agent -p "Jane Doe" -c "Acme" --mode quick --save

  # Investor focus, saved to a chosen file
  person-research-agent -p "Jane Doe" -c "Example Ventures" -m investor -s -o jane.md

  # Interactive mode
  person-research-agent
"#
)]
struct Args {
    /// Person to research
    #[arg(short = 'p', long = "person", requires = "company")]
    person: Option<String>,

    /// Company name or website the person is affiliated with
    #[arg(short = 'c', long = "company", requires = "person")]
    company: Option<String>,

    /// Research mode
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = ResearchMode::Full)]
    mode: ResearchMode,

    /// Save the report to a file
    #[arg(short = 's', long = "save", default_value = "false")]
    save: bool,

    /// Output file for --save (defaults to a timestamped file in reports/)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Gemini model to use (overrides GEMINI_MODEL env var)
    #[arg(long = "model", env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Person research agent starting up...");

    // Configuration problems end the process before any request is made.
    let config = match load_config(args.model.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error");
            eprintln!("❌ Configuration Error: {}", e);
            eprintln!("Please check your .env file and API keys.");
            std::process::exit(1);
        }
    };

    info!(
        model = %config.model,
        search = %config.search_base_url,
        "Configuration loaded"
    );

    let agent = ResearchAgent::new(&config)?;

    let result = match (args.person.as_deref(), args.company.as_deref()) {
        (Some(person), Some(company)) => {
            tokio::select! {
                result = run_once(&agent, &args, person, company) => result,
                _ = tokio::signal::ctrl_c() => exit_interrupted("⏹️  Research interrupted by user"),
            }
        }
        _ => {
            tokio::select! {
                result = interactive_mode(&agent, stdin_lines()) => result,
                _ = tokio::signal::ctrl_c() => exit_interrupted("👋 Goodbye!"),
            }
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Research failed");
        eprintln!("\n❌ Error: {}", e);
    }

    result
}

/// Ends the process at once with status 0.
///
/// Returning from `main` would drop the runtime, which waits for any
/// in-flight blocking work first.
fn exit_interrupted(message: &str) -> ! {
    println!("\n{}", message);
    let _ = std::io::stdout().flush();
    std::process::exit(0)
}

fn load_config(model_override: Option<String>) -> Result<Config, config::ConfigError> {
    let mut config = Config::from_env()?;
    if let Some(model) = model_override {
        info!(model = %model, "Using model from command line");
        config.model = model;
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// FLAG MODE
// =============================================================================
async fn run_once(agent: &ResearchAgent, args: &Args, person: &str, company: &str) -> Result<()> {
    println!("🤖 Person Research Agent");
    println!("📝 Person: {}", person);
    println!("🏢 Company: {}", company);
    println!("⚙️  Mode: {}", args.mode);
    println!("{}", "-".repeat(50));

    let outcome = agent.run(args.mode, person, company).await;
    print_outcome(args.mode, &outcome);

    if args.save {
        save(agent, &outcome.report, person, args.output.as_deref());
    }

    info!("Research completed successfully");
    Ok(())
}

fn print_outcome(mode: ResearchMode, outcome: &ResearchOutcome) {
    println!("\n{}", "=".repeat(60));
    println!("RESEARCH RESULTS");
    println!("{}\n", "=".repeat(60));
    println!("{}", outcome.report);
    println!("{}", "=".repeat(60));

    if mode == ResearchMode::Full {
        println!("\n📊 Research Summary:");
        println!("- Person Type: {}", outcome.person_type);
        if let Some(company_type) = outcome.company_type {
            println!("- Company Type: {}", company_type);
        }
        if let Some(processed) = &outcome.processed {
            println!("- Sources Analyzed: {}", processed.metadata.total_sources);
        }
    }
}

fn save(agent: &ResearchAgent, report: &str, subject: &str, output: Option<&std::path::Path>) {
    match agent.save_report(report, subject, output) {
        Ok(path) => println!("\n💾 Report saved to: {}", path.display()),
        Err(e) => {
            warn!(error = %e, "Saving report failed");
            eprintln!("\n❌ Failed to save report: {}", e);
        }
    }
}

// =============================================================================
// INTERACTIVE MODE
// =============================================================================
async fn interactive_mode(agent: &ResearchAgent, mut lines: mpsc::Receiver<String>) -> Result<()> {
    println!("🤖 Person Research Agent - Interactive Mode");
    println!("{}", "=".repeat(50));

    loop {
        println!("\n{}", "-".repeat(30));

        let Some(person) = ask(&mut lines, "👤 Enter person name (or 'quit' to exit): ").await? else {
            break;
        };
        if is_quit(&person) {
            println!("👋 Goodbye!");
            break;
        }
        if person.is_empty() {
            println!("❌ Person name cannot be empty");
            continue;
        }

        let Some(company) = ask(&mut lines, "🏢 Enter company name: ").await? else {
            break;
        };
        if company.is_empty() {
            println!("❌ Company name cannot be empty");
            continue;
        }

        println!("\n📋 Research modes:");
        println!("1. Full Research (comprehensive)");
        println!("2. Quick Research (basic info)");
        println!("3. Investor Focus (for VCs)");
        let choice = ask(&mut lines, "Choose mode (1-3, default: 1): ")
            .await?
            .unwrap_or_default();
        let mode = ResearchMode::from_choice(&choice);

        println!("\n🔍 Starting {} research...", mode);
        println!("📝 Person: {}", person);
        println!("🏢 Company: {}", company);
        println!("{}", "-".repeat(50));

        let outcome = agent.run(mode, &person, &company).await;
        print_outcome(mode, &outcome);

        let answer = ask(&mut lines, "\n💾 Save report to file? (y/n): ")
            .await?
            .unwrap_or_default();
        if wants_save(&answer) {
            save(agent, &outcome.report, &person, None);
        }
    }

    Ok(())
}

/// Print a prompt and read one trimmed line. `None` at end of input.
async fn ask(lines: &mut mpsc::Receiver<String>, prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(lines.recv().await.map(|line| line.trim().to_string()))
}

fn stdin_lines() -> mpsc::Receiver<String> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

/// Forward lines from `reader` over a channel.
///
/// # Rust Concept: Detached Threads
///
/// The reader runs on a plain OS thread rather than Tokio's blocking pool.
/// Nothing joins it, so a read that never returns cannot keep the runtime
/// alive at shutdown.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Input stream closed");
                    break;
                }
            }
        }
    });
    rx
}

fn is_quit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q")
}

fn wants_save(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "y" | "yes")
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "--person", "Jane Doe", "--company", "Acme"]);

        assert_eq!(args.person.as_deref(), Some("Jane Doe"));
        assert_eq!(args.company.as_deref(), Some("Acme"));
        assert_eq!(args.mode, ResearchMode::Full);
        assert!(!args.save);
        assert!(args.output.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "test", "-p", "Jane", "-c", "Fund", "-m", "investor", "-s", "-o", "out/jane.md", "-v",
        ]);

        assert_eq!(args.mode, ResearchMode::Investor);
        assert!(args.save);
        assert_eq!(args.output, Some(PathBuf::from("out/jane.md")));
        assert!(args.verbose);
    }

    #[test]
    fn test_no_args_means_interactive() {
        let args = Args::parse_from(["test"]);

        assert!(args.person.is_none());
        assert!(args.company.is_none());
    }

    #[test]
    fn test_person_requires_company() {
        assert!(Args::try_parse_from(["test", "--person", "Jane"]).is_err());
        assert!(Args::try_parse_from(["test", "-m", "nonsense", "-p", "J", "-c", "A"]).is_err());
    }

    #[test]
    fn test_interactive_answers() {
        assert!(is_quit("QUIT"));
        assert!(is_quit("q"));
        assert!(!is_quit("Quentin"));
        assert!(wants_save("Yes"));
        assert!(!wants_save("n"));
        assert!(!wants_save(""));
    }

    /// Input that never produces a byte, like a terminal nobody types into.
    struct SilentInput;

    impl std::io::Read for SilentInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                std::thread::park();
            }
        }
    }

    #[tokio::test]
    async fn test_line_reader_forwards_lines() {
        let input = std::io::Cursor::new("Jane Doe\n  Acme  \n");
        let mut lines = spawn_line_reader(input);

        assert_eq!(ask(&mut lines, "").await.unwrap().as_deref(), Some("Jane Doe"));
        assert_eq!(ask(&mut lines, "").await.unwrap().as_deref(), Some("Acme"));
        assert_eq!(ask(&mut lines, "").await.unwrap(), None);
    }

    #[test]
    fn test_runtime_shutdown_not_blocked_by_pending_read() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let started = std::time::Instant::now();

        runtime.block_on(async {
            let mut lines = spawn_line_reader(std::io::BufReader::new(SilentInput));
            let pending =
                tokio::time::timeout(std::time::Duration::from_millis(50), lines.recv()).await;
            assert!(pending.is_err());
        });
        drop(runtime);

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
