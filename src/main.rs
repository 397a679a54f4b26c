use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use crossref_mcp::config::{load_config, Config};
use crossref_mcp::error::RequestError;
use crossref_mcp::mcp::McpServer;
use crossref_mcp::models::{BatchItemResult, Verdict};
use crossref_mcp::validator::ReferenceValidator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// CrossRef MCP - Validate academic references and format them as APA or Harvard citations
#[derive(Parser, Debug)]
#[command(name = "crossref-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate academic references against CrossRef and format citations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Maximum concurrent CrossRef requests
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Contact address for CrossRef's polite pool
    #[arg(long, global = true)]
    mailto: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for batch results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// JSON report (machine-readable)
    Json,
    /// One line per reference
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio unless --http is given)
    Serve {
        /// Serve streamable HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<String>,
    },

    /// Validate references and print the batch report
    #[command(alias = "v")]
    Validate {
        /// Reference strings to validate
        references: Vec<String>,

        /// Read additional references from a file, one per line
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Citation style (apa, harvard)
        #[arg(long, short, default_value = "apa")]
        style: String,

        /// Citation format (markdown, text)
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },

    /// Format a single reference or DOI
    #[command(alias = "f")]
    Format {
        /// Free-text reference
        #[arg(long, short)]
        reference: Option<String>,

        /// DOI to look up directly (takes precedence over --reference)
        #[arg(long, short)]
        doi: Option<String>,

        /// Citation style (apa, harvard)
        #[arg(long, short, default_value = "apa")]
        style: String,

        /// Citation format (markdown, text)
        #[arg(long, default_value = "markdown")]
        format: String,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    init_tracing(&cli);

    let command = cli.command.take();
    if let Some(Commands::Completions { shell }) = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "crossref-mcp", &mut std::io::stdout());
        return Ok(());
    }

    let config = effective_config(&cli)?;

    match command {
        None | Some(Commands::Completions { .. }) | Some(Commands::Serve { http: None }) => {
            let server = McpServer::new(build_validator(&config)?)?;
            tracing::info!("Running MCP server in stdio mode");
            server.run().await?;
        }

        Some(Commands::Serve { http: Some(addr) }) => {
            let server = McpServer::new(build_validator(&config)?)?;
            let (bound_addr, handle) = server.run_http(&addr).await?;
            tracing::info!("MCP server listening on {}", bound_addr);

            handle
                .await
                .map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
        }

        Some(Commands::Validate {
            mut references,
            file,
            style,
            format,
            output,
        }) => {
            if let Some(path) = file {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                references.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            if references.is_empty() {
                anyhow::bail!("No references given (pass them as arguments or with --file)");
            }

            let validator = build_validator(&config)?;
            let report = validator.validate_references(&references, &style, &format).await?;

            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Plain => {
                    for result in &report.results {
                        println!("{}", plain_line(result));
                    }
                    let s = &report.summary;
                    println!(
                        "\n{} total, {} matched, {} ambiguous, {} not found, {} failed",
                        s.total, s.matched, s.ambiguous, s.not_found, s.failed
                    );
                }
            }
        }

        Some(Commands::Format {
            reference,
            doi,
            style,
            format,
        }) => {
            let validator = build_validator(&config)?;
            match validator
                .format_reference(reference.as_deref(), doi.as_deref(), &style, &format)
                .await
            {
                Ok(matched) => println!("{}", serde_json::to_string_pretty(&matched)?),
                Err(RequestError::Ambiguous(candidates)) => {
                    for candidate in &candidates {
                        eprintln!(
                            "  {:.2}  {}  {}",
                            candidate.score.composite,
                            candidate.record.doi_url(),
                            candidate.record.title
                        );
                    }
                    return Err(RequestError::Ambiguous(candidates).into());
                }
                Err(err) => return Err(err.into()),
            }
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for the stdio transport
fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    let fmt_layer = if cli.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("crossref_mcp={}", env_filter)),
        ))
        .with(fmt_layer)
        .init();
}

/// Loaded configuration with command-line overrides applied
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;

    if let Some(timeout) = cli.timeout {
        config.crossref.timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        config.batch.max_concurrent = concurrency;
    }
    if let Some(mailto) = &cli.mailto {
        config.crossref.mailto = Some(mailto.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_validator(config: &Config) -> Result<Arc<ReferenceValidator>> {
    Ok(Arc::new(ReferenceValidator::from_config(config)?))
}

fn plain_line(result: &BatchItemResult) -> String {
    let detail = match &result.outcome {
        Ok(Verdict::Matched(matched)) => format!("{} ({:.2})", matched.formatted, matched.confidence),
        Ok(Verdict::Ambiguous(candidates)) => {
            let dois: Vec<&str> = candidates.iter().map(|c| c.doi.as_str()).collect();
            format!("{} candidates: {}", candidates.len(), dois.join(", "))
        }
        Ok(Verdict::NotFound) => "Failed to find a match.".to_string(),
        Err(err) => err.to_string(),
    };
    format!("[{}] {}: {}", result.index, result.status(), detail)
}
