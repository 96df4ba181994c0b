//! netpolicyc - RBAC network policy compiler
//!
//! Replays the lexer's network directives and reports the compiled graph.

use anyhow::{Context, Result};
use clap::Parser;
use rbac_netpolicy::config::DEFAULT_CONFIG_PATH;
use rbac_netpolicy::{compile, CompileSession, CompiledPolicy, CompilerConfig, PositionedDirective};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// RBAC network policy compiler
#[derive(Parser, Debug)]
#[command(name = "netpolicyc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON array of directives emitted by the policy lexer
    #[arg(short = 'd', long)]
    directives: PathBuf,

    /// Compiler configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (overrides the configuration file)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Print the compiled graph as JSON
    #[arg(long)]
    emit_json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match CompilerConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(args.log_level.as_deref().unwrap_or(&config.logging.level));

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            error!("The RBAC system will not be allowed to be enabled until this problem is fixed.");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &CompilerConfig) -> Result<()> {
    config.validate()?;

    info!(directives = %args.directives.display(), "--- Starting netpolicyc ---");

    let text = fs::read_to_string(&args.directives)
        .with_context(|| format!("reading {}", args.directives.display()))?;
    let directives: Vec<PositionedDirective> = serde_json::from_str(&text)
        .with_context(|| format!("decoding directives in {}", args.directives.display()))?;

    let session = CompileSession::new(config.protocol_db()?, config.host_resolver());
    let compiled = compile(session, directives)?;

    if args.emit_json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
    } else {
        print_summary(&compiled);
    }
    Ok(())
}

fn print_summary(compiled: &CompiledPolicy) {
    println!(
        "{} roles, {} subjects, {} IP ACLs, {} allowed IPs, {} allocations",
        compiled.graph.roles().len(),
        compiled.graph.subjects().len(),
        compiled.graph.ip_acl_count(),
        compiled.graph.allowed_ip_count(),
        compiled.allocations
    );
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
