//! azswitch - switch the active Azure CLI subscription
//!
//! USAGE:
//!   azswitch                      # interactive picker
//!   azswitch --sample             # picker over bundled sample data
//!   azswitch doctor               # check config, CLI, log target
//!   azswitch config set <k> <v>   # non-interactive config

use anyhow::Result;
use std::process::ExitCode;

use azswitch::config::{self, Config};
use azswitch::{gateway, logging, ui};

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Interactive { sample: bool },
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

fn parse_args(args: &[String]) -> Command {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Command::Help;
    }

    match args.first().map(|s| s.as_str()) {
        Some("doctor") => Command::Doctor,
        Some("config") if args.get(1).map(|s| s.as_str()) == Some("set") => Command::ConfigSet {
            key: args.get(2).cloned().unwrap_or_default(),
            value: args.get(3).cloned().unwrap_or_default(),
        },
        Some("config") => Command::Help,
        _ => Command::Interactive {
            sample: args.iter().any(|a| a == "--sample" || a == "-s"),
        },
    }
}

fn print_help() {
    println!(r#"azswitch - pick the active Azure CLI subscription

USAGE:
    azswitch                      # interactive picker
    azswitch --sample             # picker over bundled sample data
    azswitch doctor               # check config, CLI, log target
    azswitch config set <k> <v>   # set config value

FLAGS:
    -s, --sample            Use bundled sample subscriptions (no az calls)
    -h, --help              Show this help

CONFIG:
    ~/.config/azswitch/config.json    tool, max_attempts, base_delay_ms,
                                      max_delay_ms, result_countdown_ms, sample

ENVIRONMENT:
    USE_SAMPLE_DATA=true    Same as --sample
    DEBUG                   Append events to ~/.local/state/azswitch/messages.log
    AZSWITCH_LOG_FILE       Debug log location
    AZSWITCH_LOG            Debug log filter (default: debug)

CONTROLS:
    ↑/k ↓/j   Move
    /         Filter
    Enter     Switch to highlighted subscription
    r         Retry (error page)
    Esc       Back
    q         Quit
"#);
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(parse_args(&args)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Doctor => run_doctor(),
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Interactive { sample } => run_interactive(sample).await,
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

fn load_config() -> Result<Config> {
    let mut cfg = Config::load()?;
    cfg.apply_env()?;
    Ok(cfg)
}

fn run_doctor() -> Result<()> {
    println!("azswitch doctor\n");

    let path = config::config_path()?;
    let cfg = load_config()?;
    println!("[{}] Config: {}",
        if path.exists() { "✓" } else { "-" },
        path.display()
    );

    match gateway::find_in_path(&cfg.tool) {
        Some(p) => println!("[✓] CLI: {}", p.display()),
        None => println!("[✗] CLI: '{}' not found in PATH", cfg.tool),
    }

    println!("[{}] Sample data: {}",
        if cfg.use_sample_data { "✓" } else { "-" },
        if cfg.use_sample_data { "on" } else { "off" }
    );

    match &cfg.debug_log {
        Some(p) => println!("[✓] Debug log: {}", p.display()),
        None => println!("[-] Debug log: off (set {})", config::ENV_DEBUG),
    }

    let policy = cfg.retry_policy();
    println!("[✓] Retry: {} attempts, {:?} base, {:?} cap",
        policy.max_attempts, policy.base_delay, policy.max_delay
    );

    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = Config::load()?;
    cfg.set(key, value)?;
    cfg.save()?;
    println!("{} set to {} in {}", key, value, config::config_path()?.display());
    Ok(())
}

async fn run_interactive(sample: bool) -> Result<()> {
    let mut cfg = load_config()?;
    if sample {
        cfg.use_sample_data = true;
    }

    if let Some(path) = &cfg.debug_log {
        logging::init_debug_log(path)?;
    }
    tracing::info!(tool = %cfg.tool, sample = cfg.use_sample_data, "starting");

    ui::run_tui(&cfg).await
}
