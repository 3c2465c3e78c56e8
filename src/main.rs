use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use box_skills_kit::config::Config;
use box_skills_kit::handler::AppState;
use box_skills_kit::server::start_server;
use box_skills_kit::skill::{DemoSkill, Skill};

fn print_help() {
    println!(
        "\
box-skills-kit v{}

Receives skill invocations from the content platform, runs a skill on the
uploaded file and writes the resulting metadata cards back.

USAGE:
    box-skills-kit [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/skill.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG              Log level filter for tracing
                          (e.g. debug, box_skills_kit=debug,warn)
    BOX_PRIMARY_KEY       Primary webhook signature key
    BOX_SECONDARY_KEY     Secondary webhook signature key

EXAMPLES:
    box-skills-kit                          # uses config/skill.toml
    box-skills-kit /etc/skills/skill.toml   # custom config path
    RUST_LOG=debug box-skills-kit           # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("box-skills-kit v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("box_skills_kit=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/skill.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    info!("Platform API: {}", config.platform.api_base());
    info!(
        "Signature keys: primary {}, secondary {}",
        if config.platform.primary_key.is_some() { "set" } else { "unset" },
        if config.platform.secondary_key.is_some() { "set" } else { "unset" },
    );
    info!(
        "Invocation budget: {}s, representation polling every {}ms (max {} retries)",
        config.server.invocation_timeout_secs,
        config.representation.poll_interval_ms,
        config.representation.max_poll_attempts
    );

    let skill: Arc<dyn Skill> = Arc::new(DemoSkill::default());
    info!("Skill: {}", skill.name());

    start_server(Arc::new(AppState::new(config, skill))).await
}
