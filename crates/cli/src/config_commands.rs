use std::path::Path;

use anyhow::Result;

use herald_config::HeraldConfig;

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print the resolved configuration and flag operational hazards.
///
/// Secrets are reported as set/unset, never echoed. Exits non-zero when the
/// configuration would keep the server from starting.
pub fn check(config: &HeraldConfig, explicit_path: Option<&Path>) -> Result<()> {
    match explicit_path.map(Path::to_path_buf).or_else(herald_config::find_config_file) {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    println!("server.bind                    = {}", config.server.bind);
    println!("server.port                    = {}", config.server.port);
    println!("webhook.secret                 = {}", set_or_unset(config.webhook.secret.is_some()));
    println!("webhook.max_body_bytes         = {}", config.webhook.max_body_bytes);
    println!("completion.base_url            = {}", config.completion.base_url);
    println!("completion.api_key             = {}", set_or_unset(config.completion.api_key.is_some()));
    println!("completion.model               = {}", config.completion.model);
    println!("completion.max_tokens          = {}", config.completion.max_tokens);
    println!(
        "delivery.base_url              = {}",
        config.delivery.base_url.as_deref().unwrap_or("unset")
    );
    println!(
        "pipeline.max_in_flight         = {}",
        config
            .pipeline
            .max_in_flight
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    println!("pipeline.serialize_per_message = {}", config.pipeline.serialize_per_message);
    println!();

    let mut errors = 0;
    if config.delivery.base_url.is_none() {
        eprintln!(
            "  {BOLD}{RED}error{RESET} delivery.base_url: not set; the server will refuse to start"
        );
        errors += 1;
    }
    if config.webhook.secret.is_none() {
        eprintln!(
            "  {BOLD}{YELLOW}warning{RESET} webhook.secret: not set; every trigger will be \
             answered with 500"
        );
    }
    if config.completion.api_key.is_none() {
        eprintln!(
            "  {BOLD}{YELLOW}warning{RESET} completion.api_key: not set; generation requests \
             will be sent unauthenticated"
        );
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn set_or_unset(present: bool) -> &'static str {
    if present { "set (redacted)" } else { "unset" }
}
