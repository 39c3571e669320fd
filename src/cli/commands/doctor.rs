//! Doctor command - verify credentials, storage and configuration.

use crate::cli::output::mask_secret;
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Campus Admin Doctor");
    println!();
    println!("Checking configuration, credentials and storage...\n");

    let mut checks = Vec::new();

    println!("{}", style("Language Model").bold());
    let model_checks = vec![check_model_endpoint(settings), check_api_key(settings)];
    for check in &model_checks {
        check.print();
    }
    checks.extend(model_checks);

    println!();

    println!("{}", style("Authentication").bold());
    let secret_check = check_secret_key(settings);
    secret_check.print();
    checks.push(secret_check);

    println!();

    println!("{}", style("Storage").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_checks = vec![check_config_file(config_path), check_agent_limits(settings)];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before starting the server.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Campus Admin is ready to serve.");
    }

    Ok(())
}

/// Check the configured model endpoint.
fn check_model_endpoint(settings: &Settings) -> CheckResult {
    match url::Url::parse(&settings.llm.base_url) {
        Ok(url) => CheckResult::ok(
            "Model endpoint",
            &format!("{} via {}", settings.llm.model, url.host_str().unwrap_or("local")),
        ),
        Err(e) => CheckResult::error(
            "Model endpoint",
            &format!("invalid base_url: {}", e),
            "Fix llm.base_url in the config file",
        ),
    }
}

/// Check that the model API key is exported.
fn check_api_key(settings: &Settings) -> CheckResult {
    let var = settings.llm.api_key_env.as_str();
    match settings.llm.api_key() {
        Some(key) => CheckResult::ok(var, &format!("configured ({})", mask_secret(&key))),
        None => CheckResult::error(
            var,
            "not set",
            &format!("Set with: export {}='...'", var),
        ),
    }
}

/// Check that a token signing secret is available.
fn check_secret_key(settings: &Settings) -> CheckResult {
    match (&settings.auth.secret_key, settings.secret_key()) {
        (Some(key), _) if !key.is_empty() => CheckResult::ok("Token secret", "set in config file"),
        (_, Some(key)) if key.len() < 32 => CheckResult::warning(
            "Token secret",
            "SECRET_KEY is short",
            "Use at least 32 random characters",
        ),
        (_, Some(_)) => CheckResult::ok("Token secret", "from SECRET_KEY"),
        (_, None) => CheckResult::error(
            "Token secret",
            "not set",
            "Set auth.secret_key or export SECRET_KEY='...'",
        ),
    }
}

/// Check data directory and database file.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok(
            "Data directory",
            &format!("{}", data_dir.display()),
        ));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created when the server starts",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: campus-admin config init",
        )
    }
}

/// Report the agent loop limits.
fn check_agent_limits(settings: &Settings) -> CheckResult {
    match settings.validate() {
        Ok(()) => CheckResult::ok(
            "Agent limits",
            &format!(
                "{} tool rounds, {} history turns",
                settings.agent.max_rounds, settings.agent.max_history_turns
            ),
        ),
        Err(e) => CheckResult::error("Agent limits", &e.to_string(), "Fix the [agent] section"),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
