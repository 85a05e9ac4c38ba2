pub mod build;
pub mod clone;
pub mod completions;
pub mod hooks;
pub mod info;
pub mod man_pages;
pub mod wrap;

use indicatif::{ProgressBar, ProgressStyle};
use pkx_core::{CoreError, ResolveFailure};
use pkx_schema::{parse_package_file, parse_request_argument, requests_for_wrap, PackageRequest};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PACKAGE_ERROR: u8 = 2;
pub const EXIT_RESOLVE_ERROR: u8 = 3;
pub const EXIT_STORE_ERROR: u8 = 4;

/// Exit code for an error message produced by a command.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("package error:")
        || msg.starts_with("request error:")
        || msg.starts_with("version error:")
    {
        EXIT_PACKAGE_ERROR
    } else if msg.starts_with("resolution failed:") || msg.starts_with("dependency cycle") {
        EXIT_RESOLVE_ERROR
    } else if msg.starts_with("store error:") {
        EXIT_STORE_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "written" => Style::new().green().apply_to(status).to_string(),
        "skipped" => Style::new().yellow().apply_to(status).to_string(),
        "failed" => Style::new().red().bold().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Requests from the command line, or else the dependencies in `package`.
pub fn load_requests(
    request: Option<&str>,
    package: &Path,
    wrap: bool,
) -> Result<Vec<PackageRequest>, String> {
    if let Some(arg) = request {
        return parse_request_argument(arg, wrap).map_err(|e| CoreError::from(e).to_string());
    }
    let meta = parse_package_file(package)
        .map_err(|e| format!("{} ({})", CoreError::from(e), package.display()))?;
    let deps = meta.effective_dependencies();
    if wrap {
        Ok(requests_for_wrap(deps))
    } else {
        Ok(deps.iter().map(pkx_schema::DependencySpec::to_request).collect())
    }
}

/// Print a resolution failure tree: JSON on stdout, or the indented report on stderr.
pub fn report_resolve_failure(failure: &ResolveFailure, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(failure)?);
    } else {
        for line in failure.render_lines("") {
            eprintln!("{line}");
        }
    }
    Ok(())
}
