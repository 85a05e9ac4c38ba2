use super::{
    colorize_status, json_pretty, report_resolve_failure, spin_fail, spin_ok, spinner,
    EXIT_FAILURE, EXIT_SUCCESS,
};
use pkx_core::{CoreError, Engine, Resolver, WrapOptions, WrapReport};
use pkx_schema::PackageRequest;

pub fn run(
    engine: &Engine,
    resolver: &dyn Resolver,
    requests: &[PackageRequest],
    options: &WrapOptions,
    json: bool,
) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("wrapping modules..."))
    };

    let report = match engine.wrap(resolver, requests, options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                if r.is_success() {
                    spin_ok(pb, &format!("wrapped {} module(s)", r.written.len()));
                } else {
                    spin_fail(pb, "wrap finished with errors");
                }
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "wrap failed");
            }
            if let CoreError::Resolve(failure) = &e {
                report_resolve_failure(failure, json)?;
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(if report.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

fn print_report(report: &WrapReport) {
    println!("Order for including:");
    for path in report.written_paths() {
        println!("  {path}");
    }
    println!("{}: {} module(s)", colorize_status("written"), report.written.len());
    if !report.skipped.is_empty() {
        println!("{}:", colorize_status("skipped"));
        for s in &report.skipped {
            println!("  {}: {}", s.module_id, s.reason);
        }
    }
    if !report.failed.is_empty() {
        println!("{}:", colorize_status("failed"));
        for f in &report.failed {
            println!("  {} ({}): {}", f.module_id, f.relative_path, f.reason);
        }
        for u in &report.unsatisfied {
            let missing: Vec<&str> = u.failed_dependencies.iter().map(|d| d.as_str()).collect();
            println!("  {} is missing {}", u.module_id, missing.join(", "));
        }
    }
    if let Some(loader) = &report.loader {
        println!("loader:   {loader}");
    }
    if let Some(appcache) = &report.appcache {
        println!(
            "appcache: {} ({} added)",
            appcache.path,
            appcache.outcome.added.len()
        );
    }
    if let Some(failure) = &report.resolve_failure {
        for line in failure.render_lines("") {
            eprintln!("{line}");
        }
    }
}
