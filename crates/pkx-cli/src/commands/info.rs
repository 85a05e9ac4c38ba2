use super::{json_pretty, report_resolve_failure, EXIT_SUCCESS};
use pkx_core::{CoreError, Engine, Resolver};
use pkx_schema::PackageRequest;

pub fn run(
    engine: &Engine,
    resolver: &dyn Resolver,
    requests: &[PackageRequest],
    json: bool,
) -> Result<u8, String> {
    let summaries = match engine.info(resolver, requests) {
        Ok(s) => s,
        Err(e) => {
            if let CoreError::Resolve(failure) = &e {
                report_resolve_failure(failure, json)?;
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            for line in summary.render_lines("") {
                println!("{line}");
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
