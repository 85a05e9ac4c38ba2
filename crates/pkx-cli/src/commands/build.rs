use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use pkx_core::{BuildOptions, Engine};

pub fn run(engine: &Engine, options: BuildOptions, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("building package..."))
    };

    let result = match engine.build(options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "package built");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&result)?);
    } else {
        println!("version: {} -> {}", result.previous_version, result.version);
        println!("archive: {}", result.archive.display());
        println!("entries: {}", result.entries.len());
        if result.tagged {
            println!("tagged:  {}", result.version);
        }
    }
    Ok(EXIT_SUCCESS)
}
