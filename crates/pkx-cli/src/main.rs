mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code_for, EXIT_FAILURE};
use pkx_core::{
    install_signal_handler, BuildOptions, Engine, PkxConfig, RepositoryResolver, WrapOptions,
};
use pkx_schema::BumpKind;
use pkx_store::OutputLayout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pkx",
    version,
    about = "Wrap pkx packages and their dependencies for inclusion in a web page"
)]
struct Cli {
    /// Project directory holding package.json.
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Local package repository (overrides the config file).
    #[arg(long, global = true)]
    repository: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy packages and their dependencies into the output directory, dependencies first.
    Wrap {
        /// Package id, or a JSON request (string, object, or array). Defaults to the
        /// dependencies of the project's package.json.
        request: Option<String>,
        /// Package metadata file, relative to the project.
        #[arg(long, default_value = "package.json")]
        package: PathBuf,
        /// Output directory, relative to the project.
        #[arg(long)]
        output: Option<String>,
        /// Write a loader script with this name into the output directory.
        #[arg(long)]
        loader: Option<String>,
        /// Merge wrapped files into this offline cache manifest in the output directory.
        #[arg(long)]
        appcache: Option<String>,
        /// Number of modules written in parallel.
        #[arg(long)]
        jobs: Option<usize>,
        /// Leave the `require` polyfill out of the loader script.
        #[arg(long, default_value_t = false)]
        no_polyfill: bool,
    },
    /// Show title, version, description, and dependencies of packages.
    Info {
        /// Package id or JSON request. Defaults to the project's dependencies.
        request: Option<String>,
        /// Package metadata file, relative to the project.
        #[arg(long, default_value = "package.json")]
        package: PathBuf,
    },
    /// Bump the package version and pack the project into build/<name>.pkx.
    Build {
        /// Bump the major version.
        #[arg(long, default_value_t = false, conflicts_with = "minor")]
        major: bool,
        /// Bump the minor version.
        #[arg(long, default_value_t = false)]
        minor: bool,
        /// Do not move the git version tag.
        #[arg(long, default_value_t = false)]
        no_tag: bool,
    },
    /// Clone a project with its submodules into the project directory and install the
    /// pre-commit hook.
    Clone {
        /// Repository URL or path passed to `git clone`.
        #[arg(id = "clone_repository", value_name = "REPOSITORY")]
        repository: String,
        /// Checkout directory name. Defaults to the repository name.
        dir: Option<String>,
        /// Do not install the pre-commit hook.
        #[arg(long, default_value_t = false)]
        no_hook: bool,
    },
    /// Install a git pre-commit hook that runs `pkx build`.
    InstallHook,
    /// Remove the git pre-commit hook.
    UninstallHook,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PKX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let config = match PkxConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let project = cli.project.clone();
    let json_output = cli.json;
    let repository = within(
        &project,
        cli.repository.as_deref().unwrap_or(config.repository.as_path()),
    );
    tracing::debug!(
        "project {}, repository {}",
        project.display(),
        repository.display()
    );
    let resolver = RepositoryResolver::new(repository, &project);

    let result = match cli.command {
        Commands::Wrap {
            request,
            package,
            output,
            loader,
            appcache,
            jobs,
            no_polyfill,
        } => layout(&project, output.as_deref().or(config.output.as_deref())).and_then(|layout| {
            let requests =
                commands::load_requests(request.as_deref(), &within(&project, &package), true)?;
            let options = WrapOptions {
                loader,
                appcache,
                polyfill: config.polyfill && !no_polyfill,
                jobs: jobs.unwrap_or(config.jobs),
            };
            commands::wrap::run(&Engine::new(layout), &resolver, &requests, &options, json_output)
        }),
        Commands::Info { request, package } => {
            commands::load_requests(request.as_deref(), &within(&project, &package), false)
                .and_then(|requests| {
                    let engine = Engine::new(OutputLayout::new(&project));
                    commands::info::run(&engine, &resolver, &requests, json_output)
                })
        }
        Commands::Build {
            major,
            minor,
            no_tag,
        } => {
            let bump = if major {
                BumpKind::Major
            } else if minor {
                BumpKind::Minor
            } else {
                BumpKind::Patch
            };
            commands::build::run(
                &Engine::new(OutputLayout::new(&project)),
                BuildOptions { bump, tag: !no_tag },
                json_output,
            )
        }
        Commands::Clone {
            repository,
            dir,
            no_hook,
        } => commands::clone::run(&repository, &project, dir.as_deref(), !no_hook, json_output),
        Commands::InstallHook => commands::hooks::install(&project, json_output),
        Commands::UninstallHook => commands::hooks::uninstall(&project, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

/// `path` relative to the project, unless it is absolute.
fn within(project: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project.join(path)
    }
}

fn layout(project: &Path, output: Option<&str>) -> Result<OutputLayout, String> {
    let layout = OutputLayout::new(project);
    match output {
        Some(out) => layout
            .with_output(out)
            .map_err(|e| pkx_core::CoreError::from(e).to_string()),
        None => Ok(layout),
    }
}
