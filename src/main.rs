// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! sable CLI - run CommonJS modules in principal-aware sandboxes
//!
//! ## Modes
//!
//! - `sable main.js` requires the module and calls its `main()`
//! - `sable --remote main.js` does the same in a restricted child process
//! - `sable -e CODE` evaluates a script with a top-level `require`
//! - `sable` starts the REPL

mod repl;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use sable_loader::bridge::{BridgeHost, RemoteRuntime, Transport};
use sable_loader::fs::SOURCE_SUFFIX;
use sable_loader::{Config, Loader, LoaderError, Principal, ScriptSource, Value, console};
use sable_script::runtime::arg;
use sable_script::sandbox::script_error;
use sable_script::{ObjectRef, call_function, native_function};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Status a main module reports when it finishes normally.
const STATUS_OK: &str = "OK";

#[derive(Parser)]
#[command(
    name = "sable",
    about = "Run CommonJS modules in principal-aware sandboxes",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Main module: a file, or an identifier under the module roots
    script: Option<String>,

    /// Evaluate a script with a top-level require()
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Module root directory (repeat to search several, in order)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Principal for module contexts: restricted or elevated
    #[arg(long)]
    principal: Option<Principal>,

    /// Package manifest to check requires against
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Refuse requires the manifest does not declare
    #[arg(long)]
    strict_manifest: bool,

    /// Run the main module in a restricted child process
    #[arg(long)]
    remote: bool,

    /// Configuration file (default: ./sable.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Serve the bridge protocol on stdin/stdout
    #[arg(long, hide = true)]
    remote_child: bool,
}

impl Cli {
    /// Configuration file and environment, overridden by flags.
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::load()?,
        };
        if !self.roots.is_empty() {
            config.root_paths = self.roots.clone();
        }
        if let Some(principal) = self.principal {
            config.default_principal = principal;
        }
        if let Some(manifest) = &self.manifest {
            config.manifest = Some(manifest.clone());
        }
        config.strict_manifest |= self.strict_manifest;
        config.remote |= self.remote;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; a remote child's stdout carries the protocol.
    let filter = if cli.verbose { "sable=debug" } else { "sable=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {e:#}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.remote_child {
        RemoteRuntime::new(Transport::stdio())?.run()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = cli.config()?;
    if let Some(code) = &cli.eval {
        use_current_dir(&mut config);
        return run_eval(&config, code);
    }

    match &cli.script {
        Some(script) => {
            let main = main_identifier(&mut config, script);
            let status = if config.remote {
                run_remote(&config, &main, cli.verbose)?
            } else {
                run_local(&local_loader(&config)?, &main)?
            };
            Ok(exit_status(&status))
        }
        None => {
            use_current_dir(&mut config);
            let mut repl = repl::Repl::new(local_loader(&config)?)?;
            repl.run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn use_current_dir(config: &mut Config) {
    if config.root_paths.is_empty() {
        config.root_paths.push(PathBuf::from("."));
    }
}

/// Maps the script argument to a module identifier. A file outside every
/// configured root makes its directory the root.
fn main_identifier(config: &mut Config, script: &str) -> String {
    let path = Path::new(script);
    if path.is_file() {
        if config.root_paths.is_empty() {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            config.root_paths.push(dir.to_path_buf());
        }
        if let Some(identifier) = identifier_under_roots(&config.root_paths, path) {
            return identifier;
        }
    }
    use_current_dir(config);
    script.strip_suffix(SOURCE_SUFFIX).unwrap_or(script).to_string()
}

fn identifier_under_roots(roots: &[PathBuf], path: &Path) -> Option<String> {
    let path = path.canonicalize().ok()?.with_extension("");
    roots.iter().find_map(|root| {
        let relative = path.strip_prefix(root.canonicalize().ok()?).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|segment| segment.as_os_str().to_string_lossy())
            .collect();
        Some(segments.join("/"))
    })
}

fn local_loader(config: &Config) -> anyhow::Result<Loader> {
    let loader = config
        .loader_options()?
        .global("console", console::plain_text())
        .build()?;
    Ok(loader)
}

fn run_eval(config: &Config, code: &str) -> anyhow::Result<ExitCode> {
    let loader = local_loader(config)?;
    let value = loader.run_script(ScriptSource {
        contents: code.to_string(),
        filename: Some("<eval>".to_string()),
    })?;
    if !value.is_undefined() {
        println!("{value}");
    }
    loader.unload("shutdown");
    Ok(ExitCode::SUCCESS)
}

/// Requires `main` and calls its `main(options, callbacks)`, returning the
/// status passed to `callbacks.quit()`.
fn run_local(loader: &Loader, main: &str) -> anyhow::Result<String> {
    let status = call_main(loader, main);
    loader.unload("shutdown");
    Ok(status?)
}

fn call_main(loader: &Loader, main: &str) -> Result<String, LoaderError> {
    let exports = loader.require(main)?;
    let entry = exports
        .as_object()
        .map(|obj| obj.get("main"))
        .filter(Value::is_callable);

    let status = Rc::new(RefCell::new(None));
    if let Some(entry) = entry {
        let callbacks = ObjectRef::ordinary();
        let quit = status.clone();
        callbacks.set(
            "quit",
            native_function("quit", move |_, args| {
                let status = match arg(args, 0) {
                    Value::Undefined => STATUS_OK.to_string(),
                    status => status.to_js_string(),
                };
                *quit.borrow_mut() = Some(status);
                Ok(Value::Undefined)
            }),
        );
        let options = Value::Object(ObjectRef::ordinary());
        call_function(&entry, exports.clone(), &[options, Value::Object(callbacks)])
            .map_err(|thrown| LoaderError::from_script(script_error(&thrown, main)))?;
    }

    let status = status.borrow_mut().take();
    Ok(status.unwrap_or_else(|| STATUS_OK.to_string()))
}

/// Runs `main` in a restricted child process served by an elevated loader.
fn run_remote(config: &Config, main: &str, verbose: bool) -> anyhow::Result<String> {
    let loader = config
        .loader_options()?
        .default_principal(Principal::Elevated)
        .build()?;
    let manifest = config.load_manifest()?;

    let program = std::env::current_exe().context("cannot locate the sable executable")?;
    let mut args = vec!["--remote-child"];
    if verbose {
        args.push("--verbose");
    }
    let host = BridgeHost::spawn_child(loader.clone(), manifest, program, args)?
        .with_console(console::print_line);

    let outcome = host
        .start_main(main, serde_json::json!({}))
        .and_then(|()| host.run_until_quit());
    host.shutdown();
    loader.unload("shutdown");
    Ok(outcome?)
}

fn exit_status(status: &str) -> ExitCode {
    if status == STATUS_OK {
        ExitCode::SUCCESS
    } else {
        eprintln!("{}: main quit with status {}", "Error".red().bold(), status.yellow());
        ExitCode::FAILURE
    }
}
