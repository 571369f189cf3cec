use std::borrow::Cow;
use std::ffi::OsString;
use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use glkstart::fs_host::ResourceSummary;
use glkstart::{Bootstrap, FsHost, GlkArguments, Options, StartupOutcome, StopReason};
use serde_derive::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct StartupReport<'a> {
    host_code: i32,
    game_file: Cow<'a, str>,
    base_dir: Option<Cow<'a, str>>,
    resources: Option<ResourceSummary>,
    options: &'a Options,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let mut bootstrap = Bootstrap::new(FsHost::default(), GlkArguments::default());
    let outcome = bootstrap.run(&args, || tracing::debug!("interpreter streams finalized"));
    let host_code = outcome.host_code();

    let started = match outcome {
        StartupOutcome::Continue(started) => started,
        StartupOutcome::Stop(StopReason::EarlyExit(text)) => {
            print!("{text}");
            return Ok(ExitCode::SUCCESS);
        }
        StartupOutcome::Stop(StopReason::ArgumentError(e)) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(2));
        }
        StartupOutcome::Stop(StopReason::AlreadyStarted) => return Ok(ExitCode::SUCCESS),
    };

    let host = bootstrap.host();
    let report = StartupReport {
        host_code,
        game_file: started.game_file.to_string_lossy(),
        base_dir: host.base_dir().map(Path::to_string_lossy),
        resources: host.resource_summary(),
        options: &started.options,
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("failed to write report")?;
    writeln!(stdout)?;

    // The host is done with this turn; finalize before its streams go away.
    started.shutdown.on_shutdown();

    Ok(ExitCode::SUCCESS)
}
