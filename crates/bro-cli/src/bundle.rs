//! The bundle command: entries in, bundles written to the output directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bro::{BroConfig, BroOptions, CommandBundlerFactory, CommandSpec, ErrorStrategy, FileRecord, PipelineEvent};
use tokio::signal;

use crate::cli::Cli;
use crate::error::{CliError, Result, ResultExt};
use crate::ui;

/// What happened during a run.
#[derive(Debug, Default)]
struct RunReport {
    written: Vec<(String, u64)>,
    failed: usize,
    first_error: Option<bro::BundleError>,
}

/// Execute a bundle run described by the command line.
///
/// Without `--watch` this returns once every entry has been bundled. In watch
/// mode it keeps rebundling until Ctrl+C.
pub async fn execute(args: Cli) -> Result<()> {
    let started = Instant::now();
    let cwd = resolve_cwd(args.cwd.as_deref())?;
    let color = ui::should_use_color(args.no_color);

    let config = BroConfig::load(&cwd, args.config.as_deref())?;
    let mut options = config.apply(BroOptions::new().color(color));
    if args.watch {
        options = options.watch(true);
    }
    if let Some(mode) = args.error {
        options = options.error(mode.into());
    }
    let watch = options.watch;
    let emit = matches!(options.error, ErrorStrategy::Emit);

    let spec = CommandSpec::parse(&args.bundler)
        .ok_or_else(|| CliError::InvalidArgument("bundler command is empty".to_string()))?
        .watch(args.watch_paths.iter().map(|path| absolutize(&cwd, path)));
    let base = args
        .base
        .as_deref()
        .map(|dir| absolutize(&cwd, dir))
        .unwrap_or_else(|| cwd.clone());
    let out_dir = absolutize(&cwd, &args.out_dir);

    let records = load_records(&cwd, &base, &args.files, args.read).await?;
    let total = records.len();
    tracing::debug!(
        entries = total,
        bundler = %spec.program,
        out_dir = %out_dir.display(),
        "starting bundle run"
    );

    let stage = bro::bro(CommandBundlerFactory::new(spec), options);
    let (mut events, task) = stage.pipe(tokio_stream::iter(records));

    if watch {
        ui::info("Watching for changes, press Ctrl+C to stop");
    }

    let mut report = RunReport::default();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_event(event, &out_dir, watch, &mut report).await?,
                None => break,
            },

            _ = signal::ctrl_c(), if watch => {
                ui::info("Stopping watch...");
                break;
            }
        }
    }

    let mut stage = task
        .await
        .map_err(|e| CliError::Custom(format!("bundle task failed: {}", e)))?;
    stage.dispose();

    if watch {
        return Ok(());
    }

    if !args.quiet {
        ui::print_summary(&report.written, started.elapsed());
    }

    if let Some(error) = report.first_error.filter(|_| emit) {
        return Err(CliError::Bundle(error));
    }
    if report.failed > 0 {
        ui::warning(&format!("{} of {} bundles failed", report.failed, total));
    }
    Ok(())
}

async fn handle_event(
    event: PipelineEvent,
    out_dir: &Path,
    watch: bool,
    report: &mut RunReport,
) -> Result<()> {
    match event {
        PipelineEvent::Record(record) => {
            let relative = record.relative().to_path_buf();
            let target = out_dir.join(&relative);
            write_bundle(&target, record.contents_bytes()).await?;

            ui::success(&format!(
                "{} → {}",
                relative.display(),
                target.display()
            ));
            report
                .written
                .push((relative.display().to_string(), record.contents_bytes().len() as u64));
        }
        PipelineEvent::Error(error) => {
            ui::error(&format!("{}\n{}", error.name(), error));
            if !watch && report.first_error.is_none() {
                report.first_error = Some(error);
            }
        }
        PipelineEvent::End => {
            tracing::debug!("bundle ended without output");
            report.failed += 1;
        }
    }
    Ok(())
}

async fn write_bundle(target: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(target, contents)
        .await
        .context(format!("Failed to write {}", target.display()))
}

async fn load_records(
    cwd: &Path,
    base: &Path,
    files: &[PathBuf],
    read: bool,
) -> Result<Vec<FileRecord>> {
    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let path = absolutize(cwd, file);
        if !path.is_file() {
            return Err(CliError::FileNotFound(path));
        }

        let record = if read {
            let contents = tokio::fs::read(&path).await.with_path(&path)?;
            FileRecord::with_contents(path, base, contents)
        } else {
            FileRecord::from_path(path, base)
        };
        records.push(record);
    }
    Ok(records)
}

fn resolve_cwd(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    Ok(match cwd {
        Some(dir) => absolutize(&current, dir),
        None => current,
    })
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
