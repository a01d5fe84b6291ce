//! Command implementations for the dataset workbench CLI
//!
//! Sets up logging and configuration, then runs the chosen command. Local
//! conversions go through the same resolution, loading and writing steps
//! as the HTTP service.

use crate::cli::args::{Args, Commands, ConvertArgs, PreviewArgs};
use crate::config::WorkbenchConfig;
use crate::constants::CONVERTED_FILE_STEM;
use crate::converter::{convert_blob, resolve_source, resolve_target};
use crate::loader;
use crate::preview::{DatasetPreview, clamp_limit, preview};
use crate::server;
use anyhow::{Context, Result, anyhow, bail};
use colored::*;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

/// Main command runner
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    args.validate()?;
    let config = load_configuration(&args)?;

    match args.command.clone() {
        None | Some(Commands::Serve(_)) => run_serve(config).await,
        Some(Commands::Convert(convert_args)) => {
            until_interrupted(run_convert(&convert_args, args.quiet)).await
        }
        Some(Commands::Preview(preview_args)) => {
            until_interrupted(run_preview(&config, &preview_args)).await
        }
    }
}

/// Set up tracing with an env filter; `RUST_LOG` wins over the flags
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "dataset_workbench={log_level},tower_http={log_level}"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Defaults, then the config file, then command line flags
fn load_configuration(args: &Args) -> Result<WorkbenchConfig> {
    let mut config = match &args.config_file {
        Some(path) => {
            info!("Using config file: {}", path.display());
            WorkbenchConfig::load_from_file(path)?
        }
        None => WorkbenchConfig::default(),
    };

    if let Some(Commands::Serve(serve_args)) = &args.command {
        config = serve_args.apply(config);
    }

    config.validate()?;
    Ok(config)
}

async fn until_interrupted(command: impl Future<Output = Result<()>>) -> Result<()> {
    tokio::select! {
        result = command => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted by user")),
    }
}

async fn run_serve(config: WorkbenchConfig) -> Result<()> {
    info!(
        "Starting dataset workbench on {} (GPS IDs: {:?})",
        config.bind, config.id_policy
    );
    server::serve(config).await.context("HTTP server failed")?;
    Ok(())
}

async fn run_convert(args: &ConvertArgs, quiet: bool) -> Result<()> {
    let start_time = Instant::now();

    let target = resolve_target(&args.to)?;
    let source = resolve_source(&args.input.to_string_lossy(), args.from.as_deref())?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, target.extension()));

    if output == args.input {
        bail!(
            "Refusing to overwrite the input file {}",
            args.input.display()
        );
    }
    if output.exists() && !args.force {
        bail!(
            "Output file already exists: {} (use --force to replace it)",
            output.display()
        );
    }

    let blob = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let input_size = blob.len();

    let converted = task::spawn_blocking(move || convert_blob(&blob, source, target))
        .await
        .context("Conversion task failed")??;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&output, &converted.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        println!("{}", "Conversion complete".green().bold());
        println!(
            "  {} {} ({})",
            "Input: ".cyan(),
            args.input.display(),
            format_size(input_size as u64)
        );
        println!(
            "  {} {} ({})",
            "Output:".cyan(),
            output.display(),
            format_size(converted.bytes.len() as u64)
        );
        println!("  {} {} -> {}", "Format:".cyan(), source, target);
        println!(
            "  {} {:.2?}",
            "Time:  ".cyan(),
            start_time.elapsed()
        );
    }
    Ok(())
}

async fn run_preview(config: &WorkbenchConfig, args: &PreviewArgs) -> Result<()> {
    let source = resolve_source(&args.input.to_string_lossy(), args.from.as_deref())?;
    let blob = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let rows = clamp_limit(
        Some(i64::try_from(args.rows).unwrap_or(i64::MAX)),
        config.preview_rows,
        config.max_preview_rows,
    );
    let (dataset_preview, total_rows) = task::spawn_blocking(move || {
        let table = loader::load(&blob, source)?;
        let dataset_preview = preview(&table, rows)?;
        Ok::<_, crate::error::WorkbenchError>((dataset_preview, table.height()))
    })
    .await
    .context("Preview task failed")??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dataset_preview)?);
        return Ok(());
    }

    println!(
        "{} {} ({} columns, {} rows, {})",
        "Dataset:".cyan().bold(),
        args.input.display(),
        dataset_preview.columns.len(),
        total_rows,
        source
    );
    println!("{}", render_table(&dataset_preview));
    if total_rows > dataset_preview.data.len() {
        println!(
            "{}",
            format!(
                "... {} more rows",
                total_rows - dataset_preview.data.len()
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Same directory and stem as the input, target extension
///
/// When that would be the input itself, `converted_dataset.<ext>` is used.
fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let candidate = input.with_extension(extension);
    if candidate == input {
        input.with_file_name(format!("{CONVERTED_FILE_STEM}.{extension}"))
    } else {
        candidate
    }
}

/// Plain text table with padded columns
fn render_table(dataset_preview: &DatasetPreview) -> String {
    let header: Vec<String> = dataset_preview.columns.clone();
    let rows: Vec<Vec<String>> = dataset_preview
        .data
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|column| cell_text(row.get(column).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            rows.iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(&header).bold().to_string()];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| format_line(row)));
    lines.join("\n")
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Format a byte count for humans
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
