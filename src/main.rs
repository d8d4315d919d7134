mod cli;

use mediaconv::{
    archive::parse_folder_structure,
    config,
    conversion::{presets, BatchRequest, Task},
    Context,
};
use mediaconv_common::{paths, BatchId, OutputFormat};

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands, ConversionArgs};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaconv=debug,mediaconv_db=debug,mediaconv_av=debug".to_string()
        } else {
            "mediaconv=info,mediaconv_db=info,mediaconv_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert { files, options } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_files(&files, &options, cli.config.as_deref()))
        }
        Commands::Batch {
            files,
            layout,
            options,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(&files, &layout, &options, cli.config.as_deref()))
        }
        Commands::BatchStatus { batch_id } => batch_status(&batch_id, cli.config.as_deref()),
        Commands::Presets => list_presets(cli.config.as_deref()),
        Commands::Formats => list_formats(),
        Commands::CheckTools => check_tools(),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediaconv {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_files(
    files: &[PathBuf],
    args: &ConversionArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let options = args.to_options(&config)?;
    let ctx = Context::new(config)?;

    let mut failures = 0;
    for file in files {
        if !file.exists() {
            anyhow::bail!("Input file does not exist: {:?}", file);
        }

        match ctx.engine.convert(file, &options).await {
            Ok(task) => {
                if task.error.is_some() {
                    failures += 1;
                }
                print_task(&task);
            }
            Err(e) => {
                failures += 1;
                println!("✗ {}: {:#}", file.display(), e);
            }
        }
    }

    ctx.shutdown().await;

    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

fn print_task(task: &Task) {
    let mark = if task.error.is_none() { "✓" } else { "✗" };
    println!("{} {} [{}] {}", mark, task.filename, task.id.short(), task.status);
    if let Some(ref error) = task.error {
        println!("  Error: {}", error);
    }
    for output in &task.outputs {
        println!("  {} ({} bytes)", output.path.display(), output.size);
    }
}

async fn run_batch(
    files: &[PathBuf],
    layout: &str,
    args: &ConversionArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let options = args.to_options(&config)?;
    let layout = parse_folder_structure(layout);
    let ctx = Context::new(config)?;

    let batch_id = BatchId::new();
    let sources = ctx.stage_uploads(files, &batch_id).await?;

    let request = BatchRequest::new(sources, options)
        .with_batch_id(batch_id)
        .with_layout(layout);
    let job = ctx.batches.run(request).await;

    println!("Batch: {}", job.batch_id);
    println!("Status: {}", job.status);
    for task_id in &job.task_ids {
        if let Some(task) = ctx.registry.get(task_id) {
            print_task(&task);
        }
    }
    if let Some(path) = ctx.batches.archive_path(&job.batch_id) {
        println!("Archive: {}", path.display());
    }
    if let Some(ref error) = job.error {
        println!("Error: {}", error);
    }

    ctx.shutdown().await;
    Ok(())
}

fn batch_status(batch_id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let batch_id: BatchId = batch_id
        .parse()
        .with_context(|| format!("Invalid batch id: {}", batch_id))?;

    let gateway = mediaconv::persistence::SqliteGateway::open(&config.paths.database)?;
    let record = mediaconv::persistence::PersistenceGateway::read(&gateway, batch_id)?
        .with_context(|| format!("Batch not found: {}", batch_id))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn list_presets(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    for (name, width, height) in presets::all_presets(&config.presets) {
        println!("{:<24} {}x{}", name, width, height);
    }
    Ok(())
}

fn list_formats() -> Result<()> {
    let join = |formats: &[OutputFormat]| {
        formats
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("Image inputs:  {}", paths::image_extensions().join(", "));
    println!("Video inputs:  {}", paths::video_extensions().join(", "));
    println!("Image outputs: {}", join(OutputFormat::IMAGE));
    println!("Video outputs: {}", join(OutputFormat::VIDEO));
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = mediaconv_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Video conversion needs ffmpeg.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Uploads: {}", config.paths.upload_dir.display());
    println!("  Outputs: {}", config.paths.output_dir.display());
    println!("  Archives: {}", config.paths.archive_dir.display());
    println!("  Database: {}", config.paths.database.display());
    println!("  Workers: {}", config.conversion.workers);
    println!("  Extra presets: {}", config.presets.len());

    Ok(())
}
