use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use scriv::cli::{Cli, Commands, ModelsAction};
use scriv::config::Config;
use scriv::models::catalog::list_models;
use scriv::models::download::{ensure_model, format_model_info, is_model_installed, models_dir, remove_model};
use scriv::pipeline::{ProgressFn, QueueConfig, TranscriptionQueue, ingest_file};
use scriv::record::{TranscriptRecord, TranscriptStatus, format_timestamp};
use scriv::store::{FsBlobStore, FsRecordStore, RecordStore};
use scriv::stt::WhisperEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Add { files } => cmd_add(&config, &files, cli.quiet).await?,
        Commands::Run {
            model,
            language,
            threads,
        } => cmd_run(config, model, language, threads, cli.quiet).await?,
        Commands::List => cmd_list(&config).await?,
        Commands::Show { id } => cmd_show(&config, &id).await?,
        Commands::Cancel { id } => cmd_cancel(&config, &id, cli.quiet).await?,
        Commands::Models { action } => handle_models_command(action).await?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

async fn cmd_add(config: &Config, files: &[PathBuf], quiet: bool) -> Result<()> {
    let root = config.store.root_dir();
    let records = FsRecordStore::new(&root);
    let blobs = FsBlobStore::new(&root);

    let mut failures = 0usize;
    for file in files {
        match ingest_file(&records, &blobs, file).await {
            Ok(record) => {
                if !quiet {
                    eprintln!("Queued {} ({})", record.name, short_id(&record.id));
                }
            }
            Err(e) => {
                eprintln!("scriv: failed to add {}: {}", file.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} file(s) could not be added", failures);
    }
    if !quiet {
        eprintln!("Run 'scriv run' to start transcription.");
    }
    Ok(())
}

async fn cmd_run(
    config: Config,
    model: Option<String>,
    language: Option<String>,
    threads: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let root = config.store.root_dir();
    let records: Arc<dyn RecordStore> = Arc::new(FsRecordStore::new(&root));
    let blobs = Arc::new(FsBlobStore::new(&root));

    let pending_ids = pending_record_ids(records.as_ref()).await?;
    if pending_ids.is_empty() {
        if !quiet {
            eprintln!("Nothing to do.");
        }
        return Ok(());
    }

    let model = model.unwrap_or_else(|| config.stt.model.clone());
    if !quiet {
        eprintln!(
            "Processing {} pending record(s) with model '{}'...",
            pending_ids.len(),
            model
        );
    }

    let engine = Arc::new(WhisperEngine::new(&model));
    let queue_config = QueueConfig {
        language: language.unwrap_or_else(|| config.stt.language.clone()),
        threads: threads.unwrap_or_else(|| config.stt.thread_count()),
        segmenter: config.segmenter.clone(),
    };

    let progress: Option<ProgressFn> = if quiet {
        None
    } else {
        Some(Arc::new(|id: &str, value: f64| {
            eprint!("\r{}  {:>5.1}%  ", short_id(id), value * 100.0);
        }))
    };

    let queue = TranscriptionQueue::new(
        Arc::clone(&records),
        blobs,
        engine,
        queue_config,
        progress,
    );
    queue.poke();
    queue.wait_until_idle().await?;
    if !quiet {
        eprintln!();
    }

    // Summarize only the records this run picked up.
    let processed: Vec<_> = records
        .list_all()
        .await?
        .into_iter()
        .filter(|r| pending_ids.contains(&r.id))
        .collect();
    let completed = processed
        .iter()
        .filter(|r| r.status == TranscriptStatus::Completed)
        .count();
    let failed = processed
        .iter()
        .filter(|r| r.status == TranscriptStatus::Error)
        .count();
    if !quiet {
        eprintln!("Done: {} completed, {} failed.", completed, failed);
    }
    if failed > 0 {
        anyhow::bail!("{} record(s) ended in error; see 'scriv list'", failed);
    }
    Ok(())
}

async fn cmd_list(config: &Config) -> Result<()> {
    let records = FsRecordStore::new(config.store.root_dir());
    let mut all = records.list_all().await?;
    if all.is_empty() {
        println!("No records.");
        return Ok(());
    }
    all.sort_by_key(|r| r.created_at);

    for record in &all {
        println!(
            "{}  {}  {}  {}",
            short_id(&record.id),
            colored_status(record.status),
            format_timestamp(record.duration),
            record.name
        );
    }
    Ok(())
}

fn colored_status(status: TranscriptStatus) -> String {
    let padded = format!("{:<10}", status.to_string());
    match status {
        TranscriptStatus::Pending => padded.yellow().to_string(),
        TranscriptStatus::Processing => padded.blue().to_string(),
        TranscriptStatus::Completed => padded.green().to_string(),
        TranscriptStatus::Error => padded.red().to_string(),
        TranscriptStatus::Cancelled => padded.dimmed().to_string(),
    }
}

async fn cmd_show(config: &Config, id: &str) -> Result<()> {
    let records = FsRecordStore::new(config.store.root_dir());
    let record = resolve_record(&records, id).await?;

    println!(
        "{}  [{}]  {}",
        record.name,
        record.status,
        format_timestamp(record.duration)
    );
    if let Some(error) = &record.error {
        println!("  error: {}", error);
    }
    for segment in &record.segments {
        println!(
            "[{} --> {}]  {}",
            format_timestamp(segment.start),
            format_timestamp(segment.end),
            segment.text
        );
    }
    Ok(())
}

async fn cmd_cancel(config: &Config, id: &str, quiet: bool) -> Result<()> {
    let records = FsRecordStore::new(config.store.root_dir());
    let mut record = resolve_record(&records, id).await?;

    if record.status != TranscriptStatus::Pending {
        anyhow::bail!(
            "record {} is {}; only pending records can be cancelled here",
            short_id(&record.id),
            record.status
        );
    }

    record.status = TranscriptStatus::Cancelled;
    record.touch();
    records.put(&record).await?;
    if !quiet {
        eprintln!("Cancelled {} ({})", record.name, short_id(&record.id));
    }
    Ok(())
}

/// Finds a record by exact id or unique prefix.
async fn resolve_record(records: &dyn RecordStore, id: &str) -> Result<TranscriptRecord> {
    if let Some(record) = records.get(id).await? {
        return Ok(record);
    }

    let matches: Vec<TranscriptRecord> = records
        .list_all()
        .await?
        .into_iter()
        .filter(|r| r.id.starts_with(id))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no record matches '{}'", id),
        1 => Ok(matches.into_iter().next().unwrap()),
        n => anyhow::bail!("'{}' is ambiguous ({} records match)", id, n),
    }
}

async fn pending_record_ids(records: &dyn RecordStore) -> Result<Vec<String>> {
    Ok(records
        .list_all()
        .await?
        .into_iter()
        .filter(|r| r.status == TranscriptStatus::Pending)
        .map(|r| r.id)
        .collect())
}

async fn handle_models_command(action: ModelsAction) -> Result<()> {
    match action {
        ModelsAction::List => {
            println!("Available models:");
            for model in list_models() {
                println!("  {}", format_model_info(model));
            }
        }
        ModelsAction::Install { name } => {
            if is_model_installed(&name) {
                eprintln!("Model '{}' is already installed.", name);
            } else {
                ensure_model(&name, None, true).await?;
            }
        }
        ModelsAction::Remove { name } => {
            if remove_model(&name)? {
                eprintln!("Removed model '{}'.", name);
            } else {
                eprintln!("Model '{}' is not installed.", name);
            }
        }
        ModelsAction::Dir => {
            println!("{}", models_dir().display());
        }
    }
    Ok(())
}
