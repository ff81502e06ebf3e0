use anyhow::Result;
use continuum_application::{ImportOptions, ImportPipeline};
use continuum_core::config::EngineConfig;
use continuum_core::import::ImportPhase;
use continuum_infrastructure::FsExportReader;
use std::path::Path;
use std::sync::Arc;

use super::utils::{open_store, truncate};

pub async fn run(config: &EngineConfig, path: &Path) -> Result<()> {
    let store = open_store(config).await?;
    let pipeline = Arc::new(ImportPipeline::new(
        Arc::new(FsExportReader::new()),
        Arc::new(store),
        ImportOptions {
            archive_imported: config.archive_imported,
            title_max_chars: config.title_max_chars,
        },
    ));

    let mut run = pipeline.spawn_import(path.to_path_buf());
    let cancel = run.cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling import...");
            cancel.cancel();
        }
    });

    while let Some(progress) = run.progress.recv().await {
        match progress.phase {
            ImportPhase::Scanning => println!("Reading {}", path.display()),
            ImportPhase::Importing => println!(
                "[{}/{}] {}",
                progress.processed + 1,
                progress.total,
                truncate(progress.current_title.as_deref().unwrap_or("(untitled)"), 60)
            ),
            ImportPhase::Complete => println!("Processed {} conversations", progress.processed),
            ImportPhase::Error => {
                eprintln!("Import failed: {}", progress.error.unwrap_or_default())
            }
        }
    }
    let result = run.finish().await;
    ctrl_c.abort();
    let result = result?;

    println!();
    println!("Imported:       {}", result.conversations_imported);
    println!("Already there:  {}", result.skipped_existing.len());
    println!("Context files:  {}", result.context_files_created);
    if !result.failures.is_empty() {
        println!("Failed:         {}", result.failures.len());
        for failure in &result.failures {
            println!(
                "  - {}: {}",
                failure
                    .title
                    .as_deref()
                    .or(failure.conversation_id.as_deref())
                    .unwrap_or("(unknown)"),
                failure.reason
            );
        }
    }
    if result.cancelled {
        println!("Import was cancelled; run it again to pick up the rest.");
    }
    Ok(())
}
