use anyhow::Result;
use continuum_application::{ImportOptions, ImportPipeline};
use continuum_core::config::EngineConfig;
use continuum_infrastructure::FsExportReader;
use std::path::Path;
use std::sync::Arc;

use super::utils::open_store;

pub async fn run(config: &EngineConfig, path: &Path) -> Result<()> {
    let store = open_store(config).await?;
    let pipeline = ImportPipeline::new(
        Arc::new(FsExportReader::new()),
        Arc::new(store),
        ImportOptions::default(),
    );
    let scan = pipeline.scan(path).await?;

    let Some(kind) = scan.source_kind else {
        println!("No recognizable conversations in {}", path.display());
        return Ok(());
    };

    println!("Export:         {}", path.display());
    println!("Format:         {}", kind);
    println!(
        "Conversations:  {} ({} with messages)",
        scan.total_conversations, scan.non_empty_conversations
    );
    if let (Some(oldest), Some(newest)) = (scan.oldest, scan.newest) {
        println!(
            "Date range:     {} .. {}",
            oldest.format("%Y-%m-%d"),
            newest.format("%Y-%m-%d")
        );
    }
    println!("Memory:         {}", if scan.has_memory { "yes" } else { "no" });
    if let Some(projects) = &scan.projects {
        println!("Projects:       {}", projects.count);
        for name in &projects.names {
            println!("  - {}", name);
        }
    }
    Ok(())
}
