//! Memory repository commands: status, sync (commit + push), pull.

use clap::Subcommand;

use prism_common::Result;

use prism_memory::gitsync::MemorySync;

use crate::skill_commands::open_store;

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Show pending memory changes and store counts.
    Status,
    /// Commit pending changes and push when a remote is configured.
    Sync {
        /// Commit message override.
        #[arg(long)]
        message: Option<String>,
    },
    /// Pull memory changes from the configured remote.
    Pull,
}

pub async fn run(action: MemoryAction) -> Result<()> {
    let config = prism_config::load_global_config();
    let root = prism_config::memory_dir(&config);
    let sync = MemorySync::new(root.clone(), config.memory.git_remote.clone());

    match action {
        MemoryAction::Status => {
            let store = open_store(&config).await?;
            println!("memory root: {}", root.display());
            println!("indexed skills: {}", store.count().await?);
            sync.ensure_repo().await?;
            let status = sync.status().await?;
            if status.is_clean() {
                println!("working tree clean");
            } else {
                println!("pending changes:");
                for line in &status.pending {
                    println!("  {line}");
                }
            }
            Ok(())
        },
        MemoryAction::Sync { message } => {
            sync.ensure_repo().await?;
            let committed = sync.commit(message.as_deref()).await?;
            if !committed {
                println!("nothing to commit");
            }
            if config.memory.git_remote.is_empty() {
                println!("no git_remote configured; skipping push");
            } else {
                sync.push().await?;
                println!("pushed to {}", config.memory.git_remote);
            }
            Ok(())
        },
        MemoryAction::Pull => {
            sync.ensure_repo().await?;
            sync.pull().await?;
            println!("memory up to date");
            Ok(())
        },
    }
}
