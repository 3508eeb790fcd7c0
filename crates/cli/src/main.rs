mod board_commands;
mod memory_commands;
mod skill_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing_subscriber::EnvFilter,
};

use prism_common::Result;

#[derive(Parser)]
#[command(name = "prism", about = "PRISM — memory and context broker for coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// PRISM home directory (overrides ~/.prism).
    #[arg(long, global = true, env = "PRISM_HOME")]
    prism_home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize PRISM in a project directory.
    Init {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Project name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
        /// Comma-separated technology stack tags.
        #[arg(long, value_delimiter = ',')]
        stack: Vec<String>,
    },
    /// Attach PRISM to an existing project (idempotent init).
    Attach {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Skill management.
    Skill {
        #[command(subcommand)]
        action: skill_commands::SkillAction,
    },
    /// Search the skill store.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Write ranked skills to .prism/injected-context.md.
    Inject {
        /// Free-text query to focus injection (defaults to the project
        /// description).
        #[arg(short, long, default_value = "")]
        query: String,
        /// Token budget override.
        #[arg(long)]
        budget: Option<usize>,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Augment a task list with per-task context blocks.
    Augment {
        /// Task file (defaults to the newest tasks.md under the project).
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        force: bool,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Board integration.
    Board {
        #[command(subcommand)]
        action: board_commands::BoardAction,
    },
    /// Run the webhook listener and file watcher.
    Listen {
        /// Port override for the webhook endpoint.
        #[arg(long)]
        port: Option<u16>,
        /// Directory watched for task files (defaults to <project>/specs).
        #[arg(long)]
        specs_dir: Option<PathBuf>,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Memory repository management.
    Memory {
        #[command(subcommand)]
        action: memory_commands::MemoryAction,
    },
    /// Index management.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Ask the evaluator for a verdict on a candidate skill file.
    Evaluate { file: PathBuf },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Discard and recreate the index from the on-disk corpus.
    Rebuild,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prism={level},warn")));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);
    if let Some(ref home) = cli.prism_home {
        prism_config::set_prism_home(home.clone());
    }

    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init { dir, name, stack } => {
            let name = name.unwrap_or_else(|| {
                dir.canonicalize()
                    .ok()
                    .and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .unwrap_or_else(|| "project".into())
            });
            prism_project::templates::init_project(&dir, &name, &stack)?;
            let config = prism_config::load_global_config();
            let store = skill_commands::open_store(&config).await?;
            println!(
                "initialized '{name}' ({} skills in memory)",
                store.count().await?
            );
            Ok(())
        },
        Commands::Attach { dir } => {
            let name = dir
                .canonicalize()
                .ok()
                .and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "project".into());
            prism_project::templates::init_project(&dir, &name, &[])?;
            println!("attached PRISM to '{name}'");
            Ok(())
        },
        Commands::Skill { action } => skill_commands::run(action).await,
        Commands::Search { query, limit } => skill_commands::search(&query, limit).await,
        Commands::Inject {
            query,
            budget,
            project_dir,
        } => skill_commands::inject(&query, budget, &project_dir).await,
        Commands::Augment {
            file,
            force,
            project_dir,
        } => skill_commands::augment(file, force, &project_dir).await,
        Commands::Board { action } => board_commands::run(action).await,
        Commands::Listen {
            port,
            specs_dir,
            project_dir,
        } => board_commands::listen(port, specs_dir, &project_dir).await,
        Commands::Memory { action } => memory_commands::run(action).await,
        Commands::Index { action } => match action {
            IndexAction::Rebuild => {
                let config = prism_config::load_global_config();
                let store = skill_commands::open_store(&config).await?;
                let count = store.rebuild_index().await?;
                println!("index rebuilt: {count} skills");
                Ok(())
            },
        },
        Commands::Evaluate { file } => skill_commands::evaluate(&file).await,
    }
}
