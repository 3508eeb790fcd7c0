//! Skill store commands: add/get/list, search, inject, augment, evaluate.

use std::{path::Path, path::PathBuf, str::FromStr, sync::Arc};

use clap::Subcommand;

use prism_common::{Error, Result};

use {
    prism_config::{PrismConfig, memory_dir},
    prism_memory::{
        embeddings_http::HttpEmbeddingProvider,
        evaluator::Evaluator,
        frontmatter,
        injector::{self, InjectParams},
        ranker::{self, RankRequest, RankWeights},
        store::{ListFilter, SkillStore, StatusFilter, open_pool},
    },
    prism_project::{PrismDir, load_project_config},
    prism_tasks::augment::{AugmentOptions, augment_file},
};

#[derive(Subcommand)]
pub enum SkillAction {
    /// Add (or update) a skill from a markdown file.
    Add { file: PathBuf },
    /// Print a skill document.
    Get { skill_id: String },
    /// List skills in the store.
    List {
        /// Status filter: active, deprecated, conflicted, needs_review, all.
        #[arg(long, default_value = "active")]
        status: String,
        /// Filter by type (skill, pattern, gotcha, decision).
        #[arg(long = "type")]
        kind: Option<String>,
        /// Filter by domain tag.
        #[arg(long)]
        tag: Option<String>,
    },
}

/// Open the global skill store per config (embeddings when enabled and a
/// provider key is present).
pub async fn open_store(config: &PrismConfig) -> Result<SkillStore> {
    let root = memory_dir(config);
    let pool = open_pool(&root.join("index.db")).await?;
    let embedder = if config.memory.embeddings_enabled {
        HttpEmbeddingProvider::from_env()
            .map(|p| Arc::new(p) as Arc<dyn prism_memory::EmbeddingProvider>)
    } else {
        None
    };
    SkillStore::open(root, pool, embedder).await
}

pub async fn run(action: SkillAction) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = open_store(&config).await?;

    match action {
        SkillAction::Add { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|_| Error::not_found(format!("skill file {}", file.display())))?;
            let mut skill = frontmatter::parse_skill(&content)?;
            let path = store.put(&mut skill).await?;
            println!("stored {} -> {}", skill.header.skill_id, path.display());
            Ok(())
        },
        SkillAction::Get { skill_id } => {
            let skill = store.get(&skill_id).await?;
            print!("{}", frontmatter::render_skill(&skill)?);
            Ok(())
        },
        SkillAction::List { status, kind, tag } => {
            let status = match status.as_str() {
                "all" => Some(StatusFilter::All),
                other => Some(StatusFilter::Only(FromStr::from_str(other)?)),
            };
            let kind = kind
                .as_deref()
                .map(prism_memory::skill::SkillType::from_str)
                .transpose()?;
            let filter = ListFilter { status, kind, tag };
            let skills = store.list(&filter).await?;
            for skill in &skills {
                println!(
                    "{:<32} {:<9} {:<12} reuse={}",
                    skill.header.skill_id,
                    skill.header.kind.as_str(),
                    skill.header.status.as_str(),
                    skill.header.reuse_count
                );
            }
            println!("{} skills", skills.len());
            Ok(())
        },
    }
}

pub async fn search(query: &str, limit: usize) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = open_store(&config).await?;
    let ranked = ranker::rank(
        &store,
        &RankRequest {
            query: query.to_string(),
            tags: vec![],
            limit,
            kind: None,
        },
        RankWeights::default(),
    )
    .await?;
    for entry in &ranked {
        println!(
            "{:.3}  {:<32} {}",
            entry.score, entry.skill.header.skill_id, entry.skill.title
        );
    }
    println!("{} results", ranked.len());
    Ok(())
}

pub async fn inject(query: &str, budget: Option<usize>, project_dir: &Path) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = open_store(&config).await?;
    let project = load_project_config(project_dir)?;

    let effective_query = if !query.is_empty() {
        query.to_string()
    } else if !project.description.is_empty() {
        project.description.clone()
    } else {
        project.name.clone()
    };
    let budget = budget.unwrap_or(config.budgets.inject);

    let ranked = ranker::rank(
        &store,
        &RankRequest {
            query: effective_query.clone(),
            tags: project.stack.clone(),
            limit: 25,
            kind: None,
        },
        RankWeights::default(),
    )
    .await?;

    let prism = PrismDir::new(project_dir);
    prism.ensure()?;
    let output = prism.injected_context();
    let report = injector::inject(
        &store,
        &ranked,
        &InjectParams {
            query: effective_query,
            budget,
        },
        &output,
    )
    .await?;
    println!(
        "{} skills injected ({}/{} tokens) -> {}",
        report.emitted.len(),
        report.tokens_used,
        report.tokens_budget,
        output.display()
    );
    Ok(())
}

pub async fn augment(file: Option<PathBuf>, force: bool, project_dir: &Path) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = open_store(&config).await?;
    let project = load_project_config(project_dir)?;

    let source = match file {
        Some(f) => f,
        None => find_latest_task_file(project_dir).ok_or_else(|| {
            Error::not_found(format!("no tasks.md under {}", project_dir.display()))
        })?,
    };

    let options = AugmentOptions {
        per_task_budget: config.budgets.per_task,
        force,
        ..Default::default()
    };
    let outcome = augment_file(&store, &source, &project.stack, &options).await?;
    if outcome.written {
        println!(
            "augmented {} tasks -> {}",
            outcome.tasks,
            outcome.output.display()
        );
    } else {
        println!("{} is up to date (use --force to regenerate)", outcome.output.display());
    }
    Ok(())
}

/// Newest `tasks.md` under the project tree, by modification time.
pub fn find_latest_task_file(project_dir: &Path) -> Option<PathBuf> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in walkdir::WalkDir::new(project_dir).into_iter().flatten() {
        let path = entry.path();
        if !path.is_file() || path.file_name().and_then(|n| n.to_str()) != Some("tasks.md") {
            continue;
        }
        let mtime = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| mtime > *t) {
            newest = Some((mtime, path.to_path_buf()));
        }
    }
    newest.map(|(_, p)| p)
}

pub async fn evaluate(file: &Path) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = open_store(&config).await?;
    let content = std::fs::read_to_string(file)
        .map_err(|_| Error::not_found(format!("candidate file {}", file.display())))?;

    let existing: Vec<String> = store
        .list(&ListFilter::default())
        .await?
        .into_iter()
        .map(|s| s.header.skill_id)
        .collect();

    let model = config.models.get("evaluator").map(String::as_str);
    let evaluator = Evaluator::from_env(model)?;
    let verdict = evaluator.evaluate(&content, &existing).await?;

    println!("decision: {:?}", verdict.decision);
    if !verdict.skill_id.is_empty() {
        println!("skill_id: {}", verdict.skill_id);
    }
    if !verdict.merge_with.is_empty() {
        println!("merge_with: {}", verdict.merge_with);
    }
    if !verdict.reason.is_empty() {
        println!("reason: {}", verdict.reason);
    }
    Ok(())
}
