//! Task-list augmentation: write a sibling `*.prism.md` copy with a
//! `### PRISM Context` block spliced after each task body.
//!
//! The input file is never modified. The output carries a generated-file
//! marker; an output without the marker was edited by hand and is never
//! overwritten.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use prism_common::{Error, Result};

use prism_memory::{
    injector::approx_tokens,
    ranker::{self, RankRequest, RankWeights},
    store::SkillStore,
};

use crate::parser::{ParsedTask, parse_tasks};

/// First line of every augmented output file.
pub const AUGMENT_MARKER: &str = "<!-- PRISM AUGMENTED -->";

#[derive(Debug, Clone)]
pub struct AugmentOptions {
    /// Token budget for each task's context block.
    pub per_task_budget: usize,
    /// Candidate skills requested per task.
    pub per_task_limit: usize,
    /// Regenerate even when the output is already up to date.
    pub force: bool,
}

impl Default for AugmentOptions {
    fn default() -> Self {
        Self {
            per_task_budget: 500,
            per_task_limit: 5,
            force: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AugmentOutcome {
    pub output: PathBuf,
    /// False when an up-to-date output was left untouched.
    pub written: bool,
    pub tasks: usize,
}

/// Whether a file is a PRISM-generated augmented copy.
pub fn is_augmented(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|c| c.starts_with(AUGMENT_MARKER))
        .unwrap_or(false)
}

/// Output path for a source task file: `tasks.md` → `tasks.prism.md`.
pub fn output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tasks");
    source.with_file_name(format!("{stem}.prism.md"))
}

/// Augment `source`, writing the sibling `.prism.md` copy.
pub async fn augment_file(
    store: &SkillStore,
    source: &Path,
    stack: &[String],
    options: &AugmentOptions,
) -> Result<AugmentOutcome> {
    let content = std::fs::read_to_string(source)
        .map_err(|_| Error::not_found(format!("task file {}", source.display())))?;
    let output = output_path(source);

    if output.exists() {
        if !is_augmented(&output) {
            return Err(Error::conflict(format!(
                "{} exists but was not generated by PRISM; refusing to overwrite manual edits",
                output.display()
            )));
        }
        if !options.force {
            debug!(output = %output.display(), "augmented copy up to date, skipping");
            return Ok(AugmentOutcome {
                output,
                written: false,
                tasks: 0,
            });
        }
    }

    let tasks = parse_tasks(&content);
    let rendered = render_augmented(store, &content, &tasks, stack, options).await?;
    atomic_write(&output, &rendered)?;
    info!(source = %source.display(), output = %output.display(), tasks = tasks.len(), "augmented task file");
    Ok(AugmentOutcome {
        output,
        written: true,
        tasks: tasks.len(),
    })
}

/// Build the augmented document: marker line, then the source content with a
/// context block spliced at the end of each task section.
async fn render_augmented(
    store: &SkillStore,
    content: &str,
    tasks: &[ParsedTask],
    stack: &[String],
    options: &AugmentOptions,
) -> Result<String> {
    let mut out = String::with_capacity(content.len() + 512);
    out.push_str(AUGMENT_MARKER);
    out.push('\n');

    let mut cursor = 0usize;
    for task in tasks {
        out.push_str(&content[cursor..task.section_end]);
        cursor = task.section_end;
        out.push_str(&context_block(store, task, stack, options).await?);
    }
    out.push_str(&content[cursor..]);
    Ok(out)
}

/// One task's context block, empty when nothing ranked.
async fn context_block(
    store: &SkillStore,
    task: &ParsedTask,
    stack: &[String],
    options: &AugmentOptions,
) -> Result<String> {
    let ranked = ranker::rank(
        store,
        &RankRequest {
            query: task.query_text(),
            tags: stack.to_vec(),
            limit: options.per_task_limit,
            kind: None,
        },
        RankWeights::default(),
    )
    .await?;
    if ranked.is_empty() {
        return Ok(String::new());
    }

    let mut block = String::from("\n### PRISM Context\n\n");
    let mut used = approx_tokens(&block);
    for entry in &ranked {
        let header = &entry.skill.header;
        let title = if entry.skill.title.is_empty() {
            header.skill_id.as_str()
        } else {
            entry.skill.title.as_str()
        };
        let line = format!(
            "- **{}** ({}): {title}\n",
            header.skill_id,
            header.kind.as_str()
        );
        used += approx_tokens(&line);
        if used > options.per_task_budget {
            break;
        }
        block.push_str(&line);
    }
    block.push('\n');
    Ok(block)
}

fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, prism_memory::skill::*, std::collections::BTreeMap, tempfile::TempDir};

    const TASKS_MD: &str = "\
## Epic: Auth

### Task 1: Add login endpoint
Build the login handler with JWT sessions.

- [ ] issues a token

### Task 2: Password reset
Email-based reset flow.
";

    fn skill(id: &str, body: &str) -> Skill {
        Skill::new(
            SkillHeader {
                skill_id: id.into(),
                kind: SkillType::Skill,
                domain_tags: vec!["auth".into()],
                scope: Scope::Global,
                stack_context: vec![],
                created: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                last_used: None,
                reuse_count: 0,
                project_origin: None,
                status: SkillStatus::Active,
                verified_by: VerifiedBy::Human,
                extra: BTreeMap::new(),
            },
            body,
        )
    }

    async fn store_with_skills(tmp: &TempDir) -> SkillStore {
        let pool = prism_memory::store::open_pool(&tmp.path().join("index.db"))
            .await
            .unwrap();
        let store = SkillStore::open(tmp.path().join("memory"), pool, None)
            .await
            .unwrap();
        let mut s = skill(
            "jwt-session-issuance",
            "# JWT session issuance\n\nlogin endpoint JWT token sessions\n",
        );
        store.put(&mut s).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_augment_writes_sibling_and_keeps_input_intact() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_skills(&tmp).await;
        let source = tmp.path().join("tasks.md");
        std::fs::write(&source, TASKS_MD).unwrap();

        let outcome = augment_file(&store, &source, &[], &AugmentOptions::default())
            .await
            .unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.tasks, 2);
        assert_eq!(outcome.output, tmp.path().join("tasks.prism.md"));

        // Input byte-identical.
        assert_eq!(std::fs::read_to_string(&source).unwrap(), TASKS_MD);

        let augmented = std::fs::read_to_string(&outcome.output).unwrap();
        assert!(augmented.starts_with(AUGMENT_MARKER));
        assert!(augmented.contains("### PRISM Context"));
        assert!(augmented.contains("- **jwt-session-issuance** (skill): JWT session issuance"));
        // The block lands inside task 1's section, before task 2.
        let block_at = augmented.find("### PRISM Context").unwrap();
        let task2_at = augmented.find("### Task 2").unwrap();
        assert!(block_at < task2_at);
        // Original task content re-emitted verbatim.
        assert!(augmented.contains("Build the login handler with JWT sessions.\n"));
    }

    #[tokio::test]
    async fn test_augment_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_skills(&tmp).await;
        let source = tmp.path().join("tasks.md");
        std::fs::write(&source, TASKS_MD).unwrap();

        let first = augment_file(&store, &source, &[], &AugmentOptions::default())
            .await
            .unwrap();
        let first_bytes = std::fs::read_to_string(&first.output).unwrap();

        // Second run without force: skipped, file untouched.
        let second = augment_file(&store, &source, &[], &AugmentOptions::default())
            .await
            .unwrap();
        assert!(!second.written);
        assert_eq!(std::fs::read_to_string(&second.output).unwrap(), first_bytes);

        // Forced re-run: byte-identical output for an unchanged store.
        let forced = augment_file(
            &store,
            &source,
            &[],
            &AugmentOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(forced.written);
        assert_eq!(std::fs::read_to_string(&forced.output).unwrap(), first_bytes);
    }

    #[tokio::test]
    async fn test_manual_edits_surface_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_skills(&tmp).await;
        let source = tmp.path().join("tasks.md");
        std::fs::write(&source, TASKS_MD).unwrap();
        // A hand-written file at the output path, no marker.
        std::fs::write(tmp.path().join("tasks.prism.md"), "my notes\n").unwrap();

        let err = augment_file(
            &store,
            &source,
            &[],
            &AugmentOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        // Manual file untouched.
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("tasks.prism.md")).unwrap(),
            "my notes\n"
        );
    }

    #[tokio::test]
    async fn test_empty_store_emits_no_blocks() {
        let tmp = TempDir::new().unwrap();
        let pool = prism_memory::store::open_pool(&tmp.path().join("index.db"))
            .await
            .unwrap();
        let store = SkillStore::open(tmp.path().join("memory"), pool, None)
            .await
            .unwrap();
        let source = tmp.path().join("tasks.md");
        std::fs::write(&source, TASKS_MD).unwrap();

        let outcome = augment_file(&store, &source, &[], &AugmentOptions::default())
            .await
            .unwrap();
        let augmented = std::fs::read_to_string(&outcome.output).unwrap();
        assert!(!augmented.contains("### PRISM Context"));
        // Marker plus unmodified source.
        assert_eq!(augmented, format!("{AUGMENT_MARKER}\n{TASKS_MD}"));
    }

    #[tokio::test]
    async fn test_per_task_budget_caps_bullets() {
        let tmp = TempDir::new().unwrap();
        let pool = prism_memory::store::open_pool(&tmp.path().join("index.db"))
            .await
            .unwrap();
        let store = SkillStore::open(tmp.path().join("memory"), pool, None)
            .await
            .unwrap();
        for i in 0..5 {
            let mut s = skill(
                &format!("login-skill-{i}"),
                &format!("# Login skill {i}\n\nlogin endpoint JWT sessions\n"),
            );
            store.put(&mut s).await.unwrap();
        }
        let source = tmp.path().join("tasks.md");
        std::fs::write(&source, TASKS_MD).unwrap();

        let outcome = augment_file(
            &store,
            &source,
            &[],
            &AugmentOptions {
                // Enough for the heading plus roughly one bullet.
                per_task_budget: 25,
                per_task_limit: 5,
                force: false,
            },
        )
        .await
        .unwrap();
        let augmented = std::fs::read_to_string(&outcome.output).unwrap();
        let bullets = augmented.matches("- **login-skill-").count();
        assert!(bullets >= 1, "at least one bullet fits the budget");
        assert!(bullets < 10, "budget must cap the bullets: got {bullets}");
    }
}
