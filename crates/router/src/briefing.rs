//! Generation of the per-task briefing (`.prism/current-task.md`) when a
//! task enters the in-progress column.

use std::path::PathBuf;

use {chrono::Utc, tokio_util::sync::CancellationToken, tracing::debug};

use prism_common::{Error, Result};

use {
    prism_board::types::BoardTask,
    prism_memory::{
        injector::approx_tokens,
        ranker::{self, RankRequest, RankWeights, RankedEntry},
        skill::SkillType,
    },
    prism_project::{PrismDir, load_project_config},
};

use crate::dispatch::RouterContext;

const DEFINITION_OF_DONE: &str = "\
## Definition of Done
- [ ] Automated tests pass in CI
- [ ] Only files in scope of this task were modified
- [ ] Output section filled below
- [ ] Task moved to Done on the board
";

const OUTPUT_BLOCK: &str = "\
## Output (fill when complete)
```yaml
files_modified: []
tests_added: []
decisions_made: []
notes: \"\"
blockers_found: []
```
";

/// Build and write the briefing for a fetched board task. Returns the
/// artifact path. Honors cancellation between the expensive stages.
pub async fn generate_briefing(
    ctx: &RouterContext,
    task: &BoardTask,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let project = load_project_config(&ctx.project_dir)?;
    let (description, criteria) = split_criteria(&task.description);

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let ranked = ranker::rank(
        &ctx.store,
        &RankRequest {
            query: format!("{} {}", task.title, task.description),
            tags: project.stack.clone(),
            limit: 10,
            kind: None,
        },
        RankWeights::default(),
    )
    .await?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Greedy selection under the briefing budget, in rank order.
    let mut included: Vec<&RankedEntry> = Vec::new();
    let mut used = 0usize;
    for entry in &ranked {
        let cost = approx_tokens(&skill_line(entry));
        if used + cost > ctx.budgets.briefing {
            continue;
        }
        used += cost;
        included.push(entry);
    }

    let project_name = if project.name.is_empty() {
        ctx.project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string()
    } else {
        project.name.clone()
    };

    let content = render(
        task,
        &project_name,
        &description,
        &criteria,
        &included,
    );

    let prism = PrismDir::new(&ctx.project_dir);
    prism.ensure()?;
    let output = prism.current_task();
    atomic_write(&output, &content)?;

    for entry in &included {
        ctx.store.increment_reuse(&entry.skill.header.skill_id).await?;
    }

    debug!(
        board_id = %task.id,
        skills = included.len(),
        output = %output.display(),
        "briefing generated"
    );
    Ok(output)
}

/// Separate checkbox lines from the rest of a board task description.
fn split_criteria(description: &str) -> (String, Vec<String>) {
    let mut plain = Vec::new();
    let mut criteria = Vec::new();
    for line in description.lines() {
        let t = line.trim_start();
        if let Some(c) = t
            .strip_prefix("- [ ] ")
            .or_else(|| t.strip_prefix("- [x] "))
        {
            criteria.push(c.trim_end().to_string());
        } else {
            plain.push(line);
        }
    }
    (plain.join("\n").trim().to_string(), criteria)
}

fn skill_line(entry: &RankedEntry) -> String {
    let header = &entry.skill.header;
    let title = if entry.skill.title.is_empty() {
        header.skill_id.as_str()
    } else {
        entry.skill.title.as_str()
    };
    let location = entry
        .skill
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!("- **{}:** {title} → `{location}`\n", header.skill_id)
}

fn section(entries: &[&RankedEntry], kinds: &[SkillType]) -> String {
    let lines: String = entries
        .iter()
        .filter(|e| kinds.contains(&e.skill.header.kind))
        .map(|e| skill_line(e))
        .collect();
    if lines.is_empty() {
        "*(none found)*\n".into()
    } else {
        lines
    }
}

fn format_criteria(criteria: &[String]) -> String {
    if criteria.is_empty() {
        return "- [ ] (no criteria on the board task — add manually)\n".into();
    }
    criteria
        .iter()
        .map(|c| format!("- [ ] {c}\n"))
        .collect()
}

fn render(
    task: &BoardTask,
    project_name: &str,
    description: &str,
    criteria: &[String],
    included: &[&RankedEntry],
) -> String {
    let epic = task.epic_id.as_deref().unwrap_or("—");
    let what_to_build = if description.is_empty() {
        "*(see the board task for details)*"
    } else {
        description
    };
    format!(
        "# Current Task: {id} — {title}\n\n\
         > **Project:** {project_name}\n\
         > **Epic:** {epic}\n\
         > **Status:** In Progress\n\
         > **Generated:** {timestamp}\n\n\
         ---\n\n\
         ## What to Build\n{what_to_build}\n\n\
         ---\n\n\
         ## Acceptance Criteria\n{criteria}\
         > If a criterion is ambiguous, escalate before implementing.\n\n\
         ---\n\n\
         ## PRISM Context\n\n\
         ### Relevant Skills\n{skills}\n\
         ### Gotchas to Watch\n{gotchas}\n\
         ### Architecture Decisions in Scope\n{decisions}\n\
         ---\n\n\
         {dod}\n\
         ---\n\n\
         {output}",
        id = task.id,
        title = task.title,
        timestamp = Utc::now().format("%Y-%m-%d %H:%M"),
        criteria = format_criteria(criteria),
        skills = section(included, &[SkillType::Skill, SkillType::Pattern]),
        gotchas = section(included, &[SkillType::Gotcha]),
        decisions = section(included, &[SkillType::Decision]),
        dod = DEFINITION_OF_DONE,
        output = OUTPUT_BLOCK,
    )
}

fn atomic_write(path: &std::path::Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
