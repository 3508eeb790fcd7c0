//! Token-budgeted packing of ranked skills into a deterministic markdown
//! artifact.

use std::path::Path;

use {chrono::Utc, tracing::debug};

use prism_common::Result;

use crate::{ranker::RankedEntry, store::SkillStore};

/// Approximate LLM tokens: 4 characters per token, rounded up. Every budget
/// in the pipeline uses this estimator; no external tokenizer is consulted.
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Parameters for one injection run.
#[derive(Debug, Clone)]
pub struct InjectParams {
    pub query: String,
    pub budget: usize,
}

/// What an injection run produced.
#[derive(Debug, Clone)]
pub struct InjectReport {
    /// Skill ids emitted, in rank order.
    pub emitted: Vec<String>,
    pub tokens_used: usize,
    pub tokens_budget: usize,
}

/// Render one skill section exactly as it appears in the artifact.
pub fn render_section(entry: &RankedEntry) -> String {
    let header = &entry.skill.header;
    let title = if entry.skill.title.is_empty() {
        header.skill_id.clone()
    } else {
        entry.skill.title.clone()
    };
    format!(
        "## {title}\n\n\
         - type: {kind} | id: `{id}` | tags: {tags}\n\n\
         {body}\n",
        kind = header.kind.as_str(),
        id = header.skill_id,
        tags = header.domain_tags.join(", "),
        body = entry.skill.body.trim_end_matches('\n'),
    )
}

/// Greedily pack ranked entries under the token budget.
///
/// A section that would overflow is skipped, not a stopping point, so a
/// large skill can be passed over in favor of smaller lower-ranked ones. A
/// section bigger than the entire budget is never emitted.
pub fn pack<'a>(entries: &'a [RankedEntry], budget: usize) -> (Vec<&'a RankedEntry>, usize) {
    let mut selected = Vec::new();
    let mut used = 0usize;
    for entry in entries {
        let cost = approx_tokens(&render_section(entry));
        if cost > budget || used + cost > budget {
            continue;
        }
        used += cost;
        selected.push(entry);
    }
    (selected, used)
}

/// Write the injected-context artifact and bump reuse for every emitted
/// skill, in rank order. The file is replaced atomically; a failed write
/// leaves the previous artifact intact.
pub async fn inject(
    store: &SkillStore,
    entries: &[RankedEntry],
    params: &InjectParams,
    output: &Path,
) -> Result<InjectReport> {
    let (selected, tokens_used) = pack(entries, params.budget);

    let mut artifact = String::new();
    artifact.push_str("<!-- Generated by PRISM. Regenerated in full on every run; do not edit. -->\n");
    artifact.push_str("# PRISM Injected Context\n\n");
    artifact.push_str(&format!(
        "> Generated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    artifact.push_str(&format!("> Query: {}\n", params.query));
    artifact.push_str(&format!(
        "> Budget: {} tokens ({} used, {} skills)\n\n",
        params.budget,
        tokens_used,
        selected.len()
    ));
    for entry in &selected {
        artifact.push_str(&render_section(entry));
        artifact.push('\n');
    }

    crate::store::atomic_write(output, &artifact)?;

    let mut emitted = Vec::with_capacity(selected.len());
    for entry in &selected {
        store.increment_reuse(&entry.skill.header.skill_id).await?;
        emitted.push(entry.skill.header.skill_id.clone());
    }

    debug!(
        output = %output.display(),
        emitted = emitted.len(),
        tokens = tokens_used,
        "wrote injected context"
    );
    Ok(InjectReport {
        emitted,
        tokens_used,
        tokens_budget: params.budget,
    })
}

/// Strip the generation-timestamp line for byte comparison of artifacts.
pub fn strip_timestamp(artifact: &str) -> String {
    artifact
        .lines()
        .filter(|l| !l.starts_with("> Generated:"))
        .collect::<Vec<_>>()
        .join("\n")
}
