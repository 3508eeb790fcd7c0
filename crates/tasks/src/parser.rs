//! Parser for the de-facto task-list grammar:
//!
//! ```text
//! ## Epic: <title>
//! ### Task <n>: <title>
//! <free text>
//! - [ ] criterion
//! ```
//!
//! Tasks keep their body bytes verbatim so an augmented copy can re-emit
//! the original content unchanged.

/// Epic used for tasks with no enclosing `##` heading.
pub const IMPLICIT_EPIC: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpic {
    pub title: String,
    /// First plain paragraph line under the epic heading, before any task.
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub epic: String,
    /// Explicit ordinal from a `Task <n>:` prefix, when present.
    pub ordinal: Option<u32>,
    pub title: String,
    /// Verbatim bytes between the title line and the next heading.
    pub body: String,
    pub criteria: Vec<String>,
    /// Byte offset in the source where this task's section ends (start of
    /// the next heading, or end of input). Augmentation splices here.
    pub section_end: usize,
}

impl ParsedTask {
    /// Stable internal key: epic slug plus the explicit ordinal, falling
    /// back to the title slug.
    pub fn key(&self) -> String {
        match self.ordinal {
            Some(n) => format!("{}:{n}", slug(&self.epic)),
            None => format!("{}:{}", slug(&self.epic), slug(&self.title)),
        }
    }

    /// Query text for ranking: title plus body.
    pub fn query_text(&self) -> String {
        format!("{} {}", self.title, self.body.trim())
    }
}

/// Lowercase alphanumeric runs joined by hyphens.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Parse every task in a task-list document.
pub fn parse_tasks(content: &str) -> Vec<ParsedTask> {
    let mut tasks: Vec<ParsedTask> = Vec::new();
    let mut epic = IMPLICIT_EPIC.to_string();
    let mut current: Option<ParsedTask> = None;

    for (offset, line) in lines_with_offsets(content) {
        if let Some(rest) = line.strip_prefix("### ") {
            if let Some(mut task) = current.take() {
                task.section_end = offset;
                finish_task(&mut task);
                tasks.push(task);
            }
            let (ordinal, title) = strip_task_prefix(rest.trim_end());
            current = Some(ParsedTask {
                epic: epic.clone(),
                ordinal,
                title,
                body: String::new(),
                criteria: Vec::new(),
                section_end: content.len(),
            });
        } else if let Some(rest) = heading2(line) {
            if let Some(mut task) = current.take() {
                task.section_end = offset;
                finish_task(&mut task);
                tasks.push(task);
            }
            epic = strip_epic_prefix(rest.trim_end());
        } else if let Some(ref mut task) = current {
            task.body.push_str(line);
        }
    }

    if let Some(mut task) = current.take() {
        task.section_end = content.len();
        finish_task(&mut task);
        tasks.push(task);
    }
    tasks
}

/// Parse epic headings with their leading description paragraph.
pub fn parse_epics(content: &str) -> Vec<ParsedEpic> {
    let mut epics: Vec<ParsedEpic> = Vec::new();
    let mut in_tasks = false;
    let mut has_explicit = false;

    for (_, line) in lines_with_offsets(content) {
        if line.starts_with("### ") {
            in_tasks = true;
        } else if let Some(rest) = heading2(line) {
            epics.push(ParsedEpic {
                title: strip_epic_prefix(rest.trim_end()),
                description: String::new(),
            });
            has_explicit = true;
            in_tasks = false;
        } else if !in_tasks
            && let Some(epic) = epics.last_mut()
            && epic.description.is_empty()
        {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with('-') {
                epic.description = trimmed.to_string();
            }
        }
    }

    if !has_explicit && content.contains("### ") {
        epics.push(ParsedEpic {
            title: IMPLICIT_EPIC.into(),
            description: String::new(),
        });
    }
    epics
}

fn finish_task(task: &mut ParsedTask) {
    task.criteria = task
        .body
        .lines()
        .filter_map(|l| {
            let t = l.trim_start();
            t.strip_prefix("- [ ] ")
                .or_else(|| t.strip_prefix("- [x] "))
                .map(|c| c.trim_end().to_string())
        })
        .collect();
}

/// `## ` heading that is not a `### ` task heading.
fn heading2(line: &str) -> Option<&str> {
    if line.starts_with("### ") {
        return None;
    }
    line.strip_prefix("## ")
}

fn strip_epic_prefix(title: &str) -> String {
    title
        .strip_prefix("Epic:")
        .or_else(|| title.strip_prefix("Epic"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(title)
        .to_string()
}

/// Strip an optional `Task <n>:` prefix, returning the ordinal when present.
fn strip_task_prefix(title: &str) -> (Option<u32>, String) {
    if let Some(rest) = title.strip_prefix("Task ") {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let after = rest[digits.len()..]
                .trim_start_matches(':')
                .trim();
            if !after.is_empty() {
                return (digits.parse().ok(), after.to_string());
            }
        }
    }
    (None, title.trim().to_string())
}

/// Iterate lines with their starting byte offsets, keeping terminators.
fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0usize;
    content.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line)
    })
}
