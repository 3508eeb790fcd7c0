//! Configuration schema for the global `prism.config.yaml`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An external agent tool registered with PRISM (how to launch it and which
/// context file it reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub command: String,
    pub context_file: String,
    #[serde(default)]
    pub mcp_support: bool,
}

/// Assignment of a tool + model to an agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRoleAssignment {
    pub tool: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Memory subsystem options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryOptions {
    /// Root of the skill corpus. `~` is expanded by the loader.
    #[serde(default = "default_memory_path")]
    pub global_path: String,
    /// Git remote for `prism memory sync`; empty disables push/pull.
    #[serde(default)]
    pub git_remote: String,
    /// Commit memory changes automatically after mutations.
    #[serde(default = "default_true")]
    pub auto_commit: bool,
    /// Enable the semantic (vector) retrieval path.
    #[serde(default)]
    pub embeddings_enabled: bool,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            global_path: default_memory_path(),
            git_remote: String::new(),
            auto_commit: true,
            embeddings_enabled: false,
        }
    }
}

/// Connection details for the external Kanban board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_board_url")]
    pub url: String,
    /// Total deadline for one logical board call, in seconds.
    #[serde(default = "default_board_deadline")]
    pub deadline_secs: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            url: default_board_url(),
            deadline_secs: default_board_deadline(),
        }
    }
}

/// Webhook listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    /// Capacity of the bounded event queue; a full queue answers 503.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: default_webhook_port(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Token budgets for generated artifacts. Tunable, never hardcoded in the
/// injector itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Project-wide `injected-context.md` budget.
    #[serde(default = "default_inject_budget")]
    pub inject: usize,
    /// Per-task budget for augmented context blocks.
    #[serde(default = "default_per_task_budget")]
    pub per_task: usize,
    /// `current-task.md` briefing budget.
    #[serde(default = "default_briefing_budget")]
    pub briefing: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            inject: default_inject_budget(),
            per_task: default_per_task_budget(),
            briefing: default_briefing_budget(),
        }
    }
}

/// The global configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismConfig {
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
    /// Model aliases, e.g. `evaluator: claude-haiku-4-5`.
    #[serde(default)]
    pub models: BTreeMap<String, String>,
    #[serde(default)]
    pub agent_roles: BTreeMap<String, AgentRoleAssignment>,
    #[serde(default)]
    pub memory: MemoryOptions,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub budgets: BudgetConfig,
}

fn default_memory_path() -> String {
    "~/.prism/memory".into()
}

fn default_true() -> bool {
    true
}

fn default_board_url() -> String {
    "http://localhost:9000".into()
}

fn default_board_deadline() -> u64 {
    30
}

fn default_webhook_port() -> u16 {
    8765
}

fn default_queue_capacity() -> usize {
    64
}

fn default_inject_budget() -> usize {
    4000
}

fn default_per_task_budget() -> usize {
    500
}

fn default_briefing_budget() -> usize {
    3500
}
