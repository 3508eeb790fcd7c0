//! Global PRISM configuration: `~/.prism/prism.config.yaml`.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_prism_home, config_dir, load_global_config, memory_dir, save_global_config,
        set_prism_home,
    },
    schema::{
        AgentRoleAssignment, BoardConfig, BudgetConfig, MemoryOptions, PrismConfig, ToolConfig,
        WebhookConfig,
    },
};
