//! Built-in templates for project initialization.

use std::path::Path;

use {chrono::Utc, tracing::info};

use prism_common::Result;

use crate::{
    config::{ProjectConfig, save_project_config},
    layout::PrismDir,
};

const BRIEFING_TEMPLATE: &str = "\
# {{ project_name }}

> Created: {{ date }}
> Stack: {{ stack }}

Project briefing for agents. Describe the architecture, conventions, and
anything an agent should read before touching code. PRISM injects ranked
skills separately; this file is for hand-written context.
";

const AGENTS_TEMPLATE: &str = "\
# Agent roles — {{ project_name }}

Per-project overrides of the global `agent_roles` section. Same schema as
`prism.config.yaml`; leave empty to inherit the global assignments.

agent_roles: {}
";

/// Initialize (or re-attach) PRISM in a project directory: create `.prism/`
/// and write the briefing, agent-roles, and project.yaml files.
///
/// Existing files are left untouched, so attach is idempotent.
pub fn init_project(project_dir: &Path, name: &str, stack: &[String]) -> Result<PrismDir> {
    let prism = PrismDir::new(project_dir);
    prism.ensure()?;

    let date = Utc::now().date_naive().to_string();
    let fill = |template: &str| {
        template
            .replace("{{ project_name }}", name)
            .replace("{{ date }}", &date)
            .replace("{{ stack }}", &stack.join(", "))
    };

    if !prism.briefing_md().exists() {
        std::fs::write(prism.briefing_md(), fill(BRIEFING_TEMPLATE))?;
    }
    if !prism.agents_md().exists() {
        std::fs::write(prism.agents_md(), fill(AGENTS_TEMPLATE))?;
    }
    if !prism.project_yaml().exists() {
        let config = ProjectConfig {
            name: name.to_string(),
            stack: stack.to_vec(),
            ..Default::default()
        };
        save_project_config(project_dir, &config)?;
    }

    info!(project = %name, dir = %project_dir.display(), "project initialized");
    Ok(prism)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::config::load_project_config, tempfile::TempDir};

    #[test]
    fn test_init_writes_all_files() {
        let tmp = TempDir::new().unwrap();
        let prism = init_project(tmp.path(), "shop", &["rust".into()]).unwrap();
        assert!(prism.briefing_md().exists());
        assert!(prism.agents_md().exists());
        assert!(prism.project_yaml().exists());

        let briefing = std::fs::read_to_string(prism.briefing_md()).unwrap();
        assert!(briefing.contains("# shop"));
        assert!(briefing.contains("rust"));

        let cfg = load_project_config(tmp.path()).unwrap();
        assert_eq!(cfg.name, "shop");
        assert_eq!(cfg.stack, vec!["rust"]);
    }

    #[test]
    fn test_init_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "shop", &[]).unwrap();

        // Hand-edit the briefing; re-attach must not clobber it.
        let prism = PrismDir::new(tmp.path());
        std::fs::write(prism.briefing_md(), "edited\n").unwrap();
        init_project(tmp.path(), "shop", &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(prism.briefing_md()).unwrap(),
            "edited\n"
        );
    }
}
