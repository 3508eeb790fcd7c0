//! The skill data model: a structured header plus a free-form markdown body.

use std::{collections::BTreeMap, path::PathBuf};

use {
    chrono::NaiveDate,
    serde::{Deserialize, Serialize},
};

use prism_common::{Error, Result};

/// What kind of knowledge a document encodes. Determines the on-disk subdir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Skill,
    Pattern,
    Gotcha,
    Decision,
}

impl SkillType {
    /// Subdirectory of the memory root holding documents of this type.
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Skill | Self::Pattern => "skills",
            Self::Gotcha => "gotchas",
            Self::Decision => "decisions",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Pattern => "pattern",
            Self::Gotcha => "gotcha",
            Self::Decision => "decision",
        }
    }
}

impl std::str::FromStr for SkillType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skill" => Ok(Self::Skill),
            "pattern" => Ok(Self::Pattern),
            "gotcha" => Ok(Self::Gotcha),
            "decision" => Ok(Self::Decision),
            other => Err(Error::invalid(format!("unknown skill type '{other}'"))),
        }
    }
}

/// Lifecycle status. Retirement is a status change, not a file deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    Active,
    Deprecated,
    Conflicted,
    NeedsReview,
}

impl SkillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Conflicted => "conflicted",
            Self::NeedsReview => "needs_review",
        }
    }

    /// Whether the ranker may surface a skill in this status.
    pub fn rankable(&self) -> bool {
        !matches!(self, Self::Deprecated | Self::Conflicted)
    }
}

impl std::str::FromStr for SkillStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "deprecated" => Ok(Self::Deprecated),
            "conflicted" => Ok(Self::Conflicted),
            "needs_review" => Ok(Self::NeedsReview),
            other => Err(Error::invalid(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifiedBy {
    Human,
    Agent,
}

/// Structured header of a skill document.
///
/// Named fields are typed; anything else round-trips through `extra` so that
/// hand-added keys survive a rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillHeader {
    pub skill_id: String,
    #[serde(rename = "type")]
    pub kind: SkillType,
    pub domain_tags: Vec<String>,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_context: Vec<String>,
    pub created: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<NaiveDate>,
    #[serde(default)]
    pub reuse_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_origin: Option<String>,
    #[serde(default = "default_status")]
    pub status: SkillStatus,
    #[serde(default = "default_verified_by")]
    pub verified_by: VerifiedBy,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_status() -> SkillStatus {
    SkillStatus::Active
}

fn default_verified_by() -> VerifiedBy {
    VerifiedBy::Human
}

/// Validate a skill id: lowercase kebab-case, 1-64 chars, no leading/trailing
/// or doubled hyphens.
pub fn validate_skill_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !id.starts_with('-')
        && !id.ends_with('-')
        && !id.contains("--")
}

impl SkillHeader {
    /// Check the header invariants: well-formed id, non-empty tags,
    /// `last_used >= created`.
    pub fn validate(&self) -> Result<()> {
        if !validate_skill_id(&self.skill_id) {
            return Err(Error::invalid(format!(
                "skill_id '{}' must be 1-64 lowercase kebab-case chars",
                self.skill_id
            )));
        }
        if self.domain_tags.is_empty() {
            return Err(Error::invalid(format!(
                "skill '{}' has empty domain_tags",
                self.skill_id
            )));
        }
        if let Some(last_used) = self.last_used
            && last_used < self.created
        {
            return Err(Error::invalid(format!(
                "skill '{}': last_used {last_used} precedes created {}",
                self.skill_id, self.created
            )));
        }
        Ok(())
    }

    /// `last_used`, defaulting to `created` for never-retrieved skills.
    pub fn effective_last_used(&self) -> NaiveDate {
        self.last_used.unwrap_or(self.created)
    }

    /// File name the document is stored under.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.skill_id)
    }
}

/// A skill document: header, extracted title, and verbatim body.
#[derive(Debug, Clone)]
pub struct Skill {
    pub header: SkillHeader,
    pub title: String,
    pub body: String,
    /// Where the document lives on disk; `None` until first persisted.
    pub path: Option<PathBuf>,
}

impl Skill {
    pub fn new(header: SkillHeader, body: impl Into<String>) -> Self {
        let body = body.into();
        let title = extract_title(&body);
        Self {
            header,
            title,
            body,
            path: None,
        }
    }

    /// Text fed to the embedding model and content hashing.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// First `# ` heading of the body, or empty.
pub fn extract_title(body: &str) -> String {
    body.lines()
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header(id: &str) -> SkillHeader {
        SkillHeader {
            skill_id: id.into(),
            kind: SkillType::Skill,
            domain_tags: vec!["testing".into()],
            scope: Scope::Global,
            stack_context: vec![],
            created: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            last_used: None,
            reuse_count: 0,
            project_origin: None,
            status: SkillStatus::Active,
            verified_by: VerifiedBy::Human,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_skill_id() {
        assert!(validate_skill_id("jwt-refresh-rotation"));
        assert!(validate_skill_id("a"));
        assert!(validate_skill_id("skill123"));
        assert!(!validate_skill_id(""));
        assert!(!validate_skill_id("-bad"));
        assert!(!validate_skill_id("bad-"));
        assert!(!validate_skill_id("Bad"));
        assert!(!validate_skill_id("has space"));
        assert!(!validate_skill_id("has--double"));
        assert!(!validate_skill_id(&"a".repeat(65)));
    }

    #[test]
    fn test_header_invariants() {
        let mut h = header("ok-skill");
        assert!(h.validate().is_ok());

        h.domain_tags.clear();
        assert!(h.validate().is_err());

        let mut h = header("ok-skill");
        h.last_used = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert!(h.validate().is_err());

        h.last_used = NaiveDate::from_ymd_opt(2025, 1, 10);
        assert!(h.validate().is_ok());
    }

    #[test]
    fn test_subdir_mapping() {
        assert_eq!(SkillType::Skill.subdir(), "skills");
        assert_eq!(SkillType::Pattern.subdir(), "skills");
        assert_eq!(SkillType::Gotcha.subdir(), "gotchas");
        assert_eq!(SkillType::Decision.subdir(), "decisions");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("# JWT Rotation\n\nbody"), "JWT Rotation");
        assert_eq!(extract_title("no heading here"), "");
        assert_eq!(extract_title("intro\n# Later Heading\n"), "Later Heading");
    }

    #[test]
    fn test_status_rankable() {
        assert!(SkillStatus::Active.rankable());
        assert!(SkillStatus::NeedsReview.rankable());
        assert!(!SkillStatus::Deprecated.rankable());
        assert!(!SkillStatus::Conflicted.rankable());
    }
}
