//! Skill memory: markdown documents → indexed (FTS5 + optional vectors) →
//! ranked → packed into token-budgeted context artifacts.

pub mod embeddings;
pub mod embeddings_http;
pub mod evaluator;
pub mod frontmatter;
pub mod gitsync;
pub mod injector;
pub mod ranker;
pub mod schema;
pub mod skill;
pub mod store;

pub use {
    embeddings::EmbeddingProvider,
    ranker::{RankWeights, RankedEntry},
    skill::{Scope, Skill, SkillHeader, SkillStatus, SkillType, VerifiedBy},
    store::{ListFilter, SearchHit, SkillStore, StatusFilter},
};
