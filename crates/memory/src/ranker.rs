//! Hybrid ranking: lexical + semantic + tag affinity + reuse + recency.

use chrono::NaiveDate;

use prism_common::{Error, Result};

use crate::{
    skill::{Skill, SkillType},
    store::{SearchHit, SkillStore},
};

/// Days after which a skill's recency score bottoms out.
const RECENCY_HORIZON_DAYS: f32 = 180.0;

/// Component weights for the combined score. All must be non-negative.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub lex: f32,
    pub sem: f32,
    pub tag: f32,
    pub reuse: f32,
    pub recency: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            lex: 1.0,
            sem: 1.0,
            tag: 3.0,
            reuse: 2.0,
            recency: 1.5,
        }
    }
}

impl RankWeights {
    pub fn validate(&self) -> Result<()> {
        let all = [self.lex, self.sem, self.tag, self.reuse, self.recency];
        if all.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(Error::invalid("rank weights must be non-negative"));
        }
        Ok(())
    }
}

/// A ranked candidate with its component scores, each in [0, 1].
#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub skill: Skill,
    pub lex: f32,
    pub sem: f32,
    pub tag: f32,
    pub reuse: f32,
    pub recency: f32,
    pub score: f32,
}

/// A ranking request: free-text query, context tags (project stack plus any
/// explicit focus tags), candidate limit, optional type filter.
#[derive(Debug, Clone, Default)]
pub struct RankRequest {
    pub query: String,
    pub tags: Vec<String>,
    pub limit: usize,
    pub kind: Option<SkillType>,
}

/// Rank candidates from the store for a request.
pub async fn rank(
    store: &SkillStore,
    request: &RankRequest,
    weights: RankWeights,
) -> Result<Vec<RankedEntry>> {
    weights.validate()?;
    // Over-fetch so post-filtering still fills the limit.
    let fetch = (request.limit.max(1)) * 3;
    let hits = store.search(&request.query, fetch).await?;
    Ok(rank_hits(hits, request, weights, crate::store::today()))
}

/// Pure ranking over already-retrieved candidates. Split out so stability is
/// testable without a store.
pub fn rank_hits(
    hits: Vec<SearchHit>,
    request: &RankRequest,
    weights: RankWeights,
    today: NaiveDate,
) -> Vec<RankedEntry> {
    let max_lex = hits.iter().map(|h| h.lexical).fold(0.0f32, f32::max);
    let max_reuse = hits
        .iter()
        .map(|h| h.skill.header.reuse_count)
        .max()
        .unwrap_or(0);

    let mut entries: Vec<RankedEntry> = hits
        .into_iter()
        .filter(|h| h.skill.header.status.rankable())
        .filter(|h| request.kind.is_none_or(|k| h.skill.header.kind == k))
        .map(|h| score_hit(h, request, weights, max_lex, max_reuse, today))
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.skill.header.reuse_count.cmp(&a.skill.header.reuse_count))
            .then(a.skill.header.skill_id.cmp(&b.skill.header.skill_id))
    });
    entries.truncate(request.limit);
    entries
}

fn score_hit(
    hit: SearchHit,
    request: &RankRequest,
    weights: RankWeights,
    max_lex: f32,
    max_reuse: u64,
    today: NaiveDate,
) -> RankedEntry {
    let header = &hit.skill.header;

    let lex = if max_lex > 0.0 {
        hit.lexical / max_lex
    } else {
        0.0
    };
    let sem = hit.semantic.clamp(0.0, 1.0);
    let tag = tag_affinity(&request.tags, header);
    let reuse = if max_reuse > 0 {
        ((1 + header.reuse_count) as f32).ln() / ((1 + max_reuse) as f32).ln()
    } else {
        0.0
    };
    let days_since = (today - header.effective_last_used()).num_days().max(0) as f32;
    let recency = 1.0 - (days_since / RECENCY_HORIZON_DAYS).min(1.0);

    let score = weights.lex * lex
        + weights.sem * sem
        + weights.tag * tag
        + weights.reuse * reuse
        + weights.recency * recency;

    RankedEntry {
        skill: hit.skill,
        lex,
        sem,
        tag,
        reuse,
        recency,
        score,
    }
}

/// Fraction of query tags present in the skill's domain tags or stack context.
fn tag_affinity(query_tags: &[String], header: &crate::skill::SkillHeader) -> f32 {
    if query_tags.is_empty() {
        return 0.0;
    }
    let matched = query_tags
        .iter()
        .filter(|t| header.domain_tags.contains(t) || header.stack_context.contains(t))
        .count();
    matched as f32 / query_tags.len() as f32
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::skill::tests::header, crate::skill::SkillStatus, tempfile::TempDir};

    fn hit(id: &str, lexical: f32, tags: &[&str], reuse: u64) -> SearchHit {
        let mut h = header(id);
        h.domain_tags = tags.iter().map(|t| t.to_string()).collect();
        h.reuse_count = reuse;
        h.last_used = Some(h.created);
        SearchHit {
            skill: Skill::new(h, format!("# {id}\n")),
            lexical,
            semantic: 0.0,
        }
    }

    fn request(tags: &[&str], limit: usize) -> RankRequest {
        RankRequest {
            query: "q".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            limit,
            kind: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    #[test]
    fn test_tag_affinity_overrides_lexical() {
        // P matches strongly lexically but is tagged for another stack;
        // Q matches weakly but carries the project's tags.
        let p = hit("p-python-testing", 10.0, &["python"], 0);
        let q = hit("q-react-testing", 4.0, &["react", "testing"], 0);

        let ranked = rank_hits(
            vec![p, q],
            &request(&["javascript", "react"], 10),
            RankWeights::default(),
            today(),
        );
        assert_eq!(ranked[0].skill.header.skill_id, "q-react-testing");
        assert!(ranked[0].tag > ranked[1].tag);
    }

    #[test]
    fn test_stable_tie_breaking() {
        // Identical scores: higher reuse wins, then smaller skill_id.
        let a = hit("aaa", 5.0, &["x"], 3);
        let b = hit("bbb", 5.0, &["x"], 3);
        let c = hit("ccc", 5.0, &["x"], 7);

        let ranked = rank_hits(
            vec![b, a, c],
            &request(&[], 10),
            // Zero out reuse weight so reuse differences don't change score.
            RankWeights {
                reuse: 0.0,
                ..Default::default()
            },
            today(),
        );
        let ids: Vec<&str> = ranked.iter().map(|e| e.skill.header.skill_id.as_str()).collect();
        assert_eq!(ids, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let make = || {
            vec![
                hit("one", 3.0, &["a"], 1),
                hit("two", 2.0, &["b"], 5),
                hit("three", 2.5, &["a", "b"], 0),
            ]
        };
        let req = request(&["a"], 10);
        let first: Vec<String> = rank_hits(make(), &req, RankWeights::default(), today())
            .into_iter()
            .map(|e| e.skill.header.skill_id)
            .collect();
        let second: Vec<String> = rank_hits(make(), &req, RankWeights::default(), today())
            .into_iter()
            .map(|e| e.skill.header.skill_id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deprecated_and_conflicted_filtered() {
        let mut dead = hit("dead", 100.0, &["x"], 9);
        dead.skill.header.status = SkillStatus::Deprecated;
        let mut fighting = hit("fighting", 100.0, &["x"], 9);
        fighting.skill.header.status = SkillStatus::Conflicted;
        let alive = hit("alive", 1.0, &["x"], 0);

        let ranked = rank_hits(
            vec![dead, fighting, alive],
            &request(&[], 10),
            RankWeights::default(),
            today(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].skill.header.skill_id, "alive");
    }

    #[test]
    fn test_recency_decay() {
        let mut fresh = hit("fresh", 1.0, &["x"], 0);
        fresh.skill.header.last_used = Some(today());
        let mut stale = hit("stale", 1.0, &["x"], 0);
        stale.skill.header.created = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        stale.skill.header.last_used = NaiveDate::from_ymd_opt(2024, 1, 2);

        let ranked = rank_hits(
            vec![stale, fresh],
            &request(&[], 10),
            RankWeights::default(),
            today(),
        );
        assert_eq!(ranked[0].skill.header.skill_id, "fresh");
        assert!((ranked[0].recency - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].recency, 0.0);
    }

    #[test]
    fn test_negative_weights_rejected() {
        let w = RankWeights {
            tag: -1.0,
            ..Default::default()
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_type_filter() {
        let mut g = hit("a-gotcha", 5.0, &["x"], 0);
        g.skill.header.kind = SkillType::Gotcha;
        let s = hit("a-skill", 5.0, &["x"], 0);

        let mut req = request(&[], 10);
        req.kind = Some(SkillType::Gotcha);
        let ranked = rank_hits(vec![g, s], &req, RankWeights::default(), today());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].skill.header.skill_id, "a-gotcha");
    }

    #[tokio::test]
    async fn test_rank_against_store() {
        let tmp = TempDir::new().unwrap();
        let store = crate::store::tests::open_test_store(&tmp).await;

        for (id, body, tags) in [
            (
                "component-testing-py",
                "# Component testing in Python\n\ncomponent testing pytest fixtures\n",
                vec!["python"],
            ),
            (
                "component-testing-react",
                "# Testing React components\n\ncomponent render testing\n",
                vec!["react", "testing"],
            ),
        ] {
            let mut h = header(id);
            h.domain_tags = tags.into_iter().map(String::from).collect();
            let mut s = Skill::new(h, body);
            store.put(&mut s).await.unwrap();
        }

        let ranked = rank(
            &store,
            &RankRequest {
                query: "component testing".into(),
                tags: vec!["javascript".into(), "react".into()],
                limit: 5,
                kind: None,
            },
            RankWeights::default(),
        )
        .await
        .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].skill.header.skill_id, "component-testing-react");
    }
}
