//! Frontmatter handling: `---`-fenced YAML header + markdown body.

use prism_common::{Error, Result};

use crate::skill::{Skill, SkillHeader, extract_title};

/// Split a document at the `---` fences into (header yaml, body).
///
/// The body keeps its character content verbatim apart from the single
/// newline separating it from the closing fence.
pub fn split_frontmatter(content: &str) -> Result<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or_else(|| Error::invalid("document must start with a `---` header fence"))?;
    let close = rest
        .find("\n---")
        .ok_or_else(|| Error::invalid("document missing closing `---` header fence"))?;
    let header = &rest[..close + 1];
    let mut body = &rest[close + 4..];
    // The closing fence owns its own line; drop the line break that follows it.
    body = body.strip_prefix('\n').unwrap_or(body);
    body = body.strip_prefix('\n').unwrap_or(body);
    Ok((header, body))
}

/// Parse a full skill document.
pub fn parse_skill(content: &str) -> Result<Skill> {
    let (header_yaml, body) = split_frontmatter(content)?;
    let header: SkillHeader =
        serde_yaml::from_str(header_yaml).map_err(|e| Error::invalid(format!("bad header: {e}")))?;
    header.validate()?;
    Ok(Skill {
        title: extract_title(body),
        body: body.to_string(),
        header,
        path: None,
    })
}

/// Render a skill back to its on-disk form. Unknown header keys are
/// preserved via the header's flattened side map. The output always ends in
/// exactly one trailing newline.
pub fn render_skill(skill: &Skill) -> Result<String> {
    let yaml =
        serde_yaml::to_string(&skill.header).map_err(|e| Error::invalid(e.to_string()))?;
    let body = skill.body.trim_end_matches('\n');
    Ok(format!("---\n{yaml}---\n\n{body}\n"))
}
