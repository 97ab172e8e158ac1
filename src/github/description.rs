//! Pull-request description updates.
//!
//! Descriptions are merged section-wise by default: a `## Heading` in the new
//! text replaces the section of the same heading, unmatched sections are
//! appended, and untouched sections keep their position.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use super::client::GitHubClient;
use super::transport::PullRequestTransport;
use crate::errors::DescriptionError;

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##\s+(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    Replace,
    Append,
    #[default]
    UpdateSections,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::UpdateSections => "update-sections",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "update-sections" => Ok(Self::UpdateSections),
            other => Err(DescriptionError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionUpdate {
    pub pr_number: u64,
    pub strategy: MergeStrategy,
    pub previous: String,
    pub merged: String,
    /// False for a dry run.
    pub applied: bool,
}

/// Markdown split at `## ` headings. Each section's text includes its heading.
#[derive(Debug, Default, PartialEq)]
struct Sections {
    preamble: Option<String>,
    sections: Vec<(String, String)>,
}

impl Sections {
    fn parse(markdown: &str) -> Self {
        let mut parsed = Sections::default();
        let mut preamble: Vec<&str> = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in markdown.split('\n') {
            if let Some(caps) = SECTION_HEADER.captures(line) {
                if let Some((name, lines)) = current.take() {
                    parsed.upsert(name, lines.join("\n"));
                }
                current = Some((caps[1].trim().to_string(), vec![line]));
            } else if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            } else {
                preamble.push(line);
            }
        }
        if let Some((name, lines)) = current {
            parsed.upsert(name, lines.join("\n"));
        }

        let preamble = preamble.join("\n");
        if !preamble.is_empty() {
            parsed.preamble = Some(preamble);
        }
        parsed
    }

    fn upsert(&mut self, name: String, content: String) {
        match self.sections.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = content,
            None => self.sections.push((name, content)),
        }
    }

    fn render(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(preamble) = self.preamble.as_deref()
            && !preamble.trim().is_empty()
        {
            parts.push(preamble);
        }
        parts.extend(self.sections.iter().map(|(_, content)| content.as_str()));
        parts.join("\n\n").trim().to_string()
    }
}

/// Merge `update` into `existing` by `## ` section.
pub fn merge_sections(existing: &str, update: &str) -> String {
    let mut merged = Sections::parse(existing);
    let incoming = Sections::parse(update);

    if incoming.preamble.is_some() {
        merged.preamble = incoming.preamble;
    }
    for (name, content) in incoming.sections {
        merged.upsert(name, content);
    }
    merged.render()
}

pub fn merge_description(existing: &str, update: &str, strategy: MergeStrategy) -> String {
    match strategy {
        MergeStrategy::Replace => update.to_string(),
        MergeStrategy::Append => format!("{}\n\n{}", existing, update),
        MergeStrategy::UpdateSections => merge_sections(existing, update),
    }
}

/// Fetch the PR body, merge `new_description` into it and write it back.
///
/// With `dry_run` the merged text is returned without writing.
pub async fn update_pr_description<T: PullRequestTransport>(
    client: &GitHubClient<T>,
    pr_number: u64,
    new_description: &str,
    strategy: MergeStrategy,
    dry_run: bool,
) -> Result<DescriptionUpdate, DescriptionError> {
    if pr_number == 0 {
        return Err(DescriptionError::InvalidPrNumber);
    }
    if new_description.trim().is_empty() {
        return Err(DescriptionError::EmptyDescription);
    }

    let previous = client.get_pr_description(pr_number).await?;
    let merged = merge_description(&previous, new_description, strategy);

    if !dry_run {
        client.update_pr_description(pr_number, &merged).await?;
        info!(pr_number, strategy = %strategy, "Updated pull request description");
    }

    Ok(DescriptionUpdate {
        pr_number,
        strategy,
        previous,
        merged,
        applied: !dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXISTING: &str = "Intro text\n\n## Summary\nOld summary\n\n## Testing\nRan unit tests";

    #[test]
    fn test_strategy_parse() {
        assert_eq!("replace".parse::<MergeStrategy>().unwrap(), MergeStrategy::Replace);
        assert_eq!(
            "update-sections".parse::<MergeStrategy>().unwrap(),
            MergeStrategy::UpdateSections
        );
        let err = "rewrite".parse::<MergeStrategy>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown merge strategy: rewrite");
        assert_eq!(MergeStrategy::default(), MergeStrategy::UpdateSections);
    }

    #[test]
    fn test_replace_and_append() {
        assert_eq!(merge_description("old", "new", MergeStrategy::Replace), "new");
        assert_eq!(
            merge_description("old", "new", MergeStrategy::Append),
            "old\n\nnew"
        );
    }

    #[test]
    fn test_update_sections_replaces_matching_section_in_place() {
        let merged = merge_sections(EXISTING, "## Summary\nNew summary");
        assert_eq!(
            merged,
            "Intro text\n\n\n## Summary\nNew summary\n\n## Testing\nRan unit tests"
        );
    }

    #[test]
    fn test_update_sections_appends_new_section() {
        let merged = merge_sections(EXISTING, "## Compliance\n100% met");
        assert!(merged.ends_with("## Testing\nRan unit tests\n\n## Compliance\n100% met"));
        assert!(merged.starts_with("Intro text"));
    }

    #[test]
    fn test_update_sections_new_preamble_wins() {
        let merged = merge_sections("Old intro\n## A\na", "New intro\n## B\nb");
        assert_eq!(merged, "New intro\n\n## A\na\n\n## B\nb");
    }

    #[test]
    fn test_update_sections_on_empty_description() {
        assert_eq!(merge_sections("", "## Summary\nText"), "## Summary\nText");
    }

    #[test]
    fn test_subheadings_stay_inside_section() {
        let merged = merge_sections("## Notes\n### Detail\nx", "## Other\ny");
        assert_eq!(merged, "## Notes\n### Detail\nx\n\n## Other\ny");
    }
}
