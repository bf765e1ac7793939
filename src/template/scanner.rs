use super::{Tag, TagObserver, TextBlock};
use regex::Regex;
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use std::sync::OnceLock;

/// Longest inner tag name accepted in permissive mode
pub const DEFAULT_MAX_TAG_LENGTH: usize = 50;

/// Tag grammar to scan with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Only `{{name}}`
    #[default]
    Strict,
    /// `{{name}}`, `{name}}` and `{{name}`, with length validation
    Permissive,
}

impl ScanMode {
    fn pattern(self) -> &'static Regex {
        static STRICT: OnceLock<Regex> = OnceLock::new();
        static PERMISSIVE: OnceLock<Regex> = OnceLock::new();

        // Alternation is leftmost-first: full form, then missing opening
        // brace, then missing closing brace.
        match self {
            ScanMode::Strict => STRICT.get_or_init(|| {
                Regex::new(r"\{\{([^}]+)\}\}").expect("strict tag pattern is valid")
            }),
            ScanMode::Permissive => PERMISSIVE.get_or_init(|| {
                Regex::new(r"\{\{([^}]+)\}\}|\{([^}]+)\}\}|\{\{([^}]+)\}")
                    .expect("permissive tag pattern is valid")
            }),
        }
    }
}

/// Tags and validation issues collected from a block sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub tags: Vec<Tag>,
    pub issues: Vec<String>,
}

impl ScanOutcome {
    /// Render the caller-visible result string.
    ///
    /// Any issue replaces the tag list entirely, even though the tags were
    /// collected.
    pub fn report(&self, reverse: bool) -> String {
        if !self.issues.is_empty() {
            return format!("Issues found:\n{}", self.issues.join("\n"));
        }
        if self.tags.is_empty() {
            return "No tags found in the document".to_string();
        }

        let mut raws: Vec<&str> = self.tags.iter().map(|t| t.raw.as_str()).collect();
        if reverse {
            raws.reverse();
        }
        raws.join(",")
    }
}

/// Scan blocks in order and collect every tag occurrence.
///
/// Blocks are expected in document order (body paragraphs, then table
/// cells), which is also the order of the returned tags. In permissive mode
/// an inner name longer than `max_len` characters produces an issue.
pub fn scan(
    blocks: &[TextBlock],
    mode: ScanMode,
    max_len: usize,
    observer: &dyn TagObserver,
) -> ScanOutcome {
    let pattern = mode.pattern();
    let mut outcome = ScanOutcome::default();

    for (index, block) in blocks.iter().enumerate() {
        observer.block_visited(index, block);

        for caps in pattern.captures_iter(&block.content) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let inner = (1..caps.len())
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str())
                .unwrap_or_default();

            observer.tag_found(whole.as_str());

            if mode == ScanMode::Permissive && inner.chars().count() > max_len {
                outcome.issues.push(format!(
                    "Tag is too long (more than {} characters excluding curly brackets): {}",
                    max_len,
                    whole.as_str()
                ));
            }

            outcome.tags.push(Tag {
                raw: whole.as_str().to_string(),
                inner: inner.to_string(),
                start: whole.start(),
                block: index,
            });
        }
    }

    outcome
}
