use super::{BlockOrigin, TagObserver, TextBlock};
use serde_json::{Map, Value};

/// Ordered tag → replacement pairs.
///
/// Order matters: replacements run in insertion order over the
/// progressively rewritten block text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    entries: Vec<(String, String)>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; empty tags are ignored since they would match everywhere
    pub fn push(&mut self, tag: impl Into<String>, replacement: impl Into<String>) {
        let tag = tag.into();
        if tag.is_empty() {
            return;
        }
        self.entries.push((tag, replacement.into()));
    }

    /// Build from a flat JSON object whose keys are literal tags (braces included)
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut map = Self::new();
        for (tag, value) in object {
            map.push(tag.clone(), scalar_text(value));
        }
        map
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (tag, replacement) in iter {
            map.push(tag, replacement);
        }
        map
    }
}

/// Render a JSON node as plain text: strings unquoted, scalars via their
/// JSON spelling, null and containers as empty text.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// New text for a block whose content changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Index of the block in the input sequence
    pub block: usize,
    pub origin: BlockOrigin,
    pub text: String,
}

/// Replace every literal occurrence of each tag, block by block.
///
/// Only blocks whose text actually changed produce a [`Rewrite`]. Each pair
/// is applied once to the text produced by the previous pairs, so a
/// replacement value is never re-scanned by its own tag.
pub fn substitute(
    blocks: &[TextBlock],
    map: &SubstitutionMap,
    observer: &dyn TagObserver,
) -> Vec<Rewrite> {
    let mut rewrites = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        observer.block_visited(index, block);

        let mut text = block.content.clone();
        for (tag, replacement) in map.iter() {
            if text.contains(tag) {
                observer.tag_replaced(tag, replacement);
                text = text.replace(tag, replacement);
            } else {
                observer.tag_missing(tag);
            }
        }

        if text != block.content {
            observer.block_rewritten(&block.content, &text);
            rewrites.push(Rewrite {
                block: index,
                origin: block.origin,
                text,
            });
        }
    }

    rewrites
}

/// Produce the rewritten block sequence
pub fn apply_rewrites(blocks: &[TextBlock], rewrites: &[Rewrite]) -> Vec<TextBlock> {
    let mut out = blocks.to_vec();
    for rewrite in rewrites {
        if let Some(block) = out.get_mut(rewrite.block) {
            block.content = rewrite.text.clone();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::NoopObserver;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl TagObserver for Recorder {
        fn tag_replaced(&self, tag: &str, replacement: &str) {
            self.events
                .borrow_mut()
                .push(format!("replace {} -> {}", tag, replacement));
        }

        fn tag_missing(&self, tag: &str) {
            self.events.borrow_mut().push(format!("missing {}", tag));
        }
    }

    fn run(blocks: &[TextBlock], map: &SubstitutionMap) -> Vec<TextBlock> {
        apply_rewrites(blocks, &substitute(blocks, map, &NoopObserver))
    }

    #[test]
    fn test_empty_map_is_identity() {
        let blocks = vec![
            TextBlock::paragraph(0, "Hello {{NAME}}"),
            TextBlock::paragraph(1, ""),
        ];
        let rewrites = substitute(&blocks, &SubstitutionMap::new(), &NoopObserver);
        assert!(rewrites.is_empty());
        assert_eq!(run(&blocks, &SubstitutionMap::new()), blocks);
    }

    #[test]
    fn test_hello_world_and_rerun_is_noop() {
        let blocks = vec![TextBlock::paragraph(0, "Hello {{NAME}}")];
        let map: SubstitutionMap = [("{{NAME}}", "World")].into_iter().collect();

        let once = run(&blocks, &map);
        assert_eq!(once[0].content, "Hello World");

        let again = substitute(&once, &map, &NoopObserver);
        assert!(again.is_empty());
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let blocks = vec![TextBlock::paragraph(0, "{{A}}-{{A}}-{{B}}")];
        let map: SubstitutionMap = [("{{A}}", "x"), ("{{B}}", "y")].into_iter().collect();
        assert_eq!(run(&blocks, &map)[0].content, "x-x-y");
    }

    #[test]
    fn test_replacement_not_rescanned_by_same_tag() {
        let blocks = vec![TextBlock::paragraph(0, "{{A}}")];
        let map: SubstitutionMap = [("{{A}}", "{{A}}{{A}}")].into_iter().collect();
        assert_eq!(run(&blocks, &map)[0].content, "{{A}}{{A}}");
    }

    #[test]
    fn test_unmatched_tags_stay_verbatim() {
        let blocks = vec![TextBlock::paragraph(0, "{{A}} and {{Z}}")];
        let map: SubstitutionMap = [("{{A}}", "1")].into_iter().collect();
        assert_eq!(run(&blocks, &map)[0].content, "1 and {{Z}}");
    }

    #[test]
    fn test_only_changed_blocks_are_rewritten() {
        let blocks = vec![
            TextBlock::paragraph(0, "nothing here"),
            TextBlock::paragraph(1, "{{A}}"),
        ];
        let map: SubstitutionMap = [("{{A}}", "1")].into_iter().collect();
        let rewrites = substitute(&blocks, &map, &NoopObserver);
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].block, 1);
        assert_eq!(rewrites[0].origin, BlockOrigin::Paragraph { index: 1 });
    }

    #[test]
    fn test_flat_json_keeps_declaration_order() {
        let object: Map<String, Value> =
            serde_json::from_str(r#"{"{{B}}": "{{A}}", "{{A}}": "done"}"#).unwrap();
        let map = SubstitutionMap::from_json_object(&object);
        let keys: Vec<&str> = map.iter().map(|(t, _)| t).collect();
        assert_eq!(keys, vec!["{{B}}", "{{A}}"]);

        // The second pair sees the output of the first
        let blocks = vec![TextBlock::paragraph(0, "{{B}}")];
        assert_eq!(run(&blocks, &map)[0].content, "done");
    }

    #[test]
    fn test_flat_json_scalars_render_as_text() {
        let object: Map<String, Value> =
            serde_json::from_str(r#"{"{{n}}": 42, "{{b}}": true, "{{z}}": null}"#).unwrap();
        let map = SubstitutionMap::from_json_object(&object);
        let values: Vec<&str> = map.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["42", "true", ""]);
    }

    #[test]
    fn test_empty_tag_is_ignored() {
        let map: SubstitutionMap = [("", "x")].into_iter().collect();
        assert!(map.is_empty());
    }

    #[test]
    fn test_observer_sees_replacements_and_misses() {
        let recorder = Recorder::default();
        let blocks = vec![TextBlock::paragraph(0, "{{A}}")];
        let map: SubstitutionMap = [("{{A}}", "1"), ("{{B}}", "2")].into_iter().collect();
        substitute(&blocks, &map, &recorder);
        assert_eq!(
            recorder.events.into_inner(),
            vec!["replace {{A}} -> 1".to_string(), "missing {{B}}".to_string()]
        );
    }
}
