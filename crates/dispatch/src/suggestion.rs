//! Completion candidates and the builder argument types fill in.

use indexmap::IndexSet;

/// Half-open byte range into command input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StringRange {
    pub start: usize,
    pub end: usize,
}

impl StringRange {
    pub const fn at(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub const fn between(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn encompassing(a: Self, b: Self) -> Self {
        Self::between(a.start.min(b.start), a.end.max(b.end))
    }

    pub fn get<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// One candidate: replace `range` of the input with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suggestion {
    pub range: StringRange,
    pub text: String,
    pub tooltip: Option<String>,
}

impl Suggestion {
    pub fn new(range: StringRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
            tooltip: None,
        }
    }

    /// The input with this candidate applied.
    pub fn apply(&self, input: &str) -> String {
        if self.range.start == 0 && self.range.end == input.len() {
            return self.text.clone();
        }
        let mut result = String::with_capacity(input.len() + self.text.len());
        result.push_str(&input[..self.range.start]);
        result.push_str(&self.text);
        if self.range.end < input.len() {
            result.push_str(&input[self.range.end..]);
        }
        result
    }

    /// Widen to `range`, copying the surrounding input into the text.
    pub fn expand(&self, command: &str, range: StringRange) -> Self {
        if range == self.range {
            return self.clone();
        }
        let mut text = String::new();
        if range.start < self.range.start {
            text.push_str(&command[range.start..self.range.start]);
        }
        text.push_str(&self.text);
        if range.end > self.range.end {
            text.push_str(&command[self.range.end..range.end]);
        }
        Self {
            range,
            text,
            tooltip: self.tooltip.clone(),
        }
    }
}

/// An ordered, de-duplicated candidate list sharing one replacement range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suggestions {
    pub range: StringRange,
    pub list: Vec<Suggestion>,
}

impl Suggestions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.list.iter().map(|s| s.text.as_str()).collect()
    }

    /// Normalise candidates to a common range. Discovery order is kept and
    /// duplicates after expansion are dropped.
    pub fn create(command: &str, suggestions: impl IntoIterator<Item = Suggestion>) -> Self {
        let suggestions: Vec<Suggestion> = suggestions.into_iter().collect();
        if suggestions.is_empty() {
            return Self::empty();
        }
        let mut start = usize::MAX;
        let mut end = 0;
        for suggestion in &suggestions {
            start = start.min(suggestion.range.start);
            end = end.max(suggestion.range.end);
        }
        let range = StringRange::between(start, end);
        let expanded: IndexSet<Suggestion> = suggestions
            .iter()
            .map(|suggestion| suggestion.expand(command, range))
            .collect();
        Self {
            range,
            list: expanded.into_iter().collect(),
        }
    }

    /// The same candidates with every range moved `offset` bytes right, for
    /// input that was completed without a prefix.
    pub fn shifted(mut self, offset: usize) -> Self {
        if offset == 0 || self.is_empty() {
            return self;
        }
        let shift = |range: StringRange| StringRange::between(range.start + offset, range.end + offset);
        self.range = shift(self.range);
        for suggestion in &mut self.list {
            suggestion.range = shift(suggestion.range);
        }
        self
    }

    pub fn merge(command: &str, input: Vec<Suggestions>) -> Self {
        match input.len() {
            0 => Self::empty(),
            1 => input.into_iter().next().unwrap_or_default(),
            _ => {
                let all: IndexSet<Suggestion> =
                    input.into_iter().flat_map(|s| s.list.into_iter()).collect();
                Self::create(command, all)
            }
        }
    }
}

/// Collects candidates for the token starting at `start`.
#[derive(Debug, Clone)]
pub struct SuggestionsBuilder {
    input: String,
    start: usize,
    remaining_lower: String,
    result: Vec<Suggestion>,
}

impl SuggestionsBuilder {
    pub fn new(input: impl Into<String>, start: usize) -> Self {
        let input = input.into();
        let start = start.min(input.len());
        let remaining_lower = input[start..].to_lowercase();
        Self {
            input,
            start,
            remaining_lower,
            result: Vec::new(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// The partial token being completed.
    pub fn remaining(&self) -> &str {
        &self.input[self.start..]
    }

    pub fn remaining_lowercase(&self) -> &str {
        &self.remaining_lower
    }

    pub fn suggest(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text == self.remaining() {
            return self;
        }
        self.result.push(Suggestion::new(
            StringRange::between(self.start, self.input.len()),
            text,
        ));
        self
    }

    pub fn suggest_with_tooltip(&mut self, text: impl Into<String>, tooltip: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text == self.remaining() {
            return self;
        }
        self.result.push(Suggestion {
            range: StringRange::between(self.start, self.input.len()),
            text,
            tooltip: Some(tooltip.into()),
        });
        self
    }

    pub fn suggest_int(&mut self, value: i64) -> &mut Self {
        self.suggest(value.to_string())
    }

    /// Suggest every candidate the partial token matches on any segment.
    pub fn suggest_matching<I, T>(&mut self, candidates: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let remaining = self.remaining_lower.clone();
        for candidate in candidates {
            let candidate = candidate.as_ref();
            if matches_sub_str(&remaining, &candidate.to_lowercase()) {
                self.suggest(candidate);
            }
        }
        self
    }

    /// Suggest namespaced ids; a bare partial token also matches the path of
    /// `minecraft:` ids.
    pub fn suggest_resources<I, T>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let remaining = self.remaining_lower.clone();
        for id in ids {
            let id = id.as_ref();
            if resource_matches(&remaining, id) {
                self.suggest(id);
            }
        }
        self
    }

    pub fn add(&mut self, other: SuggestionsBuilder) -> &mut Self {
        self.result.extend(other.result);
        self
    }

    /// A fresh builder over the same input at another offset.
    pub fn create_offset(&self, start: usize) -> Self {
        Self::new(self.input.clone(), start)
    }

    pub fn restart(&self) -> Self {
        self.create_offset(self.start)
    }

    pub fn build(self) -> Suggestions {
        Suggestions::create(&self.input, self.result)
    }
}

const MATCH_SPLITTERS: [char; 3] = ['.', '_', '/'];

/// Whether `input` is a prefix of `candidate` at its start or right after any
/// `.`, `_` or `/`.
pub fn matches_sub_str(input: &str, candidate: &str) -> bool {
    let mut index = 0;
    while !candidate[index..].starts_with(input) {
        match candidate[index..].find(MATCH_SPLITTERS) {
            Some(offset) => index += offset + 1,
            None => return false,
        }
    }
    true
}

fn resource_matches(input: &str, id: &str) -> bool {
    let id_lower = id.to_lowercase();
    if input.contains(':') {
        return matches_sub_str(input, &id_lower);
    }
    let (namespace, path) = id_lower.split_once(':').unwrap_or(("minecraft", id_lower.as_str()));
    matches_sub_str(input, namespace) || (namespace == "minecraft" && matches_sub_str(input, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_string_matching_splits_on_separators() {
        assert!(matches_sub_str("", "anything"));
        assert!(matches_sub_str("gold", "gold_block"));
        assert!(matches_sub_str("block", "gold_block"));
        assert!(matches_sub_str("ore", "deepslate/iron.ore"));
        assert!(!matches_sub_str("old", "gold_block"));
        assert!(!matches_sub_str("lock", "gold_block"));
    }

    #[test]
    fn resources_complete_on_namespace_or_minecraft_path() {
        let ids = ["minecraft:overworld", "minecraft:the_nether", "custom:nether_roof"];
        let mut builder = SuggestionsBuilder::new("in neth", 3);
        builder.suggest_resources(ids);
        assert_eq!(builder.build().texts(), vec!["minecraft:the_nether"]);

        let mut builder = SuggestionsBuilder::new("in custom:", 3);
        builder.suggest_resources(ids);
        assert_eq!(builder.build().texts(), vec!["custom:nether_roof"]);
    }

    #[test]
    fn builder_skips_exact_match_and_keeps_insertion_order() {
        let mut builder = SuggestionsBuilder::new("weather ra", 8);
        builder.suggest("rain").suggest("ra").suggest("rainbow").suggest("rain");
        let built = builder.build();
        assert_eq!(built.range, StringRange::between(8, 10));
        assert_eq!(built.texts(), vec!["rain", "rainbow"]);
    }

    #[test]
    fn merge_expands_to_common_range() {
        let command = "tp Al";
        let names = Suggestions::create(command, [Suggestion::new(StringRange::between(3, 5), "Alex")]);
        let coords = Suggestions::create(command, [Suggestion::new(StringRange::at(5), " ~")]);
        let merged = Suggestions::merge(command, vec![names, coords]);
        assert_eq!(merged.range, StringRange::between(3, 5));
        assert_eq!(merged.texts(), vec!["Alex", "Al ~"]);
    }

    #[test]
    fn apply_replaces_range() {
        let suggestion = Suggestion::new(StringRange::between(3, 5), "Alex");
        assert_eq!(suggestion.apply("tp Al"), "tp Alex");
        let whole = Suggestion::new(StringRange::between(0, 2), "say");
        assert_eq!(whole.apply("sa"), "say");
    }
}
