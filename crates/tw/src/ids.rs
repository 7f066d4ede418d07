//! Hierarchical issue identifiers.
//!
//! Every issue carries an identifier that encodes its place in a three-level
//! hierarchy:
//!
//! | Level | Shape                 | Example    |
//! |-------|-----------------------|------------|
//! | Epic  | `PREFIX-<epic>`       | `PROJ-3`   |
//! | Story | `PREFIX-<epic>-<n>`   | `PROJ-3-2` |
//! | Task  | `PREFIX-<epic>-<n><s>`| `PROJ-3-2b`|
//!
//! The task suffix is a bijective base-26 sequence of lowercase letters
//! (`a..z`, `aa..az`, `ba..`). Backlog items and orphan stories/tasks take an
//! epic-shaped slot.
//!
//! Identifiers order by prefix, then epic number, then story number (missing
//! counts as 0), then suffix length, then suffix text, so `P-1-1z < P-1-1aa`.
//!
//! # Example
//!
//! ```
//! use tw::ids::{IssueId, next_task_id};
//!
//! let story = IssueId::parse("PROJ-1-1").unwrap();
//! let existing = vec![story.clone(), IssueId::parse("PROJ-1-1a").unwrap()];
//!
//! let next = next_task_id("PROJ", Some(&story), &existing)?;
//! assert_eq!(next.to_string(), "PROJ-1-1b");
//! # Ok::<(), tw::error::Error>(())
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]+)-(\d+)(?:-(\d+)([a-z]+)?)?$").expect("identifier pattern is valid")
});

/// A parsed, validated issue identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueId {
    prefix: String,
    epic: u32,
    story: Option<u32>,
    suffix: Option<String>,
}

impl IssueId {
    /// Parse an identifier, rejecting anything outside the grammar.
    ///
    /// Numeric segments must be positive and carry no leading zeros so that
    /// every identifier has exactly one spelling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for malformed input.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        let caps = ID_PATTERN
            .captures(s)
            .ok_or_else(|| invalid("expected PREFIX-N, PREFIX-N-N or PREFIX-N-N<letters>"))?;

        let number = |text: &str| -> Result<u32> {
            if text.starts_with('0') {
                return Err(invalid("numbers must be positive without leading zeros"));
            }
            text.parse()
                .map_err(|_| invalid("number out of range"))
        };

        Ok(Self {
            prefix: caps[1].to_string(),
            epic: number(&caps[2])?,
            story: caps.get(3).map(|m| number(m.as_str())).transpose()?,
            suffix: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// Build an epic-level identifier.
    pub fn epic(prefix: impl Into<String>, epic: u32) -> Self {
        Self {
            prefix: prefix.into(),
            epic,
            story: None,
            suffix: None,
        }
    }

    /// Build a story-level identifier.
    pub fn story(prefix: impl Into<String>, epic: u32, story: u32) -> Self {
        Self {
            prefix: prefix.into(),
            epic,
            story: Some(story),
            suffix: None,
        }
    }

    /// Build a task-level identifier.
    pub fn task(prefix: impl Into<String>, epic: u32, story: u32, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            epic,
            story: Some(story),
            suffix: Some(suffix.into()),
        }
    }

    /// The project prefix (`PROJ` in `PROJ-1-2a`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The epic number.
    pub fn epic_num(&self) -> u32 {
        self.epic
    }

    /// The story number, if this id is story- or task-shaped.
    pub fn story_num(&self) -> Option<u32> {
        self.story
    }

    /// The task suffix, if this id is task-shaped.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    fn sort_key(&self) -> (&str, u32, u32, usize, &str) {
        let suffix = self.suffix.as_deref().unwrap_or("");
        (
            &self.prefix,
            self.epic,
            self.story.unwrap_or(0),
            suffix.len(),
            suffix,
        )
    }
}

impl Ord for IssueId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for IssueId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.epic)?;
        if let Some(story) = self.story {
            write!(f, "-{story}")?;
        }
        if let Some(suffix) = &self.suffix {
            f.write_str(suffix)?;
        }
        Ok(())
    }
}

impl FromStr for IssueId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IssueId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> Self {
        id.to_string()
    }
}

/// Sort identifiers in place using the hierarchy order.
pub fn sort_ids(ids: &mut [IssueId]) {
    ids.sort();
}

// ========== Suffix arithmetic ==========

/// The suffix that follows `suffix` in bijective base-26.
///
/// `a -> b`, `z -> aa`, `az -> ba`, `zz -> aaa`. An empty input yields `a`.
pub fn next_suffix(suffix: &str) -> String {
    let mut chars: Vec<u8> = suffix.bytes().collect();

    match chars.iter().rposition(|&c| c != b'z') {
        Some(pos) => {
            chars[pos] += 1;
            for c in &mut chars[pos + 1..] {
                *c = b'a';
            }
            chars.into_iter().map(char::from).collect()
        }
        None => "a".repeat(chars.len() + 1),
    }
}

fn suffix_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

// ========== Allocation ==========

fn successor(max: u32, level: &str) -> Result<u32> {
    max.checked_add(1)
        .ok_or_else(|| Error::Validation(format!("{level} numbers exhausted")))
}

fn max_epic(prefix: &str, existing: &[IssueId]) -> u32 {
    existing
        .iter()
        .filter(|id| id.prefix == prefix)
        .map(|id| id.epic)
        .max()
        .unwrap_or(0)
}

/// Next free epic-level slot for `prefix`.
///
/// Epics, backlog items and parentless stories/tasks all draw from this pool.
///
/// # Errors
///
/// `Error::Validation` once the largest epic number is taken.
pub fn next_epic_id(prefix: &str, existing: &[IssueId]) -> Result<IssueId> {
    let epic = successor(max_epic(prefix, existing), "epic")?;
    Ok(IssueId::epic(prefix, epic))
}

/// Next story identifier under `parent`, or an epic-level slot when orphaned.
///
/// # Errors
///
/// `Error::Validation` once the largest number at that level is taken.
pub fn next_story_id(
    prefix: &str,
    parent: Option<&IssueId>,
    existing: &[IssueId],
) -> Result<IssueId> {
    let Some(parent) = parent else {
        return next_epic_id(prefix, existing);
    };

    let max_story = existing
        .iter()
        .filter(|id| id.prefix == parent.prefix && id.epic == parent.epic)
        .filter_map(|id| id.story)
        .max()
        .unwrap_or(0);

    let story = successor(max_story, "story")?;
    Ok(IssueId::story(parent.prefix.clone(), parent.epic, story))
}

/// Next task identifier under `parent`, or an epic-level slot when orphaned.
///
/// A task directly under an epic takes the next story-shaped slot. A task
/// under a story (or under another task) takes the next suffix in that
/// story's scope.
///
/// # Errors
///
/// `Error::Validation` once the largest number at that level is taken.
pub fn next_task_id(
    prefix: &str,
    parent: Option<&IssueId>,
    existing: &[IssueId],
) -> Result<IssueId> {
    let Some(parent) = parent else {
        return next_epic_id(prefix, existing);
    };

    let Some(story) = parent.story else {
        let max_child = existing
            .iter()
            .filter(|id| id.prefix == parent.prefix && id.epic == parent.epic)
            .filter(|id| id.suffix.is_none())
            .filter_map(|id| id.story)
            .max()
            .unwrap_or(0);
        let story = successor(max_child, "story")?;
        return Ok(IssueId::story(parent.prefix.clone(), parent.epic, story));
    };

    let max_suffix = existing
        .iter()
        .filter(|id| {
            id.prefix == parent.prefix && id.epic == parent.epic && id.story == Some(story)
        })
        .filter_map(|id| id.suffix.as_deref())
        .max_by(|a, b| suffix_order(a, b));

    let suffix = max_suffix.map_or_else(|| "a".to_string(), next_suffix);
    Ok(IssueId::task(parent.prefix.clone(), parent.epic, story, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn id(s: &str) -> IssueId {
        IssueId::parse(s).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<IssueId> {
        list.iter().map(|s| id(s)).collect()
    }

    // ========== Parsing ==========

    #[rstest]
    #[case::epic("PROJ-1", "PROJ", 1, None, None)]
    #[case::story("PROJ-12-3", "PROJ", 12, Some(3), None)]
    #[case::task("PROJ-1-2a", "PROJ", 1, Some(2), Some("a"))]
    #[case::long_suffix("AB-7-1zz", "AB", 7, Some(1), Some("zz"))]
    fn test_parse_components(
        #[case] input: &str,
        #[case] prefix: &str,
        #[case] epic: u32,
        #[case] story: Option<u32>,
        #[case] suffix: Option<&str>,
    ) {
        let parsed = id(input);
        assert_eq!(parsed.prefix(), prefix);
        assert_eq!(parsed.epic_num(), epic);
        assert_eq!(parsed.story_num(), story);
        assert_eq!(parsed.suffix(), suffix);
        assert_eq!(parsed.to_string(), input);
    }

    #[rstest]
    #[case::empty("")]
    #[case::lowercase_prefix("proj-1")]
    #[case::no_number("PROJ-")]
    #[case::suffix_without_story("PROJ-1a")]
    #[case::uppercase_suffix("PROJ-1-1A")]
    #[case::too_many_levels("PROJ-1-2-3")]
    #[case::zero("PROJ-0")]
    #[case::leading_zero("PROJ-01")]
    #[case::trailing_space("PROJ-1 ")]
    fn test_parse_rejects_malformed(#[case] input: &str) {
        let err = IssueId::parse(input).unwrap_err();
        assert!(err.is_validation(), "{input:?} gave {err}");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let parsed = id("PROJ-1-2a");
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, "\"PROJ-1-2a\"");

        let back: IssueId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parsed);

        assert!(serde_json::from_str::<IssueId>("\"nope\"").is_err());
    }

    // ========== Ordering ==========

    #[test]
    fn test_sort_matches_reading_order() {
        let expected = [
            "PROJ-1", "PROJ-1-1", "PROJ-1-1a", "PROJ-1-1b", "PROJ-1-1aa", "PROJ-1-2", "PROJ-1-10",
            "PROJ-2",
        ];
        let mut shuffled = ids(&[
            "PROJ-1-10", "PROJ-2", "PROJ-1-1aa", "PROJ-1", "PROJ-1-2", "PROJ-1-1b", "PROJ-1-1",
            "PROJ-1-1a",
        ]);
        sort_ids(&mut shuffled);

        let sorted: Vec<String> = shuffled.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert!(id("ABC-9") < id("ABD-1"));
        assert!(id("A-100") < id("B-1"));
    }

    // ========== Suffixes ==========

    #[rstest]
    #[case::first("", "a")]
    #[case::simple("a", "b")]
    #[case::wrap("z", "aa")]
    #[case::inner("ay", "az")]
    #[case::carry("az", "ba")]
    #[case::double_wrap("zz", "aaa")]
    #[case::middle_carry("azz", "baa")]
    fn test_next_suffix(#[case] current: &str, #[case] expected: &str) {
        assert_eq!(next_suffix(current), expected);
    }

    // ========== Allocation ==========

    #[test]
    fn test_epic_allocation_skips_to_max() {
        let existing = ids(&["P-1", "P-4-1", "Q-9"]);
        assert_eq!(next_epic_id("P", &existing).unwrap(), id("P-5"));
        assert_eq!(next_epic_id("P", &[]).unwrap(), id("P-1"));
    }

    #[test]
    fn test_story_allocation() {
        let epic = id("P-1");
        let existing = ids(&["P-1", "P-1-1", "P-1-2", "P-1-2a", "P-2-7"]);
        assert_eq!(next_story_id("P", Some(&epic), &existing).unwrap(), id("P-1-3"));
        assert_eq!(next_story_id("P", None, &existing).unwrap(), id("P-3"));
    }

    #[test]
    fn test_task_under_story_takes_next_suffix() {
        let story = id("P-1-1");
        let existing = ids(&["P-1", "P-1-1", "P-1-1a", "P-1-1z", "P-1-2a"]);
        assert_eq!(next_task_id("P", Some(&story), &existing).unwrap(), id("P-1-1aa"));

        let empty_story = id("P-1-3");
        assert_eq!(next_task_id("P", Some(&empty_story), &existing).unwrap(), id("P-1-3a"));
    }

    #[test]
    fn test_task_under_epic_takes_story_slot() {
        let epic = id("P-1");
        let existing = ids(&["P-1", "P-1-1", "P-1-1a", "P-1-2"]);
        assert_eq!(next_task_id("P", Some(&epic), &existing).unwrap(), id("P-1-3"));
    }

    #[test]
    fn test_orphan_task_takes_epic_slot() {
        let existing = ids(&["P-1", "P-2"]);
        assert_eq!(next_task_id("P", None, &existing).unwrap(), id("P-3"));
    }

    #[test]
    fn test_deleted_trailing_slot_is_reused() {
        // Allocation only sees what it is given; callers pass live ids.
        let live = ids(&["P-1", "P-2"]);
        assert_eq!(next_epic_id("P", &live).unwrap(), id("P-3"));
    }

    #[test]
    fn test_exhausted_levels_are_validation_errors() {
        let full_epics = ids(&["P-4294967295"]);
        assert!(next_epic_id("P", &full_epics).unwrap_err().is_validation());
        assert!(next_task_id("P", None, &full_epics).unwrap_err().is_validation());
        assert_eq!(next_epic_id("Q", &full_epics).unwrap(), id("Q-1"));

        let epic = id("P-1");
        let full_stories = ids(&["P-1", "P-1-4294967295"]);
        assert!(next_story_id("P", Some(&epic), &full_stories).unwrap_err().is_validation());
        assert!(next_task_id("P", Some(&epic), &full_stories).unwrap_err().is_validation());
    }

    proptest! {
        #[test]
        fn prop_generated_ids_round_trip(
            prefix in "[A-Z]{1,6}",
            epic in 1u32..10_000,
            story in proptest::option::of(1u32..10_000),
            steps in 0usize..800,
        ) {
            let generated = match story {
                None => IssueId::epic(prefix.clone(), epic),
                Some(story) => {
                    let mut suffix = String::new();
                    for _ in 0..steps {
                        suffix = next_suffix(&suffix);
                    }
                    if suffix.is_empty() {
                        IssueId::story(prefix.clone(), epic, story)
                    } else {
                        IssueId::task(prefix.clone(), epic, story, suffix)
                    }
                }
            };

            let reparsed = IssueId::parse(&generated.to_string()).unwrap();
            prop_assert_eq!(&reparsed, &generated);
            prop_assert_eq!(reparsed.cmp(&generated), Ordering::Equal);
        }

        #[test]
        fn prop_next_suffix_is_strictly_greater(steps in 1usize..2_000) {
            let mut current = String::from("a");
            for _ in 0..steps {
                let next = next_suffix(&current);
                prop_assert_eq!(suffix_order(&current, &next), Ordering::Less);
                current = next;
            }
        }
    }
}
