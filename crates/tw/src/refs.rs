//! Cross-reference extraction from free text.

use regex::Regex;

use crate::ids::IssueId;

/// Find every identifier with the given prefix mentioned in `text`.
///
/// Matches are whole words of the form `PREFIX-N[-N[letters]]`. The result
/// is deduplicated and sorted in identifier order. Tokens that look like an
/// identifier but fail validation are dropped.
///
/// ```
/// use tw::refs::extract_refs;
///
/// let refs = extract_refs("See PROJ-10, PROJ-2, PROJ-1.", "PROJ");
/// let refs: Vec<String> = refs.iter().map(ToString::to_string).collect();
/// assert_eq!(refs, ["PROJ-1", "PROJ-2", "PROJ-10"]);
/// ```
pub fn extract_refs(text: &str, prefix: &str) -> Vec<IssueId> {
    let pattern = format!(r"\b({}-\d+(?:-\d+[a-z]*)?)\b", regex::escape(prefix));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let mut refs: Vec<IssueId> = re
        .captures_iter(text)
        .filter_map(|caps| IssueId::parse(&caps[1]).ok())
        .collect();
    refs.sort();
    refs.dedup();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strings(refs: &[IssueId]) -> Vec<String> {
        refs.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    #[case::sorted_and_deduped("See PROJ-10, PROJ-2, PROJ-1. Also PROJ-2.", &["PROJ-1", "PROJ-2", "PROJ-10"])]
    #[case::hierarchy_levels("PROJ-1-2a then PROJ-1-2 then PROJ-1", &["PROJ-1", "PROJ-1-2", "PROJ-1-2a"])]
    #[case::other_prefix_ignored("OTHER-1 and PROJ-3", &["PROJ-3"])]
    #[case::longer_prefix_ignored("XPROJ-1", &[])]
    #[case::embedded_in_word("PROJ-1x", &[])]
    #[case::zero_dropped("PROJ-0 and PROJ-4", &["PROJ-4"])]
    #[case::none("nothing here", &[])]
    fn test_extract_refs(#[case] text: &str, #[case] expected: &[&str]) {
        assert_eq!(strings(&extract_refs(text, "PROJ")), expected);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "PROJ-3 PROJ-1-1b PROJ-2";
        let first = extract_refs(text, "PROJ");
        let rejoined = strings(&first).join(" ");
        assert_eq!(extract_refs(&rejoined, "PROJ"), first);
    }
}
