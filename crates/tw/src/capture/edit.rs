//! Editor template for changing one issue's title and body.

use crate::domain::BODY_SEPARATOR;
use crate::error::{Error, Result};

/// Prefix of the instruction lines that [`parse`] drops.
pub const COMMENT_PREFIX: &str = "# tw:";

/// Build the text handed to `$EDITOR`.
///
/// The title goes on the first line. The body follows, split into summary
/// and details around a `---` line, which is added when the body has none.
pub fn template(title: &str, body: Option<&str>) -> String {
    let title = if title.is_empty() { "<title>" } else { title };
    let mut lines = vec![
        title.to_string(),
        format!("{COMMENT_PREFIX} Enter the issue title on the first line above"),
        String::new(),
    ];

    let body = body.unwrap_or("");
    let (summary, details) = match body.split_once(BODY_SEPARATOR) {
        Some((summary, details)) => (summary.trim(), Some(details.trim())),
        None => (body.trim(), None),
    };

    if !summary.is_empty() {
        lines.push(summary.to_string());
    }
    lines.push(format!("{COMMENT_PREFIX} Enter a brief summary above the separator"));
    lines.push(format!(
        "{COMMENT_PREFIX} This will be shown in context views for related issues"
    ));
    lines.push("---".to_string());
    if let Some(details) = details {
        lines.push(details.to_string());
    }
    lines.push(format!("{COMMENT_PREFIX} Enter implementation details below"));
    lines.push(format!(
        "{COMMENT_PREFIX} Lines starting with '{COMMENT_PREFIX}' will be ignored"
    ));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Read back an edited template as `(title, body)`.
///
/// A trailing `---` with nothing after it is dropped, so an issue without
/// details does not gain an empty separator.
///
/// # Errors
///
/// `Error::Validation` when nothing but instruction lines remain.
pub fn parse(text: &str) -> Result<(String, Option<String>)> {
    let kept: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.starts_with(COMMENT_PREFIX))
        .collect();
    let content = kept.join("\n");
    let content = content.trim();

    if content.is_empty() {
        return Err(Error::Validation("content cannot be empty".to_string()));
    }

    let (title, rest) = content.split_once('\n').unwrap_or((content, ""));
    let rest = rest.trim();
    let rest = if rest == "---" {
        ""
    } else {
        rest.strip_suffix("\n---").map_or(rest, str::trim_end)
    };

    let body = (!rest.is_empty()).then(|| rest.to_string());
    Ok((title.trim().to_string(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::split_body(Some("summary\n---\ndetails"))]
    #[case::plain_body(Some("just a summary"))]
    #[case::no_body(None)]
    fn test_template_parses_back(#[case] body: Option<&str>) {
        let text = template("Fix the lexer", body);
        let (title, parsed) = parse(&text).unwrap();
        assert_eq!(title, "Fix the lexer");
        assert_eq!(parsed.as_deref(), body);
    }

    #[test]
    fn test_template_layout() {
        let text = template("T", Some("s\n---\nd"));
        let lines: Vec<&str> = text.lines().filter(|l| !l.starts_with(COMMENT_PREFIX)).collect();
        assert_eq!(lines, vec!["T", "", "s", "---", "d"]);
    }

    #[test]
    fn test_edited_body_is_returned() {
        let text = "New title\n# tw: ignored\n\nline one\n---\nline two\n";
        let (title, body) = parse(text).unwrap();
        assert_eq!(title, "New title");
        assert_eq!(body.as_deref(), Some("line one\n---\nline two"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("  \n\n ")]
    #[case::only_comments("# tw: a\n# tw: b\n")]
    fn test_empty_content_is_rejected(#[case] text: &str) {
        assert!(parse(text).unwrap_err().is_validation());
    }
}
