//! Database schema definition for the SQLite backend.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Issues, keyed by a surrogate rowid; tw_id and uuid are independently unique
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    tw_id TEXT NOT NULL UNIQUE,
    tw_type TEXT NOT NULL,
    title TEXT NOT NULL,
    tw_status TEXT NOT NULL,
    tw_parent TEXT,
    tw_body TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_parent ON issues(tw_parent);

-- Append-only annotation log; insertion order is rowid order
CREATE TABLE IF NOT EXISTS annotations (
    id INTEGER PRIMARY KEY,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_annotations_issue ON annotations(issue_id);

-- Outbound references extracted from the body, as written
CREATE TABLE IF NOT EXISTS issue_refs (
    source_issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    target_tw_id TEXT NOT NULL,
    PRIMARY KEY (source_issue_id, position)
);

CREATE INDEX IF NOT EXISTS idx_issue_refs_target ON issue_refs(target_tw_id);
";
