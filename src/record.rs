//! Record building: raw commits → artifact records → embedding input.
//!
//! [`analyze_commit`] produces the artifact element for one fetched commit.
//! [`UpsertInput`] is the normalized view the upsert stage works from, and
//! [`combined_text`] is the exact text that gets embedded.

use crate::diff_summary::summarize_changes;
use crate::models::{AnalyzedCommit, ArtifactRecord, CommitRecord, CommitStats, RawCommit};

/// Build the artifact element for one commit.
///
/// Keeps the full patch of at most `max_code_snippets` files, in file order.
pub fn analyze_commit(commit: &RawCommit, max_code_snippets: usize) -> AnalyzedCommit {
    let code_changes: Vec<String> = commit
        .files
        .iter()
        .filter_map(|f| {
            f.patch
                .as_ref()
                .map(|patch| format!("File: {}\n{}", f.filename, patch))
        })
        .take(max_code_snippets)
        .collect();

    AnalyzedCommit {
        sha: commit.sha.clone(),
        message: commit.message.clone(),
        author: commit.author.clone(),
        date: commit.date.clone(),
        files_changed: commit.files.iter().map(|f| f.filename.clone()).collect(),
        code_changes,
        analysis: summarize_changes(&commit.files),
        stats: CommitStats {
            total_files_changed: commit.files.len() as u64,
            total_additions: commit.files.iter().map(|f| f.additions).sum(),
            total_deletions: commit.files.iter().map(|f| f.deletions).sum(),
        },
    }
}

/// The fields of a commit that get embedded and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertInput {
    pub sha: String,
    pub author: String,
    pub code: String,
    pub explanation: String,
    pub files_edited: u64,
}

impl UpsertInput {
    /// Resolve an artifact element into upsert fields.
    ///
    /// Flat fields win; otherwise the analyzer fields are used:
    /// - `code`: `code_changes` joined by blank lines
    /// - `explanation`: `message` and `analysis` joined by a blank line
    /// - `files_edited`: `stats.total_files_changed`, then `files_changed.len()`
    pub fn from_artifact(rec: &ArtifactRecord) -> Self {
        let code = rec
            .code
            .clone()
            .or_else(|| rec.code_changes.as_ref().map(|c| c.join("\n\n")))
            .unwrap_or_default();

        let explanation = rec.explanation.clone().unwrap_or_else(|| {
            [rec.message.as_deref(), rec.analysis.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        let files_edited = rec
            .files_edited
            .or_else(|| rec.stats.as_ref().map(|s| s.total_files_changed))
            .or_else(|| rec.files_changed.as_ref().map(|f| f.len() as u64))
            .unwrap_or(0);

        Self {
            sha: rec.sha.clone().unwrap_or_default(),
            author: rec.author.clone().unwrap_or_default(),
            code,
            explanation,
            files_edited,
        }
    }

    pub fn combined_text(&self) -> String {
        combined_text(
            &self.author,
            &self.code,
            &self.explanation,
            &self.sha,
            self.files_edited,
        )
    }

    /// Attach the embedding and rating to produce the stored record.
    pub fn into_record(self, vector: Vec<f32>, cleanliness_rating: f64) -> CommitRecord {
        let combined_text = self.combined_text();
        CommitRecord {
            sha: self.sha,
            author: self.author,
            code: self.code,
            explanation: self.explanation,
            files_edited: self.files_edited,
            combined_text,
            vector,
            cleanliness_rating,
        }
    }
}

impl From<&AnalyzedCommit> for UpsertInput {
    fn from(commit: &AnalyzedCommit) -> Self {
        Self::from_artifact(&ArtifactRecord {
            sha: Some(commit.sha.clone()),
            author: Some(commit.author.clone()),
            message: Some(commit.message.clone()),
            files_changed: Some(commit.files_changed.clone()),
            code_changes: Some(commit.code_changes.clone()),
            analysis: Some(commit.analysis.clone()),
            stats: Some(commit.stats.clone()),
            ..ArtifactRecord::default()
        })
    }
}

/// The canonical embedding text for a commit.
///
/// Labels are always present, so the result is never empty.
pub fn combined_text(
    author: &str,
    code: &str,
    explanation: &str,
    sha: &str,
    files_edited: u64,
) -> String {
    format!(
        "The author is: {}\nHere is the code: {}\nExplanation:\n{}\nSHA: {}\nFiles edited: {}",
        author, code, explanation, sha, files_edited
    )
}

/// Rebuild the combined text from a stored record's fields.
pub fn reconstruct_combined_text(record: &CommitRecord) -> String {
    combined_text(
        &record.author,
        &record.code,
        &record.explanation,
        &record.sha,
        record.files_edited,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileChange, FileStatus};

    fn patched(name: &str, patch: Option<&str>, additions: u64) -> FileChange {
        FileChange {
            filename: name.to_string(),
            status: FileStatus::Modified,
            additions,
            deletions: 1,
            previous_filename: None,
            patch: patch.map(str::to_string),
        }
    }

    fn raw_commit(files: Vec<FileChange>) -> RawCommit {
        RawCommit {
            sha: "abc123".to_string(),
            message: "refactor".to_string(),
            author: "alice".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            files,
        }
    }

    #[test]
    fn test_combined_text_template() {
        let text = combined_text("alice", "print(1)", "add print", "abc123", 1);
        assert_eq!(
            text,
            "The author is: alice\nHere is the code: print(1)\nExplanation:\nadd print\nSHA: abc123\nFiles edited: 1"
        );
    }

    #[test]
    fn test_combined_text_never_empty() {
        let text = combined_text("", "", "", "", 0);
        assert!(text.starts_with("The author is: "));
        assert!(text.ends_with("Files edited: 0"));
    }

    #[test]
    fn test_analyze_caps_code_snippets_but_not_content() {
        let long_patch = "+x\n".repeat(500);
        let files = vec![
            patched("a.rs", Some(&long_patch), 500),
            patched("b.rs", None, 2),
            patched("c.rs", Some("+c"), 1),
            patched("d.rs", Some("+d"), 1),
            patched("e.rs", Some("+e"), 1),
        ];
        let analyzed = analyze_commit(&raw_commit(files), 3);

        assert_eq!(analyzed.code_changes.len(), 3);
        assert_eq!(analyzed.code_changes[0], format!("File: a.rs\n{}", long_patch));
        assert_eq!(analyzed.code_changes[1], "File: c.rs\n+c");
        assert_eq!(analyzed.code_changes[2], "File: d.rs\n+d");
        assert_eq!(analyzed.files_changed, vec!["a.rs", "b.rs", "c.rs", "d.rs", "e.rs"]);
        assert_eq!(
            analyzed.stats,
            CommitStats {
                total_files_changed: 5,
                total_additions: 505,
                total_deletions: 5,
            }
        );
        assert!(analyzed.analysis.starts_with("Summary: Modified 5 files"));
    }

    #[test]
    fn test_upsert_input_from_flat_record() {
        let rec: ArtifactRecord = serde_json::from_str(
            r#"{"sha":"abc123","author":"alice","code":"print(1)","explanation":"add print","files edited":1}"#,
        )
        .unwrap();
        let input = UpsertInput::from_artifact(&rec);
        assert_eq!(
            input,
            UpsertInput {
                sha: "abc123".into(),
                author: "alice".into(),
                code: "print(1)".into(),
                explanation: "add print".into(),
                files_edited: 1,
            }
        );
    }

    #[test]
    fn test_upsert_input_from_analyzed_commit() {
        let analyzed = analyze_commit(&raw_commit(vec![patched("a.rs", Some("+a"), 1)]), 3);
        let input = UpsertInput::from(&analyzed);

        assert_eq!(input.code, "File: a.rs\n+a");
        assert!(input.explanation.starts_with("refactor\n\nSummary: Modified 1 files"));
        assert_eq!(input.files_edited, 1);
        assert_eq!(input.author, "alice");
    }

    #[test]
    fn test_upsert_input_defaults_for_empty_object() {
        let input = UpsertInput::from_artifact(&ArtifactRecord::default());
        assert_eq!(input.sha, "");
        assert_eq!(input.files_edited, 0);
        assert!(!input.combined_text().is_empty());
    }

    #[test]
    fn test_reconstruct_matches_embedded_text() {
        let input = UpsertInput {
            sha: "abc123".into(),
            author: "alice".into(),
            code: "print(1)".into(),
            explanation: "add print".into(),
            files_edited: 1,
        };
        let embedded = input.combined_text();
        let record = input.into_record(vec![0.1, 0.2], 7.0);
        assert_eq!(reconstruct_combined_text(&record), embedded);
        assert_eq!(record.combined_text, embedded);
    }
}
