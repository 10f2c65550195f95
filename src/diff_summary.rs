//! Human-readable summaries of a commit's file changes.
//!
//! The output is plain text meant for people and language models; nothing
//! downstream parses it.

use crate::models::{FileChange, FileStatus};

/// Number of `Added:` / `Removed:` lines kept per file.
pub const MAX_KEY_CHANGES: usize = 5;

/// Human label for a file's change status.
pub fn status_label(file: &FileChange) -> String {
    match file.status {
        FileStatus::Added => "Added new file".to_string(),
        FileStatus::Modified => "Modified existing file".to_string(),
        FileStatus::Removed => "Removed file".to_string(),
        FileStatus::Renamed => format!(
            "Renamed file from {}",
            file.previous_filename.as_deref().unwrap_or("unknown")
        ),
        FileStatus::Unknown => "unknown".to_string(),
    }
}

/// Extract the first [`MAX_KEY_CHANGES`] added/removed lines of a unified diff.
///
/// Diff headers (`+++` / `---`) and context lines are skipped.
pub fn key_changes(patch: &str) -> Vec<String> {
    patch
        .lines()
        .filter_map(|line| {
            if line.starts_with('+') && !line.starts_with("+++") {
                Some(format!("Added: {}", line[1..].trim()))
            } else if line.starts_with('-') && !line.starts_with("---") {
                Some(format!("Removed: {}", line[1..].trim()))
            } else {
                None
            }
        })
        .take(MAX_KEY_CHANGES)
        .collect()
}

/// Describe a single file change.
pub fn summarize_file(file: &FileChange) -> String {
    let mut text = format!(
        "{} '{}' with {} additions and {} deletions.",
        status_label(file),
        file.filename,
        file.additions,
        file.deletions
    );

    let changes = file.patch.as_deref().map(key_changes).unwrap_or_default();
    if !changes.is_empty() {
        text.push_str("\nKey changes:\n- ");
        text.push_str(&changes.join("\n- "));
    }

    text
}

/// Summarize all file changes of one commit.
///
/// Starts with an aggregate line, followed by one block per file separated
/// by blank lines.
pub fn summarize_changes(files: &[FileChange]) -> String {
    let total_additions: u64 = files.iter().map(|f| f.additions).sum();
    let total_deletions: u64 = files.iter().map(|f| f.deletions).sum();

    let mut out = format!(
        "Summary: Modified {} files with {} additions and {} deletions.\n\n",
        files.len(),
        total_additions,
        total_deletions
    );

    let blocks: Vec<String> = files.iter().map(summarize_file).collect();
    out.push_str(&blocks.join("\n\n"));
    out
}
