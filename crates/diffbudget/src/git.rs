use git2::{Diff, DiffFormat, ErrorCode, Repository};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not in a git repository: {0}")]
    Repository(#[source] git2::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("No staged or unstaged changes")]
    NoChanges,
}

pub type GitResult<T> = Result<T, GitError>;

/// Staged changes followed by unstaged ones, separated by a blank line.
pub fn collect_changes(path: &Path) -> GitResult<String> {
    let repo = Repository::discover(path).map_err(GitError::Repository)?;

    let staged = staged_diff(&repo)?;
    let unstaged = unstaged_diff(&repo)?;
    tracing::debug!(
        staged_bytes = staged.len(),
        unstaged_bytes = unstaged.len(),
        "collected working tree changes"
    );

    let combined: Vec<String> = [staged, unstaged]
        .into_iter()
        .filter(|diff| !diff.is_empty())
        .collect();

    if combined.is_empty() {
        return Err(GitError::NoChanges);
    }
    Ok(combined.join("\n"))
}

fn staged_diff(repo: &Repository) -> GitResult<String> {
    let head_tree = match repo.head() {
        Ok(head) => Some(head.peel_to_tree()?),
        // no commits yet: everything in the index is staged
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
        Err(e) => return Err(e.into()),
    };

    let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
    render_patch(&diff)
}

fn unstaged_diff(repo: &Repository) -> GitResult<String> {
    let diff = repo.diff_index_to_workdir(None, None)?;
    render_patch(&diff)
}

/// Render in `git diff` patch format. Bytes that are not UTF-8 are replaced
/// with U+FFFD so files in other encodings still count toward the budget.
fn render_patch(diff: &Diff<'_>) -> GitResult<String> {
    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin() as u8);
        }
        patch.extend_from_slice(line.content());
        true
    })?;
    Ok(String::from_utf8_lossy(&patch).into_owned())
}
