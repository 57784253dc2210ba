//! Approval dates from git history.
//!
//! A document counts as approved on the date of its last commit, but only
//! while the working tree is on the configured approved branch. Branch
//! detection failures fall back to treating the tree as approved, so a
//! tarball checkout still renders approval dates.

use std::path::{Path, PathBuf};

use crate::utils::exec::stdout_string;
use crate::{debug, exec, log};

/// Date format of approval stamps, e.g. `Jun 01 2024`.
const APPROVAL_DATE_FORMAT: &str = "--date=format:%b %d %Y";

/// Looks up approval dates for documents under one project root.
#[derive(Debug, Clone)]
pub struct ApprovalLookup {
    root: PathBuf,
}

impl ApprovalLookup {
    /// Lookup for `root`, or `None` when approval stamps do not apply.
    ///
    /// Stamps apply when an approved branch is configured and the current
    /// branch matches it.
    pub fn detect(root: &Path, approved_branch: Option<&str>) -> Option<Self> {
        let approved = approved_branch.filter(|b| !b.is_empty())?;
        let (branch, warning) = resolve_branch(current_branch(root), approved);

        if let Some(warning) = warning {
            log!("warning"; "{}", warning);
        }

        if branch != approved {
            debug!("git"; "on branch `{}`, approval dates omitted", branch);
            return None;
        }

        Some(Self {
            root: root.to_path_buf(),
        })
    }

    /// Date of the last commit touching `path`, or empty when unknown.
    pub fn last_commit_date(&self, path: &Path) -> String {
        let output = exec!(
            &self.root;
            "git";
            "log", "-n", "1", APPROVAL_DATE_FORMAT, "--pretty=format:%ad", "--", path
        );

        match output {
            Ok(output) => stdout_string(&output),
            Err(err) => {
                log!("warning"; "unable to read approval date for {}: {:#}", path.display(), err);
                String::new()
            }
        }
    }
}

/// Short name of the checked-out branch, `None` when HEAD is detached.
fn current_branch(root: &Path) -> Result<Option<String>, String> {
    let repo = gix::discover(root).map_err(|e| e.to_string())?;
    let head = repo.head_name().map_err(|e| e.to_string())?;
    Ok(head.map(|name| name.shorten().to_string()))
}

/// Branch to compare against the approved one, with a warning when
/// detection fell back to the approved branch itself.
fn resolve_branch(detected: Result<Option<String>, String>, approved: &str) -> (String, Option<String>) {
    match detected {
        Ok(Some(branch)) => (branch, None),
        Ok(None) => (
            approved.to_string(),
            Some(format!("detached HEAD, assuming `{approved}`")),
        ),
        Err(err) => (
            approved.to_string(),
            Some(format!("unable to detect current branch ({err}), assuming `{approved}`")),
        ),
    }
}
