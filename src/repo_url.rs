//! GitHub repository URL parsing.
//!
//! Accepted forms, all yielding the same [`RepositoryReference`]:
//!
//! | Input | Notes |
//! |-------|-------|
//! | `https://github.com/owner/repo` | `http://` and `www.` also accepted |
//! | `github.com/owner/repo` | no scheme |
//! | `https://github.com/owner/repo.git` | `.git` suffix stripped |
//! | `https://github.com/owner/repo/tree/main` | trailing segments ignored |
//! | `git@github.com:owner/repo.git` | SSH remote |
//! | `https://github.com/owner/repo?tab=readme-ov-file#readme` | query and fragment dropped |

use crate::error::{HarvestError, Result};
use crate::models::RepositoryReference;

/// Extract owner and repository name from a GitHub URL.
pub fn parse_github_url(url: &str) -> Result<RepositoryReference> {
    // Query strings and fragments come along with URLs copied from a browser.
    let trimmed = url
        .trim()
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let invalid = || HarvestError::InvalidReference(url.trim().to_string());

    let rest = match trimmed.strip_prefix("git@github.com:") {
        Some(rest) => rest,
        None => {
            let without_scheme = trimmed
                .strip_prefix("https://")
                .or_else(|| trimmed.strip_prefix("http://"))
                .unwrap_or(trimmed);
            let without_www = without_scheme
                .strip_prefix("www.")
                .unwrap_or(without_scheme);
            without_www.strip_prefix("github.com/").ok_or_else(invalid)?
        }
    };

    let mut segments = rest.split('/');
    let owner = segments.next().unwrap_or_default();
    let name = segments.next().unwrap_or_default();
    let name = name.strip_suffix(".git").unwrap_or(name);

    if !is_valid_segment(owner) || !is_valid_segment(name) {
        return Err(invalid());
    }

    Ok(RepositoryReference::new(owner, name))
}

/// GitHub owner and repository names: ASCII alphanumerics, `-`, `_`, `.`.
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
