//! Recursive repository traversal.
//!
//! Walks a repository depth-first in the order the host lists entries,
//! fetching the content of every file the denylist allows:
//!
//! 1. List the root directory.
//! 2. Descend into each `dir` entry before continuing with its siblings.
//! 3. Denylisted files are recorded with `skipped = true` and no content.
//! 4. Other files are fetched and decoded (undecodable → sentinel content).
//! 5. README duplicates are dropped once the walk completes.
//!
//! Any failed remote call aborts the whole traversal with that error; no
//! partial tree is returned.

use crate::error::Result;
use crate::filter::{dedup_readmes, is_denied};
use crate::github::decode_content;
use crate::models::{EntryKind, FileEntry, RepositoryReference};
use crate::traits::{RemoteEntry, RemoteKind, RepoSource};

enum Work {
    Directory(String),
    File(RemoteEntry),
}

/// Harvest every file of `repo` from `source`.
pub async fn traverse(source: &dyn RepoSource, repo: &RepositoryReference) -> Result<Vec<FileEntry>> {
    let mut stack = vec![Work::Directory(String::new())];
    let mut entries = Vec::new();

    while let Some(work) = stack.pop() {
        match work {
            Work::Directory(path) => {
                let listing = source.list_directory(repo, &path).await?;
                tracing::info!(
                    repo = %repo,
                    path = if path.is_empty() { "root" } else { path.as_str() },
                    items = listing.len(),
                    "Listed directory"
                );

                let mut children = Vec::with_capacity(listing.len());
                for item in listing {
                    match item.kind {
                        RemoteKind::Dir => children.push(Work::Directory(item.path)),
                        RemoteKind::File => children.push(Work::File(item)),
                        other => {
                            tracing::warn!(path = %item.path, kind = ?other, "Ignoring unsupported entry type");
                        }
                    }
                }
                // Reverse so the first listed child is popped first.
                stack.extend(children.into_iter().rev());
            }
            Work::File(item) => {
                entries.push(harvest_file(source, repo, item).await?);
            }
        }
    }

    let entries = dedup_readmes(entries);
    tracing::info!(repo = %repo, files = entries.len(), "Traversal complete");
    Ok(entries)
}

async fn harvest_file(
    source: &dyn RepoSource,
    repo: &RepositoryReference,
    item: RemoteEntry,
) -> Result<FileEntry> {
    if is_denied(&item.name) {
        tracing::info!(path = %item.path, "Skipping binary file");
        return Ok(FileEntry {
            path: item.path,
            name: item.name,
            kind: EntryKind::File,
            size: item.size,
            content: None,
            skipped: true,
        });
    }

    tracing::debug!(path = %item.path, "Fetching file");
    let file = source.fetch_file(repo, &item.path).await?;
    let content = decode_content(&file);

    Ok(FileEntry {
        path: item.path,
        name: item.name,
        kind: EntryKind::File,
        size: if file.size > 0 { file.size } else { item.size },
        content: Some(content),
        skipped: false,
    })
}
