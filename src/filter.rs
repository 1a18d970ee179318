//! File filtering policy.
//!
//! Three static classifications drive what the walker fetches and what the
//! ingestor uploads:
//!
//! - **Denylist** ([`is_denied`]): images, archives, native binaries, media,
//!   fonts and compiled objects. Denied files are recorded without content.
//! - **README deduplication** ([`dedup_readmes`]): a repository keeps at most
//!   one README. A root-level `README.md` wins, then any root-level README,
//!   then the shortest path.
//! - **Text allowlist** ([`is_text_file`]): used by the ingestor only when
//!   `ingest.text_extensions_only` is enabled.

use crate::models::FileEntry;

/// Content placed in a [`FileEntry`] whose bytes are not valid UTF-8.
pub const BINARY_SENTINEL: &str = "[binary content]";

/// Files with fewer non-whitespace characters than this are not uploaded.
pub const MIN_CONTENT_CHARS: usize = 10;

const DENIED_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "ico", "webp",
    // Archives
    "pdf", "zip", "tar", "gz", "rar", "7z",
    // Binaries
    "exe", "dll", "so", "dylib",
    // Media
    "mp3", "mp4", "avi", "mov", "wmv", "flv",
    // Fonts
    "ttf", "woff", "woff2", "eot",
    // Compiled Java / Python
    "class", "jar", "war", "pyc", "pyo",
];

const TEXT_EXTENSIONS: &[&str] = &[
    // Code
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "rb", "go", "rs",
    "swift", "kt", "scala", "php", "sh", "bash", "zsh", "fish", "ps1", "r", "lua", "perl", "pl",
    // Web
    "html", "htm", "css", "scss", "sass", "less", "vue", "svelte",
    // Config / data
    "json", "xml", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "properties", "config",
    // Documentation
    "md", "markdown", "rst", "txt", "adoc", "tex",
    // Build
    "gradle", "maven", "sbt", "cmake", "make", "dockerfile",
    // Query
    "sql", "graphql", "prisma",
];

const EXTENSIONLESS_TEXT_FILES: &[&str] = &[
    "dockerfile",
    "makefile",
    "jenkinsfile",
    "vagrantfile",
    "gemfile",
    "rakefile",
    "procfile",
    "license",
    ".gitignore",
];

const README_NAMES: &[&str] = &[
    "readme",
    "readme.md",
    "readme.txt",
    "readme.rst",
    "readme.markdown",
    "read_me",
    "read_me.md",
    "read.me",
];

/// Lower-cased extension of a file name, without the dot.
///
/// Leading dots do not start an extension: `.gitignore` has none,
/// `.env.local` has `local`.
pub fn extension_of(name: &str) -> Option<String> {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    let (stem, ext) = name[stem_start..].rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a file should be recorded without fetching its content.
pub fn is_denied(name: &str) -> bool {
    extension_of(name)
        .map(|ext| DENIED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_readme(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    README_NAMES.contains(&lower.as_str())
}

/// Whether a file looks like text or source code.
pub fn is_text_file(name: &str) -> bool {
    match extension_of(name) {
        Some(ext) => TEXT_EXTENSIONS.contains(&ext.as_str()),
        None => EXTENSIONLESS_TEXT_FILES.contains(&name.to_ascii_lowercase().as_str()),
    }
}

/// Whether an entry carries content worth uploading: present, not the
/// binary sentinel, and at least [`MIN_CONTENT_CHARS`] characters once
/// trimmed.
pub fn has_ingestible_content(entry: &FileEntry) -> bool {
    match entry.content.as_deref() {
        Some(content) => {
            content != BINARY_SENTINEL && content.trim().chars().count() >= MIN_CONTENT_CHARS
        }
        None => false,
    }
}

/// Keep at most one README, preserving the order of everything else.
pub fn dedup_readmes(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    let keep = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| is_readme(&e.name))
        .min_by_key(|(i, e)| (readme_rank(e), e.path.len(), *i))
        .map(|(i, _)| i);

    let Some(keep) = keep else {
        return entries;
    };

    let before = entries.len();
    let kept: Vec<FileEntry> = entries
        .into_iter()
        .enumerate()
        .filter(|(i, e)| *i == keep || !is_readme(&e.name))
        .map(|(_, e)| e)
        .collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        tracing::info!(
            kept = %kept.iter().find(|e| is_readme(&e.name)).map(|e| e.path.as_str()).unwrap_or(""),
            dropped,
            "Keeping a single README file"
        );
    }
    kept
}

fn readme_rank(entry: &FileEntry) -> u8 {
    if entry.path.eq_ignore_ascii_case("readme.md") {
        0
    } else if entry.is_root_level() {
        1
    } else {
        2
    }
}
