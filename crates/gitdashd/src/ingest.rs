use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use gitdash_core::{CommitFact, Weight, normalize_category, parse_date};
use gitdash_store::FactWriter;
use serde::{Deserialize, Serialize};

const RECORD_SEPARATOR: char = '\u{1e}';
const FIELD_SEPARATOR: char = '\u{1f}';
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ad%x1f%s";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub repository: String,
    pub commits_ingested: usize,
    pub binary_entries_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestOptions {
    pub conventional_categories: bool,
}

/// Parsed `git log --numstat` output. Binary entries (`-\t-\tpath`) carry
/// no line counts and are skipped; the commit itself is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLog {
    pub facts: Vec<CommitFact>,
    pub binary_entries_skipped: usize,
}

pub fn repository_name_for(repo: &Path) -> String {
    repo.file_name()
        .map(|name| name.to_string_lossy().trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "repository".to_owned())
}

pub fn ingest_repository(
    writer: &impl FactWriter,
    repo: &Path,
    repository: &str,
    options: &IngestOptions,
) -> Result<IngestOutcome> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["log", "--no-merges", "--numstat", "--date=short", LOG_FORMAT])
        .output()
        .with_context(|| format!("failed to run git log in {}", repo.display()))?;
    if !output.status.success() {
        bail!(
            "git log failed in {}: status {}: {}",
            repo.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed = parse_git_log(&stdout, repository, options)?;
    writer
        .upsert_commits(&parsed.facts)
        .with_context(|| format!("failed to store commits for {repository}"))?;

    tracing::info!(
        repository,
        commits = parsed.facts.len(),
        binary_entries_skipped = parsed.binary_entries_skipped,
        "ingested git history"
    );

    Ok(IngestOutcome {
        repository: repository.to_owned(),
        commits_ingested: parsed.facts.len(),
        binary_entries_skipped: parsed.binary_entries_skipped,
    })
}

pub fn parse_git_log(output: &str, repository: &str, options: &IngestOptions) -> Result<ParsedLog> {
    let mut facts = Vec::new();
    let mut binary_entries_skipped = 0usize;

    for record in output.split(RECORD_SEPARATOR) {
        let mut lines = record.lines();
        let Some(header) = lines.next() else {
            continue;
        };
        if header.trim().is_empty() {
            continue;
        }

        let mut fields = header.splitn(4, FIELD_SEPARATOR);
        let commit_hash = fields.next().unwrap_or_default().trim();
        let author = fields.next().unwrap_or_default().trim();
        let raw_date = fields.next().unwrap_or_default().trim();
        let subject = fields.next().unwrap_or_default().trim();
        if commit_hash.is_empty() {
            bail!("git log record without a commit hash: {header:?}");
        }
        let commit_date = parse_date(raw_date)
            .with_context(|| format!("invalid commit date '{raw_date}' for {commit_hash}"))?;

        let mut lines_added = 0u64;
        let mut lines_deleted = 0u64;
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(3, '\t');
            let added = parts.next().unwrap_or_default().trim();
            let deleted = parts.next().unwrap_or_default().trim();
            if added == "-" || deleted == "-" {
                binary_entries_skipped += 1;
                continue;
            }
            lines_added += added
                .parse::<u64>()
                .with_context(|| format!("invalid numstat line {line:?} in {commit_hash}"))?;
            lines_deleted += deleted
                .parse::<u64>()
                .with_context(|| format!("invalid numstat line {line:?} in {commit_hash}"))?;
        }

        let category = if options.conventional_categories {
            conventional_category(subject)
        } else {
            None
        };

        facts.push(CommitFact {
            commit_hash: commit_hash.to_owned(),
            repository: repository.to_owned(),
            author: author.to_owned(),
            commit_date,
            lines_added,
            lines_deleted,
            weight: Weight::FULL,
            category,
        });
    }

    Ok(ParsedLog {
        facts,
        binary_entries_skipped,
    })
}

/// `fix(parser)!: ...` -> `fix`. Subjects without a lowercase type prefix
/// stay uncategorized.
pub fn conventional_category(subject: &str) -> Option<String> {
    let (prefix, _) = subject.split_once(':')?;
    let kind = prefix
        .split_once('(')
        .map_or(prefix, |(kind, _)| kind)
        .trim_end_matches('!')
        .trim();
    if kind.is_empty() || !kind.chars().all(|ch| ch.is_ascii_lowercase()) {
        return None;
    }
    normalize_category(Some(kind.to_owned()))
}
