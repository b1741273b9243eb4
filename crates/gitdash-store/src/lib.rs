mod materialized;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gitdash_config::{ConfigError, load_workspace_config, store_path};
use gitdash_core::{
    CategoryWeight, CategoryWeights, CommitFact, DATE_FORMAT, EngineError, FactFilter, GroupBy,
    PrecomputedAggregateRow, Weight, check_commit_date, normalize_category, parse_date,
};
use rusqlite::{Connection, params};
use thiserror::Error;

pub use materialized::AggregateRefreshState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid row in {table}: {message}")]
    InvalidRow {
        table: &'static str,
        message: String,
    },
    #[error("commit {commit_hash} exists in several repositories ({}); name one", .repositories.join(", "))]
    AmbiguousCommit {
        commit_hash: String,
        repositories: Vec<String>,
    },
}

/// Materialized rows for one dimension. `stale` is set when facts or
/// weights changed after the last refresh, so the rows may no longer match
/// the raw path.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedAggregate {
    pub rows: Vec<PrecomputedAggregateRow>,
    pub stale: bool,
}

/// Read side of the fact store. Implementations convert storage rows into
/// typed records; nothing past this boundary sees raw columns.
pub trait FactAccessor {
    fn fetch_facts(&self, filter: &FactFilter) -> Result<Vec<CommitFact>, StoreError>;

    fn fetch_category_weights(&self) -> Result<CategoryWeights, StoreError>;

    /// Rows of the materialized aggregate for `group_by`, or `None` when the
    /// filter narrows the default window or nothing has been materialized.
    fn fetch_precomputed_aggregate(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
    ) -> Result<Option<MaterializedAggregate>, StoreError>;
}

/// Mutation path used by ingestion and administration. Every successful
/// mutation marks the materialized aggregate stale.
///
/// Commits are keyed by `(repository, commit_hash)`. Edits take an optional
/// repository and fail with [`StoreError::AmbiguousCommit`] when the hash
/// alone matches more than one repository.
pub trait FactWriter {
    /// Inserts a fact or refreshes its immutable columns. Weight and
    /// category are only taken from `fact` on first insert so later edits
    /// survive re-ingestion.
    fn upsert_commit(&self, fact: &CommitFact) -> Result<(), StoreError>;

    /// Upserts every fact or none of them.
    fn upsert_commits(&self, facts: &[CommitFact]) -> Result<usize, StoreError>;

    fn set_commit_weight(
        &self,
        commit_hash: &str,
        repository: Option<&str>,
        weight: Weight,
    ) -> Result<bool, StoreError>;

    fn set_commit_category(
        &self,
        commit_hash: &str,
        repository: Option<&str>,
        category: Option<&str>,
    ) -> Result<bool, StoreError>;

    fn set_category_weight(&self, category: &str, weight: Weight) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

struct RawCommitRow {
    commit_hash: String,
    repository: String,
    author: String,
    commit_date: String,
    lines_added: i64,
    lines_deleted: i64,
    weight: i64,
    category: Option<String>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        Ok(Self { conn, path })
    }

    /// Opens the store configured for `workspace_root`.
    pub fn open_workspace(workspace_root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let workspace_root = workspace_root.as_ref();
        let config = load_workspace_config(workspace_root)?;
        Self::open(store_path(workspace_root, &config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_category_weights(&self) -> Result<Vec<CategoryWeight>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT category, weight
            FROM category_weights
            ORDER BY category ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (category, weight) = row?;
            records.push(CategoryWeight {
                category,
                weight: Weight::new(weight)?,
            });
        }
        Ok(records)
    }

    pub fn count_commits(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Repository holding `commit_hash`, narrowed by `repository` when given.
    fn locate_commit(
        &self,
        commit_hash: &str,
        repository: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT repository
            FROM commits
            WHERE commit_hash = ?1 AND (?2 IS NULL OR repository = ?2)
            ORDER BY repository ASC
            "#,
        )?;
        let mut repositories = stmt
            .query_map(params![commit_hash, repository], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        match repositories.len() {
            0 => Ok(None),
            1 => Ok(repositories.pop()),
            _ => Err(StoreError::AmbiguousCommit {
                commit_hash: commit_hash.to_owned(),
                repositories,
            }),
        }
    }

    fn ensure_category(&self, category: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO category_weights (category, weight) VALUES (?1, 100)",
            params![category],
        )?;
        Ok(())
    }
}

impl FactAccessor for SqliteStore {
    fn fetch_facts(&self, filter: &FactFilter) -> Result<Vec<CommitFact>, StoreError> {
        filter.validate()?;

        let date_from = filter
            .date_from
            .map(|date| date.format(DATE_FORMAT).to_string());
        let date_to = filter
            .date_to
            .map(|date| date.format(DATE_FORMAT).to_string());

        let mut stmt = self.conn.prepare(
            r#"
            SELECT commit_hash, repository, author, commit_date,
                   lines_added, lines_deleted, weight, category
            FROM commits
            WHERE (?1 IS NULL OR repository = ?1)
              AND (?2 IS NULL OR commit_date >= ?2)
              AND (?3 IS NULL OR commit_date <= ?3)
              AND (?4 IS NULL OR author = ?4)
            ORDER BY commit_date ASC, commit_hash ASC, repository ASC
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                filter.repository.name(),
                date_from,
                date_to,
                filter.author.as_deref(),
            ],
            |row| {
                Ok(RawCommitRow {
                    commit_hash: row.get(0)?,
                    repository: row.get(1)?,
                    author: row.get(2)?,
                    commit_date: row.get(3)?,
                    lines_added: row.get(4)?,
                    lines_deleted: row.get(5)?,
                    weight: row.get(6)?,
                    category: row.get(7)?,
                })
            },
        )?;

        let raw = rows.collect::<Result<Vec<_>, _>>()?;
        if raw.is_empty()
            && let Some(repository) = filter.repository.name()
        {
            tracing::debug!(repository, "repository filter matched no commits");
        }

        raw.into_iter().map(RawCommitRow::into_fact).collect()
    }

    fn fetch_category_weights(&self) -> Result<CategoryWeights, StoreError> {
        Ok(self.list_category_weights()?.into_iter().collect())
    }

    fn fetch_precomputed_aggregate(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
    ) -> Result<Option<MaterializedAggregate>, StoreError> {
        filter.validate()?;
        if !filter.is_default_window() {
            return Ok(None);
        }

        let Some(state) = self.aggregate_refresh_state()? else {
            return Ok(None);
        };

        let current = self.count_commits()?;
        let stale = state.dirty || current != state.commits_seen;
        if stale {
            tracing::warn!(
                group_by = group_by.as_str(),
                commits_seen = state.commits_seen,
                commits_now = current,
                dirty = state.dirty,
                refreshed_at = state.refreshed_at,
                "materialized aggregate lags raw commit facts"
            );
        }

        let rows = self.list_materialized_rows(group_by)?;
        Ok(Some(MaterializedAggregate { rows, stale }))
    }
}

impl FactWriter for SqliteStore {
    fn upsert_commit(&self, fact: &CommitFact) -> Result<(), StoreError> {
        let commit_date = check_commit_date(fact.commit_date)?;
        let category = normalize_category(fact.category.clone());
        if let Some(category) = category.as_deref() {
            self.ensure_category(category)?;
        }

        self.conn.execute(
            r#"
            INSERT INTO commits (
                commit_hash, repository, author, commit_date,
                lines_added, lines_deleted, weight, category
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(repository, commit_hash) DO UPDATE SET
                author = excluded.author,
                commit_date = excluded.commit_date,
                lines_added = excluded.lines_added,
                lines_deleted = excluded.lines_deleted
            "#,
            params![
                fact.commit_hash,
                fact.repository,
                fact.author,
                commit_date.format(DATE_FORMAT).to_string(),
                to_sql_count("commits", fact.lines_added)?,
                to_sql_count("commits", fact.lines_deleted)?,
                i64::from(fact.weight),
                category,
            ],
        )?;
        self.mark_aggregates_stale()?;

        Ok(())
    }

    fn upsert_commits(&self, facts: &[CommitFact]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for fact in facts {
            self.upsert_commit(fact)?;
        }
        tx.commit()?;
        Ok(facts.len())
    }

    fn set_commit_weight(
        &self,
        commit_hash: &str,
        repository: Option<&str>,
        weight: Weight,
    ) -> Result<bool, StoreError> {
        let Some(repository) = self.locate_commit(commit_hash, repository)? else {
            return Ok(false);
        };
        self.conn.execute(
            "UPDATE commits SET weight = ?3 WHERE repository = ?1 AND commit_hash = ?2",
            params![repository, commit_hash, i64::from(weight)],
        )?;
        self.mark_aggregates_stale()?;
        Ok(true)
    }

    fn set_commit_category(
        &self,
        commit_hash: &str,
        repository: Option<&str>,
        category: Option<&str>,
    ) -> Result<bool, StoreError> {
        let category = normalize_category(category.map(str::to_owned));
        let Some(repository) = self.locate_commit(commit_hash, repository)? else {
            return Ok(false);
        };

        if let Some(category) = category.as_deref() {
            self.ensure_category(category)?;
        }
        self.conn.execute(
            "UPDATE commits SET category = ?3 WHERE repository = ?1 AND commit_hash = ?2",
            params![repository, commit_hash, category],
        )?;
        self.mark_aggregates_stale()?;
        Ok(true)
    }

    fn set_category_weight(&self, category: &str, weight: Weight) -> Result<(), StoreError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(StoreError::InvalidRow {
                table: "category_weights",
                message: "category name must not be empty".to_owned(),
            });
        }

        self.conn.execute(
            r#"
            INSERT INTO category_weights (category, weight)
            VALUES (?1, ?2)
            ON CONFLICT(category) DO UPDATE SET weight = excluded.weight
            "#,
            params![category, i64::from(weight)],
        )?;
        self.mark_aggregates_stale()?;
        Ok(())
    }
}

impl RawCommitRow {
    fn into_fact(self) -> Result<CommitFact, StoreError> {
        let commit_date = parse_date(&self.commit_date).map_err(|err| StoreError::InvalidRow {
            table: "commits",
            message: format!(
                "commit {} has unparseable commit_date '{}': {err}",
                self.commit_hash, self.commit_date
            ),
        })?;

        Ok(CommitFact {
            lines_added: from_sql_count(&self.commit_hash, "lines_added", self.lines_added)?,
            lines_deleted: from_sql_count(&self.commit_hash, "lines_deleted", self.lines_deleted)?,
            weight: Weight::new(self.weight)?,
            category: normalize_category(self.category),
            commit_hash: self.commit_hash,
            repository: self.repository,
            author: self.author,
            commit_date,
        })
    }
}

fn from_sql_count(commit_hash: &str, column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidRow {
        table: "commits",
        message: format!("commit {commit_hash} has negative {column} ({value})"),
    })
}

fn to_sql_count(table: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidRow {
        table,
        message: format!("line count {value} exceeds the storable range"),
    })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as i64)
        .unwrap_or(0)
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            repository TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            author TEXT NOT NULL,
            commit_date TEXT NOT NULL,
            lines_added INTEGER NOT NULL,
            lines_deleted INTEGER NOT NULL,
            weight INTEGER NOT NULL DEFAULT 100,
            category TEXT,
            PRIMARY KEY (repository, commit_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_commits_repository_date
            ON commits (repository, commit_date);
        CREATE INDEX IF NOT EXISTS idx_commits_author
            ON commits (author);
        CREATE INDEX IF NOT EXISTS idx_commits_hash
            ON commits (commit_hash);

        CREATE TABLE IF NOT EXISTS category_weights (
            category TEXT PRIMARY KEY,
            weight INTEGER NOT NULL DEFAULT 100
        );

        CREATE TABLE IF NOT EXISTS commit_aggregates (
            group_by TEXT NOT NULL,
            group_key TEXT NOT NULL,
            total_commits INTEGER NOT NULL,
            effective_commits REAL NOT NULL,
            weighted_lines_changed REAL NOT NULL,
            weighted_lines_added REAL NOT NULL,
            weighted_lines_deleted REAL NOT NULL,
            lines_changed INTEGER NOT NULL,
            lines_added INTEGER NOT NULL,
            lines_deleted INTEGER NOT NULL,
            weight_efficiency_pct REAL,
            refreshed_at INTEGER NOT NULL,
            PRIMARY KEY (group_by, group_key)
        );

        CREATE TABLE IF NOT EXISTS aggregate_refresh_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            refreshed_at INTEGER NOT NULL,
            commits_seen INTEGER NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn date(raw: &str) -> chrono::NaiveDate {
        parse_date(raw).expect("valid date")
    }

    fn fact(hash: &str, repository: &str, author: &str, day: &str) -> CommitFact {
        CommitFact {
            commit_hash: hash.to_owned(),
            repository: repository.to_owned(),
            author: author.to_owned(),
            commit_date: date(day),
            lines_added: 10,
            lines_deleted: 4,
            weight: Weight::FULL,
            category: None,
        }
    }

    fn open_store(temp: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(temp.path().join("facts.sqlite")).expect("open store")
    }

    #[test]
    fn store_persists_facts_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested/facts.sqlite");

        let store = SqliteStore::open(&path).expect("open store");
        let mut record = fact("c1", "web", "ada", "2024-01-02");
        record.category = Some("feature".to_owned());
        record.weight = Weight::new(80).expect("weight");
        store.upsert_commit(&record).expect("upsert commit");
        drop(store);

        let reopened = SqliteStore::open(&path).expect("reopen store");
        let facts = reopened
            .fetch_facts(&FactFilter::new())
            .expect("fetch facts");
        assert_eq!(facts, vec![record]);
    }

    #[test]
    fn reingest_preserves_edited_weight_and_category() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        let original = fact("c1", "web", "ada", "2024-01-02");
        store.upsert_commit(&original).expect("first upsert");
        assert!(
            store
                .set_commit_weight("c1", None, Weight::new(0).expect("weight"))
                .expect("set weight")
        );
        assert!(
            store
                .set_commit_category("c1", Some("web"), Some("revert"))
                .expect("set category")
        );

        store.upsert_commit(&original).expect("re-ingest");

        let facts = store.fetch_facts(&FactFilter::new()).expect("fetch");
        assert_eq!(facts[0].weight, Weight::ZERO);
        assert_eq!(facts[0].category.as_deref(), Some("revert"));
    }

    #[test]
    fn category_rows_are_created_implicitly_with_full_weight() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        let mut record = fact("c1", "web", "ada", "2024-01-02");
        record.category = Some("  docs ".to_owned());
        store.upsert_commit(&record).expect("upsert");

        let weights = store.list_category_weights().expect("list weights");
        assert_eq!(
            weights,
            vec![CategoryWeight {
                category: "docs".to_owned(),
                weight: Weight::FULL,
            }]
        );

        store
            .set_category_weight("docs", Weight::new(30).expect("weight"))
            .expect("set category weight");
        let lookup = store.fetch_category_weights().expect("fetch weights");
        assert_eq!(lookup.weight_for(Some("docs")).get(), 30);

        store.upsert_commit(&record).expect("re-upsert");
        let lookup = store.fetch_category_weights().expect("fetch weights again");
        assert_eq!(lookup.weight_for(Some("docs")).get(), 30);
    }

    #[test]
    fn edits_to_missing_commits_report_false() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        assert!(
            !store
                .set_commit_weight("missing", None, Weight::FULL)
                .expect("set weight")
        );
        assert!(
            !store
                .set_commit_category("missing", None, Some("docs"))
                .expect("set category")
        );
        assert!(store.list_category_weights().expect("list").is_empty());
    }

    #[test]
    fn fetch_facts_applies_filters() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        for record in [
            fact("c1", "web", "ada", "2024-01-02"),
            fact("c2", "web", "grace", "2024-02-10"),
            fact("c3", "api", "ada", "2024-03-15"),
        ] {
            store.upsert_commit(&record).expect("upsert");
        }

        let by_repo = store
            .fetch_facts(&FactFilter::new().with_repository("web"))
            .expect("by repo");
        assert_eq!(by_repo.len(), 2);

        let by_author = store
            .fetch_facts(&FactFilter::new().with_author("ada"))
            .expect("by author");
        assert_eq!(
            by_author
                .iter()
                .map(|fact| fact.commit_hash.as_str())
                .collect::<Vec<_>>(),
            vec!["c1", "c3"]
        );

        let by_range = store
            .fetch_facts(
                &FactFilter::new()
                    .with_date_from(date("2024-02-10"))
                    .with_date_to(date("2024-03-15")),
            )
            .expect("by range");
        assert_eq!(by_range.len(), 2);

        let unknown = store
            .fetch_facts(&FactFilter::new().with_repository("nope"))
            .expect("unknown repository is not an error");
        assert!(unknown.is_empty());
    }

    #[test]
    fn inverted_range_fails_before_querying() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        let filter = FactFilter::new()
            .with_date_from(date("2024-05-01"))
            .with_date_to(date("2024-04-01"));
        let err = store.fetch_facts(&filter).expect_err("inverted range");
        assert!(matches!(
            err,
            StoreError::Engine(EngineError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn corrupt_weight_surfaces_instead_of_clamping() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        store
            .upsert_commit(&fact("c1", "web", "ada", "2024-01-02"))
            .expect("upsert");
        store
            .conn
            .execute("UPDATE commits SET weight = 140 WHERE commit_hash = 'c1'", [])
            .expect("corrupt weight");

        let err = store
            .fetch_facts(&FactFilter::new())
            .expect_err("corrupt weight");
        assert!(matches!(
            err,
            StoreError::Engine(EngineError::InvalidWeight { value: 140 })
        ));
    }

    #[test]
    fn corrupt_date_names_the_row() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        store
            .upsert_commit(&fact("c1", "web", "ada", "2024-01-02"))
            .expect("upsert");
        store
            .conn
            .execute(
                "UPDATE commits SET commit_date = 'yesterday' WHERE commit_hash = 'c1'",
                [],
            )
            .expect("corrupt date");

        let err = store
            .fetch_facts(&FactFilter::new())
            .expect_err("corrupt date");
        assert!(err.to_string().contains("commit c1"));
    }

    #[test]
    fn same_hash_in_two_repositories_keeps_both_facts() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        store
            .upsert_commit(&fact("shared", "upstream", "ada", "2024-01-02"))
            .expect("upsert upstream");
        store
            .upsert_commit(&fact("shared", "fork", "ada", "2024-01-02"))
            .expect("upsert fork");

        let upstream = store
            .fetch_facts(&FactFilter::new().with_repository("upstream"))
            .expect("upstream facts");
        let fork = store
            .fetch_facts(&FactFilter::new().with_repository("fork"))
            .expect("fork facts");
        assert_eq!((upstream.len(), fork.len()), (1, 1));

        let err = store
            .set_commit_weight("shared", None, Weight::ZERO)
            .expect_err("hash alone is ambiguous");
        match err {
            StoreError::AmbiguousCommit {
                commit_hash,
                repositories,
            } => {
                assert_eq!(commit_hash, "shared");
                assert_eq!(repositories, vec!["fork", "upstream"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(
            store
                .set_commit_weight("shared", Some("fork"), Weight::ZERO)
                .expect("set fork weight")
        );
        assert!(
            !store
                .set_commit_category("shared", Some("mirror"), Some("docs"))
                .expect("unknown repository")
        );

        let facts = store.fetch_facts(&FactFilter::new()).expect("all facts");
        let weights = facts
            .iter()
            .map(|fact| (fact.repository.as_str(), fact.weight.get()))
            .collect::<Vec<_>>();
        assert_eq!(weights, vec![("fork", 0), ("upstream", 100)]);
    }

    #[test]
    fn five_digit_years_are_rejected_on_write() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        let mut record = fact("c1", "web", "ada", "2024-01-02");
        record.commit_date = chrono::NaiveDate::from_ymd_opt(10000, 3, 1).expect("date");
        let err = store.upsert_commit(&record).expect_err("year 10000");
        assert!(matches!(
            err,
            StoreError::Engine(EngineError::DateOutOfRange { .. })
        ));
        assert!(store.fetch_facts(&FactFilter::new()).expect("fetch").is_empty());
    }

    #[test]
    fn batch_upsert_is_all_or_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(&temp);

        let good = fact("c1", "web", "ada", "2024-01-02");
        let mut bad = fact("c2", "web", "ada", "2024-01-03");
        bad.commit_date = chrono::NaiveDate::from_ymd_opt(10000, 1, 1).expect("date");

        store
            .upsert_commits(&[good.clone(), bad])
            .expect_err("second fact is invalid");
        assert!(store.fetch_facts(&FactFilter::new()).expect("fetch").is_empty());

        let written = store.upsert_commits(&[good]).expect("valid batch");
        assert_eq!(written, 1);
        assert_eq!(store.count_commits().expect("count"), 1);
    }

    #[test]
    fn open_workspace_uses_configured_store_path() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open_workspace(temp.path()).expect("open workspace store");
        assert_eq!(store.path(), temp.path().join(".gitdash/facts.sqlite"));
        assert!(store.path().exists());
    }
}
