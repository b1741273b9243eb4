use gitdash_core::{EngineError, GroupBy, PrecomputedAggregateRow, UNCATEGORIZED};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{SqliteStore, StoreError, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRefreshState {
    pub refreshed_at: i64,
    pub commits_seen: u64,
    /// Set by any fact or weight mutation after `refreshed_at`.
    #[serde(default)]
    pub dirty: bool,
}

/// SQL group key per dimension. Mirrors `GroupBy::key_for` so both
/// aggregation paths bucket facts identically.
fn group_key_sql(group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Month => "substr(c.commit_date, 1, 7)".to_owned(),
        GroupBy::Contributor => "c.author".to_owned(),
        GroupBy::Category => format!("COALESCE(c.category, '{UNCATEGORIZED}')"),
        GroupBy::Repository => "c.repository".to_owned(),
    }
}

impl SqliteStore {
    /// Rebuilds `commit_aggregates` for every dimension from the current
    /// commit and category rows. Weight products stay integral inside SQL and
    /// are divided once per group.
    pub fn refresh_aggregates(&self) -> Result<AggregateRefreshState, StoreError> {
        self.reject_corrupt_weights()?;

        let refreshed_at = now_millis();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM commit_aggregates", [])?;

        for group_by in GroupBy::ALL {
            let sql = format!(
                r#"
                INSERT INTO commit_aggregates (
                    group_by, group_key, total_commits, effective_commits,
                    weighted_lines_changed, weighted_lines_added, weighted_lines_deleted,
                    lines_changed, lines_added, lines_deleted,
                    weight_efficiency_pct, refreshed_at
                )
                SELECT
                    ?1,
                    {key} AS group_key,
                    COUNT(*),
                    SUM(c.weight * COALESCE(k.weight, 100)) / 10000.0,
                    SUM((c.lines_added + c.lines_deleted) * c.weight * COALESCE(k.weight, 100)) / 10000.0,
                    SUM(c.lines_added * c.weight * COALESCE(k.weight, 100)) / 10000.0,
                    SUM(c.lines_deleted * c.weight * COALESCE(k.weight, 100)) / 10000.0,
                    SUM(c.lines_added + c.lines_deleted),
                    SUM(c.lines_added),
                    SUM(c.lines_deleted),
                    100.0 * SUM(c.weight * COALESCE(k.weight, 100)) / 10000.0 / COUNT(*),
                    ?2
                FROM commits c
                LEFT JOIN category_weights k ON k.category = c.category
                GROUP BY group_key
                "#,
                key = group_key_sql(group_by),
            );
            tx.execute(&sql, params![group_by.as_str(), refreshed_at])?;
        }

        let commits_seen: i64 = tx.query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        tx.execute(
            r#"
            INSERT INTO aggregate_refresh_state (id, refreshed_at, commits_seen, dirty)
            VALUES (1, ?1, ?2, 0)
            ON CONFLICT(id) DO UPDATE SET
                refreshed_at = excluded.refreshed_at,
                commits_seen = excluded.commits_seen,
                dirty = 0
            "#,
            params![refreshed_at, commits_seen],
        )?;
        tx.commit()?;

        let state = AggregateRefreshState {
            refreshed_at,
            commits_seen: commits_seen.max(0) as u64,
            dirty: false,
        };
        tracing::debug!(
            refreshed_at = state.refreshed_at,
            commits_seen = state.commits_seen,
            "materialized commit aggregates"
        );
        Ok(state)
    }

    pub fn aggregate_refresh_state(&self) -> Result<Option<AggregateRefreshState>, StoreError> {
        let state = self
            .conn
            .query_row(
                "SELECT refreshed_at, commits_seen, dirty FROM aggregate_refresh_state WHERE id = 1",
                [],
                |row| {
                    Ok(AggregateRefreshState {
                        refreshed_at: row.get(0)?,
                        commits_seen: row.get::<_, i64>(1)?.max(0) as u64,
                        dirty: row.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    /// No-op until the first refresh.
    pub(crate) fn mark_aggregates_stale(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE aggregate_refresh_state SET dirty = 1 WHERE id = 1 AND dirty = 0",
            [],
        )?;
        Ok(())
    }

    pub(crate) fn list_materialized_rows(
        &self,
        group_by: GroupBy,
    ) -> Result<Vec<PrecomputedAggregateRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT group_key, total_commits, effective_commits,
                   weighted_lines_changed, weighted_lines_added, weighted_lines_deleted,
                   lines_changed, lines_added, lines_deleted,
                   weight_efficiency_pct, refreshed_at
            FROM commit_aggregates
            WHERE group_by = ?1
            ORDER BY group_key ASC
            "#,
        )?;

        let rows = stmt.query_map(params![group_by.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                [row.get::<_, i64>(1)?, row.get(6)?, row.get(7)?, row.get(8)?],
                [row.get::<_, f64>(2)?, row.get(3)?, row.get(4)?, row.get(5)?],
                row.get::<_, Option<f64>>(9)?,
                row.get::<_, i64>(10)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (group_key, counts, sums, stored_efficiency_pct, refreshed_at) = row?;
            let [total_commits, lines_changed, lines_added, lines_deleted] =
                counts.map(|value| value.max(0) as u64);
            let [
                effective_commits,
                weighted_lines_changed,
                weighted_lines_added,
                weighted_lines_deleted,
            ] = sums;

            records.push(PrecomputedAggregateRow {
                group_by,
                group_key,
                total_commits,
                effective_commits,
                weighted_lines_changed,
                weighted_lines_added,
                weighted_lines_deleted,
                lines_changed,
                lines_added,
                lines_deleted,
                stored_efficiency_pct,
                refreshed_at,
            });
        }
        Ok(records)
    }

    fn reject_corrupt_weights(&self) -> Result<(), StoreError> {
        let corrupt = self
            .conn
            .query_row(
                r#"
                SELECT weight FROM commits WHERE weight < 0 OR weight > 100
                UNION ALL
                SELECT weight FROM category_weights WHERE weight < 0 OR weight > 100
                LIMIT 1
                "#,
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match corrupt {
            Some(value) => Err(EngineError::InvalidWeight { value }.into()),
            None => Ok(()),
        }
    }
}
