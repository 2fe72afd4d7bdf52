use std::collections::HashMap;

use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use syncline_common::error::{SynclineError, SynclineResult};

/// A row type that can be written through the generic batch-upsert path.
///
/// `CONFLICT_KEY` names the natural-key columns; `MERGEABLE` the columns
/// overwritten when a row with the same natural key already exists. An empty
/// `MERGEABLE` list means insert-if-absent: existing rows are left untouched,
/// so previously enriched fields survive a re-crawl.
pub trait Upsertable {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const CONFLICT_KEY: &'static [&'static str];
    const MERGEABLE: &'static [&'static str];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

fn insert_prefix<T: Upsertable>() -> String {
    format!("insert into {} ({}) ", T::TABLE, T::COLUMNS.join(", "))
}

fn conflict_clause<T: Upsertable>(merge: bool) -> String {
    let target = T::CONFLICT_KEY.join(", ");
    if merge && !T::MERGEABLE.is_empty() {
        let assignments = T::MERGEABLE
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" on conflict ({target}) do update set {assignments}")
    } else {
        format!(" on conflict ({target}) do nothing")
    }
}

async fn insert_batch_with_clause<T: Upsertable>(
    pool: &PgPool,
    rows: &[T],
    merge: bool,
) -> SynclineResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix::<T>());
    qb.push_values(rows, |mut b, row| row.bind(&mut b));
    qb.push(conflict_clause::<T>(merge));
    qb.build()
        .execute(&mut *tx)
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;
    Ok(())
}

/// Insert-or-update one batch of rows as a single transaction, merging the
/// row type's `MERGEABLE` columns on conflict.
pub async fn upsert_batch<T: Upsertable>(pool: &PgPool, rows: &[T]) -> SynclineResult<()> {
    insert_batch_with_clause(pool, rows, true).await
}

/// Insert rows that do not exist yet; rows whose natural key is already
/// present are skipped regardless of the row type's merge columns.
pub async fn insert_batch_if_absent<T: Upsertable>(
    pool: &PgPool,
    rows: &[T],
) -> SynclineResult<()> {
    insert_batch_with_clause(pool, rows, false).await
}

/// Delete-then-insert child rows for the given parents as one transaction.
///
/// Used for Label-like entities: all prior rows for the parents are removed,
/// so labels deleted upstream do not survive a re-crawl.
pub async fn replace_children<T: Upsertable>(
    pool: &PgPool,
    parent_col: &str,
    parent_ids: &[String],
    rows: &[T],
) -> SynclineResult<()> {
    if parent_ids.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;

    let parents: Vec<String> = parent_ids.to_vec();
    sqlx::query(&format!(
        "delete from {} where {} = any($1)",
        T::TABLE,
        parent_col
    ))
    .bind(&parents)
    .execute(&mut *tx)
    .await
    .map_err(|e| SynclineError::Database(e.to_string()))?;

    if !rows.is_empty() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix::<T>());
        qb.push_values(rows, |mut b, row| row.bind(&mut b));
        qb.build()
            .execute(&mut *tx)
            .await
            .map_err(|e| SynclineError::Database(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;
    Ok(())
}

/// Resolve natural keys to surrogate ids. With `fold_case` set, both sides of
/// the lookup are lowercased and the returned map is keyed by the lowercased
/// form (user keys join case-insensitively across systems).
pub async fn surrogate_ids(
    pool: &PgPool,
    table: &str,
    key_col: &str,
    keys: &[String],
    fold_case: bool,
) -> SynclineResult<HashMap<String, i64>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let lookup: Vec<String> = if fold_case {
        keys.iter().map(|k| k.to_lowercase()).collect()
    } else {
        keys.to_vec()
    };

    let sql = if fold_case {
        format!("select id, lower({key_col}) as natural_key from {table} where lower({key_col}) = any($1)")
    } else {
        format!("select id, {key_col} as natural_key from {table} where {key_col} = any($1)")
    };

    let rows = sqlx::query(&sql)
        .bind(&lookup)
        .fetch_all(pool)
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>("natural_key"), r.get::<i64, _>("id")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        key: String,
        value: Option<String>,
    }

    impl Upsertable for Sample {
        const TABLE: &'static str = "samples";
        const COLUMNS: &'static [&'static str] = &["key", "value"];
        const CONFLICT_KEY: &'static [&'static str] = &["key"];
        const MERGEABLE: &'static [&'static str] = &["value"];

        fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
            row.push_bind(&self.key);
            row.push_bind(&self.value);
        }
    }

    struct Frozen {
        key: String,
    }

    impl Upsertable for Frozen {
        const TABLE: &'static str = "frozen";
        const COLUMNS: &'static [&'static str] = &["key"];
        const CONFLICT_KEY: &'static [&'static str] = &["key"];
        const MERGEABLE: &'static [&'static str] = &[];

        fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
            row.push_bind(&self.key);
        }
    }

    #[test]
    fn merge_clause_lists_mergeable_columns() {
        let clause = conflict_clause::<Sample>(true);
        assert_eq!(
            clause,
            " on conflict (key) do update set value = excluded.value"
        );
    }

    #[test]
    fn empty_mergeable_list_means_insert_if_absent() {
        let clause = conflict_clause::<Frozen>(true);
        assert_eq!(clause, " on conflict (key) do nothing");
    }

    #[test]
    fn forced_insert_if_absent_ignores_merge_columns() {
        let clause = conflict_clause::<Sample>(false);
        assert_eq!(clause, " on conflict (key) do nothing");
    }

    #[test]
    fn insert_prefix_names_all_columns() {
        assert_eq!(insert_prefix::<Sample>(), "insert into samples (key, value) ");
    }
}
