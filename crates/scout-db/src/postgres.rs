//! [`DocumentStore`] over the `documents` JSONB table.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::document::{require_object, Collection, DocumentStore, FindOptions, SortDirection};
use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn find_sql(options: &FindOptions) -> String {
    let mut sql = String::from(
        "SELECT body FROM documents WHERE collection = $1 AND body @> $2",
    );
    match &options.sort {
        Some((_, SortDirection::Asc)) => sql.push_str(" ORDER BY body -> $3 ASC, id ASC"),
        Some((_, SortDirection::Desc)) => sql.push_str(" ORDER BY body -> $3 DESC, id ASC"),
        None => sql.push_str(" ORDER BY id ASC"),
    }
    sql.push_str(if options.sort.is_some() { " LIMIT $4" } else { " LIMIT $3" });
    sql
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), DbError> {
        require_object(&doc, "document")?;
        sqlx::query("INSERT INTO documents (collection, body) VALUES ($1, $2)")
            .bind(collection.as_str())
            .bind(Json(doc))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
        options: FindOptions,
    ) -> Result<Vec<Value>, DbError> {
        require_object(filter, "filter")?;
        let sql = find_sql(&options);
        // `LIMIT NULL` means no limit.
        let limit = options.limit.map(|l| to_i64(l as u64));

        let mut query = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(collection.as_str())
            .bind(Json(filter));
        if let Some((field, _)) = &options.sort {
            query = query.bind(field.as_str());
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Value,
        set: &Value,
    ) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        require_object(set, "set")?;
        let result = sqlx::query(
            "UPDATE documents SET body = body || $3 WHERE collection = $1 AND body @> $2",
        )
        .bind(collection.as_str())
        .bind(Json(filter))
        .bind(Json(set))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: Collection, filter: &Value) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND body @> $2")
            .bind(collection.as_str())
            .bind(Json(filter))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, DbError> {
        require_object(filter, "filter")?;
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND body @> $2",
        )
        .bind(collection.as_str())
        .bind(Json(filter))
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
