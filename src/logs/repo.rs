use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::nutrition::normalize::NewEntry;

/// One user's nutrition record for a single calendar day.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Log {
    pub id: Uuid,
    pub user_id: Uuid,
    pub log_date: Date,
    pub created_at: OffsetDateTime,
}

/// One food item recorded within a log.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LogEntry {
    pub id: Uuid,
    pub log_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbs: f64,
    pub created_at: OffsetDateTime,
}

impl Log {
    pub async fn find_by_user_and_date(
        db: &PgPool,
        user_id: Uuid,
        date: Date,
    ) -> sqlx::Result<Option<Log>> {
        sqlx::query_as::<_, Log>(
            r#"
            SELECT id, user_id, log_date, created_at
            FROM logs
            WHERE user_id = $1 AND log_date = $2
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(db)
        .await
    }

    /// Insert a log for `(user_id, date)` unless one already exists.
    /// Returns None when another writer won the race on the unique
    /// constraint; the caller re-fetches the existing row.
    pub async fn insert_if_absent(
        db: &PgPool,
        user_id: Uuid,
        date: Date,
    ) -> sqlx::Result<Option<Log>> {
        sqlx::query_as::<_, Log>(
            r#"
            INSERT INTO logs (user_id, log_date)
            VALUES ($1, $2)
            ON CONFLICT (user_id, log_date) DO NOTHING
            RETURNING id, user_id, log_date, created_at
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Log>> {
        sqlx::query_as::<_, Log>(
            r#"
            SELECT id, user_id, log_date, created_at
            FROM logs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Most recent day first.
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Log>> {
        sqlx::query_as::<_, Log>(
            r#"
            SELECT id, user_id, log_date, created_at
            FROM logs
            WHERE user_id = $1
            ORDER BY log_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    /// Lock the log row for the duration of the surrounding transaction.
    /// Mutations on the same log queue behind this lock, so each
    /// read-modify-recompute-write unit observes a settled entry set.
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> sqlx::Result<Option<Log>> {
        sqlx::query_as::<_, Log>(
            r#"
            SELECT id, user_id, log_date, created_at
            FROM logs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Entries cascade at the schema level.
    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM logs WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl LogEntry {
    /// Insertion order is display order.
    pub async fn list_for_log(
        db: impl sqlx::PgExecutor<'_>,
        log_id: Uuid,
    ) -> sqlx::Result<Vec<LogEntry>> {
        sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, log_id, name, quantity, calories, fat, protein, carbs, created_at
            FROM log_entries
            WHERE log_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(log_id)
        .fetch_all(db)
        .await
    }

    /// All entries across a user's logs, for building the summary list in
    /// one round trip.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<LogEntry>> {
        sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT e.id, e.log_id, e.name, e.quantity, e.calories, e.fat, e.protein, e.carbs, e.created_at
            FROM log_entries e
            JOIN logs l ON l.id = e.log_id
            WHERE l.user_id = $1
            ORDER BY e.created_at ASC, e.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        log_id: Uuid,
        entry: &NewEntry,
    ) -> sqlx::Result<LogEntry> {
        sqlx::query_as::<_, LogEntry>(
            r#"
            INSERT INTO log_entries (log_id, name, quantity, calories, fat, protein, carbs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, log_id, name, quantity, calories, fat, protein, carbs, created_at
            "#,
        )
        .bind(log_id)
        .bind(&entry.name)
        .bind(entry.quantity)
        .bind(entry.calories)
        .bind(entry.fat)
        .bind(entry.protein)
        .bind(entry.carbs)
        .fetch_one(&mut **tx)
        .await
    }

    /// Which log an entry belongs to, if it still exists.
    pub async fn log_id_of(db: impl sqlx::PgExecutor<'_>, entry_id: Uuid) -> sqlx::Result<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT log_id FROM log_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_in(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: Uuid,
    ) -> sqlx::Result<Option<LogEntry>> {
        sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, log_id, name, quantity, calories, fat, protein, carbs, created_at
            FROM log_entries
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn update_in(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: Uuid,
        name: &str,
        quantity: f64,
        calories: f64,
        fat: f64,
        protein: f64,
        carbs: f64,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE log_entries
            SET name = $2, quantity = $3, calories = $4, fat = $5, protein = $6, carbs = $7
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(name)
        .bind(quantity)
        .bind(calories)
        .bind(fat)
        .bind(protein)
        .bind(carbs)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete_in(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: Uuid,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM log_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
