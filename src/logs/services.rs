use std::collections::HashMap;

use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::logs::aggregate::{summarize, LogSummary};
use crate::logs::dto::PatchEntryRequest;
use crate::logs::repo::{Log, LogEntry};
use crate::nutrition::normalize::{normalize, round_tenth, round_whole, NewEntry};
use crate::state::AppState;

/// Attempts per mutation unit before the conflict is surfaced.
const MAX_MUTATION_ATTEMPTS: u32 = 3;

/// A log together with its current entries and freshly computed summary.
pub type LogView = (Log, Vec<LogEntry>, LogSummary);

fn is_retryable(err: &ApiError) -> bool {
    let ApiError::Database(sqlx::Error::Database(db_err)) = err else {
        return false;
    };
    // serialization_failure / deadlock_detected
    matches!(db_err.code().as_deref(), Some("40001" | "40P01"))
}

/// Get today's log for the user, creating it on first use.
///
/// The date comes from the wall clock here, never from the caller, so logs
/// cannot be back- or forward-dated. Concurrent first writes race on the
/// (user_id, log_date) unique constraint; the loser returns the winner's
/// row. The bool reports whether a log was created.
pub async fn get_or_create_today(db: &PgPool, user_id: Uuid) -> Result<(Log, bool), ApiError> {
    let today = OffsetDateTime::now_utc().date();

    if let Some(log) = Log::find_by_user_and_date(db, user_id, today).await? {
        return Ok((log, false));
    }
    if let Some(log) = Log::insert_if_absent(db, user_id, today).await? {
        info!(user_id = %user_id, log_id = %log.id, date = %today, "log created");
        return Ok((log, true));
    }
    // Lost the creation race; the winner's row exists now.
    let log = Log::find_by_user_and_date(db, user_id, today)
        .await?
        .ok_or(ApiError::Conflict)?;
    debug!(user_id = %user_id, log_id = %log.id, "creation race lost, reusing existing log");
    Ok((log, false))
}

/// Resolve a free-text query, normalize the result, and append it to the
/// log. The lookup and normalization run before any write, so a failed
/// resolution leaves the log untouched.
pub async fn add_entry(
    state: &AppState,
    user_id: Uuid,
    log_id: Uuid,
    query: &str,
) -> Result<LogView, ApiError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("entry_query must not be empty".into()));
    }

    let raw = state.search.natural_search(query).await?;
    let entry = normalize(&raw)?;
    debug!(user_id = %user_id, log_id = %log_id, food = %entry.name, "query resolved");

    let mut attempts = 0;
    loop {
        match try_append(&state.db, user_id, log_id, &entry).await {
            Err(ref err) if is_retryable(err) && attempts + 1 < MAX_MUTATION_ATTEMPTS => {
                attempts += 1;
                warn!(log_id = %log_id, attempts, "append conflicted, retrying");
            }
            result => return result,
        }
    }
}

async fn try_append(
    db: &PgPool,
    user_id: Uuid,
    log_id: Uuid,
    entry: &NewEntry,
) -> Result<LogView, ApiError> {
    let mut tx = db.begin().await?;
    let log = Log::lock(&mut tx, log_id)
        .await?
        .ok_or(ApiError::NotFound("log"))?;
    if log.user_id != user_id {
        return Err(ApiError::Forbidden("log belongs to another user"));
    }
    LogEntry::append(&mut tx, log_id, entry).await?;
    let entries = LogEntry::list_for_log(&mut *tx, log_id).await?;
    let summary = summarize(&entries);
    tx.commit().await?;
    Ok((log, entries, summary))
}

/// Apply a partial update to one entry and recompute its log's summary.
pub async fn patch_entry(
    db: &PgPool,
    user_id: Uuid,
    entry_id: Uuid,
    patch: &PatchEntryRequest,
) -> Result<LogView, ApiError> {
    validate_patch(patch)?;

    let mut attempts = 0;
    loop {
        match try_patch(db, user_id, entry_id, patch).await {
            Err(ref err) if is_retryable(err) && attempts + 1 < MAX_MUTATION_ATTEMPTS => {
                attempts += 1;
                warn!(entry_id = %entry_id, attempts, "patch conflicted, retrying");
            }
            result => return result,
        }
    }
}

fn validate_patch(patch: &PatchEntryRequest) -> Result<(), ApiError> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
    }
    for (field, value) in [
        ("quantity", patch.quantity),
        ("calories", patch.calories),
        ("fat", patch.fat),
        ("protein", patch.protein),
        ("carbs", patch.carbs),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(ApiError::Validation(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }
    }
    Ok(())
}

async fn try_patch(
    db: &PgPool,
    user_id: Uuid,
    entry_id: Uuid,
    patch: &PatchEntryRequest,
) -> Result<LogView, ApiError> {
    let mut tx = db.begin().await?;

    let log_id = LogEntry::log_id_of(&mut *tx, entry_id)
        .await?
        .ok_or(ApiError::NotFound("entry"))?;
    let log = Log::lock(&mut tx, log_id)
        .await?
        .ok_or(ApiError::NotFound("log"))?;
    if log.user_id != user_id {
        return Err(ApiError::Forbidden("entry belongs to another user"));
    }
    // Re-read under the lock; the entry may have been deleted while we waited.
    let current = LogEntry::find_in(&mut tx, entry_id)
        .await?
        .ok_or(ApiError::NotFound("entry"))?;

    let name = patch.name.as_deref().map(str::trim).unwrap_or(&current.name);
    let quantity = patch.quantity.unwrap_or(current.quantity);
    let calories = patch.calories.map(round_whole).unwrap_or(current.calories);
    let fat = patch.fat.map(round_tenth).unwrap_or(current.fat);
    let protein = patch.protein.map(round_tenth).unwrap_or(current.protein);
    let carbs = patch.carbs.map(round_tenth).unwrap_or(current.carbs);

    LogEntry::update_in(&mut tx, entry_id, name, quantity, calories, fat, protein, carbs).await?;
    let entries = LogEntry::list_for_log(&mut *tx, log_id).await?;
    let summary = summarize(&entries);
    tx.commit().await?;
    Ok((log, entries, summary))
}

/// Remove one entry and recompute. Deleting an entry that no longer exists
/// is an explicit NotFound, never a silent success.
pub async fn delete_entry(db: &PgPool, user_id: Uuid, entry_id: Uuid) -> Result<LogView, ApiError> {
    let mut attempts = 0;
    loop {
        match try_delete(db, user_id, entry_id).await {
            Err(ref err) if is_retryable(err) && attempts + 1 < MAX_MUTATION_ATTEMPTS => {
                attempts += 1;
                warn!(entry_id = %entry_id, attempts, "delete conflicted, retrying");
            }
            result => return result,
        }
    }
}

async fn try_delete(db: &PgPool, user_id: Uuid, entry_id: Uuid) -> Result<LogView, ApiError> {
    let mut tx = db.begin().await?;

    let log_id = LogEntry::log_id_of(&mut *tx, entry_id)
        .await?
        .ok_or(ApiError::NotFound("entry"))?;
    let log = Log::lock(&mut tx, log_id)
        .await?
        .ok_or(ApiError::NotFound("log"))?;
    if log.user_id != user_id {
        return Err(ApiError::Forbidden("entry belongs to another user"));
    }
    if !LogEntry::delete_in(&mut tx, entry_id).await? {
        return Err(ApiError::NotFound("entry"));
    }
    let entries = LogEntry::list_for_log(&mut *tx, log_id).await?;
    let summary = summarize(&entries);
    tx.commit().await?;
    Ok((log, entries, summary))
}

/// Current state of one log: entries in insertion order plus summary.
pub async fn log_detail(db: &PgPool, user_id: Uuid, log_id: Uuid) -> Result<LogView, ApiError> {
    let log = Log::find_by_id(db, log_id)
        .await?
        .ok_or(ApiError::NotFound("log"))?;
    if log.user_id != user_id {
        return Err(ApiError::Forbidden("log belongs to another user"));
    }
    let entries = LogEntry::list_for_log(db, log_id).await?;
    let summary = summarize(&entries);
    Ok((log, entries, summary))
}

/// Summaries for all of a user's logs, most recent day first, built from a
/// single entry query.
pub async fn list_logs(db: &PgPool, user_id: Uuid) -> Result<Vec<(Log, LogSummary)>, ApiError> {
    let logs = Log::list_by_user(db, user_id).await?;
    let mut entries_by_log: HashMap<Uuid, Vec<LogEntry>> = HashMap::new();
    for entry in LogEntry::list_for_user(db, user_id).await? {
        entries_by_log.entry(entry.log_id).or_default().push(entry);
    }
    Ok(logs
        .into_iter()
        .map(|log| {
            let summary = entries_by_log
                .get(&log.id)
                .map(|entries| summarize(entries))
                .unwrap_or_default();
            (log, summary)
        })
        .collect())
}

/// Delete a log and, by cascade, all of its entries.
pub async fn delete_log(db: &PgPool, user_id: Uuid, log_id: Uuid) -> Result<(), ApiError> {
    let log = Log::find_by_id(db, log_id)
        .await?
        .ok_or(ApiError::NotFound("log"))?;
    if log.user_id != user_id {
        return Err(ApiError::Forbidden("log belongs to another user"));
    }
    if !Log::delete(db, log_id).await? {
        return Err(ApiError::NotFound("log"));
    }
    info!(user_id = %user_id, log_id = %log_id, "log deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::dto::PatchEntryRequest;
    use crate::state::AppState;

    fn patch_with(calories: Option<f64>) -> PatchEntryRequest {
        PatchEntryRequest {
            name: None,
            quantity: None,
            calories,
            fat: None,
            protein: None,
            carbs: None,
        }
    }

    #[test]
    fn patch_rejects_negative_values() {
        let err = validate_patch(&patch_with(Some(-1.0))).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn patch_rejects_non_finite_values() {
        assert!(validate_patch(&patch_with(Some(f64::NAN))).is_err());
        assert!(validate_patch(&patch_with(Some(f64::INFINITY))).is_err());
    }

    #[test]
    fn patch_rejects_blank_name() {
        let patch = PatchEntryRequest {
            name: Some("   ".into()),
            quantity: None,
            calories: None,
            fat: None,
            protein: None,
            carbs: None,
        };
        assert!(validate_patch(&patch).is_err());
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(validate_patch(&patch_with(None)).is_ok());
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_lookup() {
        let state = AppState::fake();
        let err = add_entry(&state, Uuid::new_v4(), Uuid::new_v4(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn only_serialization_failures_are_retryable() {
        assert!(!is_retryable(&ApiError::NotFound("log")));
        assert!(!is_retryable(&ApiError::Database(sqlx::Error::RowNotFound)));
    }
}
