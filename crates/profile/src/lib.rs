//! SQLite-backed user profile store.
//!
//! Owns everything that outlives a session: the user registry, per-date
//! exercise history, the coin balance, squat progress, and the avatar
//! inventory. Sessions write their totals here exactly once, at the end;
//! a second write for the same user, kind and date overwrites rather than
//! accumulates.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use fitquest_detect::ExerciseKind;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("user already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid user: {0}")]
    InvalidUser(String),
    #[error("not enough coins: have {have}, need {need}")]
    InsufficientCoins { have: u64, need: u64 },
}

pub type Result<T> = std::result::Result<T, ProfileError>;

/// Coins credited per counted event, by exercise.
const COINS_PER_SQUAT: u32 = 5;
const COINS_PER_BURST: u32 = 10;
const COINS_PER_SIT: u32 = 5;
const COINS_PER_COIN: u32 = 1;

/// Progress lost per fully missed day between sessions.
const PENALTY_PER_MISSED_DAY: u32 = 10;

/// A persisted user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub age: u32,
    pub coins: u64,
    pub progress: f32,
    pub last_exercise_date: Option<String>,
    pub inventory: Vec<String>,
}

/// One per-date history entry for an exercise kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub date: String,
    pub count: u32,
}

/// What a finished session writes into the store.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTotals {
    pub kind: ExerciseKind,
    /// Session date as `YYYY-MM-DD`.
    pub date: String,
    pub count: u32,
    pub coins_earned: u32,
    /// Session progress; only squat sessions carry it.
    pub progress_percent: Option<f32>,
}

impl SessionTotals {
    /// Derive the totals for a finished session, applying the per-exercise
    /// reward rules.
    pub fn for_session(kind: ExerciseKind, date: String, count: u32, goal_reps: u32) -> Self {
        let goal = goal_reps.max(1);
        let (coins_earned, progress_percent) = match kind {
            ExerciseKind::Squat => (
                count.min(goal) * COINS_PER_SQUAT,
                Some((count as f32 * 100.0 / goal as f32).min(100.0)),
            ),
            ExerciseKind::Walking => (count * COINS_PER_BURST, None),
            ExerciseKind::ChairSit => (count * COINS_PER_SIT, None),
            ExerciseKind::Hand => (count * COINS_PER_COIN, None),
        };
        Self {
            kind,
            date,
            count,
            coins_earned,
            progress_percent,
        }
    }
}

/// The profile database.
pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                name TEXT PRIMARY KEY,
                age INTEGER NOT NULL,
                coins INTEGER NOT NULL DEFAULT 0,
                progress REAL NOT NULL DEFAULT 0,
                last_exercise_date TEXT,
                inventory_json TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS exercise_history (
                user TEXT NOT NULL,
                kind TEXT NOT NULL,
                date TEXT NOT NULL,
                count INTEGER NOT NULL,
                PRIMARY KEY (user, kind, date),
                FOREIGN KEY (user) REFERENCES users(name)
            );

            CREATE INDEX IF NOT EXISTS idx_history_user_kind
                ON exercise_history(user, kind);
            "#,
        )?;
        Ok(())
    }

    // User registry

    pub fn create_user(&self, name: &str, age: u32) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ProfileError::InvalidUser("name cannot be empty".into()));
        }
        if age == 0 {
            return Err(ProfileError::InvalidUser(
                "age must be a positive number".into(),
            ));
        }

        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_some() {
            return Err(ProfileError::AlreadyExists(name.to_string()));
        }

        conn.execute(
            "INSERT INTO users (name, age) VALUES (?1, ?2)",
            (name, age),
        )?;
        tracing::info!(user = name, "user created");
        Ok(())
    }

    pub fn get_user(&self, name: &str) -> Result<UserProfile> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        Self::get_user_on(&conn, name)
    }

    fn get_user_on(conn: &Connection, name: &str) -> Result<UserProfile> {
        let row = conn
            .query_row(
                "SELECT name, age, coins, progress, last_exercise_date, inventory_json
                 FROM users WHERE name = ?1",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u64>(2)?,
                        row.get::<_, f32>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        Ok(UserProfile {
            name: row.0,
            age: row.1,
            coins: row.2,
            progress: row.3,
            last_exercise_date: row.4,
            inventory: serde_json::from_str(&row.5)?,
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let mut stmt = conn.prepare("SELECT name FROM users ORDER BY name")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        names
            .iter()
            .map(|name| Self::get_user_on(&conn, name))
            .collect()
    }

    pub fn delete_user(&self, name: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("profile store mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM exercise_history WHERE user = ?1", [name])?;
        let affected = tx.execute("DELETE FROM users WHERE name = ?1", [name])?;
        if affected == 0 {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        tx.commit()?;
        tracing::info!(user = name, "user deleted");
        Ok(())
    }

    // Session totals

    /// Merge a finished session into the store: overwrite the same-date
    /// history entry, credit coins, carry squat progress, and stamp the
    /// exercise date. One transaction, so a crash never leaves a half
    /// recorded session.
    pub fn record_session(&self, name: &str, totals: &SessionTotals) -> Result<()> {
        let mut conn = self.conn.lock().expect("profile store mutex poisoned");
        let tx = conn.transaction()?;

        let stored_progress: f32 = tx
            .query_row("SELECT progress FROM users WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO exercise_history (user, kind, date, count)
             VALUES (?1, ?2, ?3, ?4)",
            (name, totals.kind.as_str(), &totals.date, totals.count),
        )?;

        let new_progress = match totals.progress_percent {
            Some(session_progress) => {
                let increase = session_progress.min(100.0 - stored_progress).max(0.0);
                (stored_progress + increase).clamp(0.0, 100.0)
            }
            None => stored_progress,
        };

        tx.execute(
            "UPDATE users
             SET coins = coins + ?2, progress = ?3, last_exercise_date = ?4
             WHERE name = ?1",
            (name, totals.coins_earned, new_progress, &totals.date),
        )?;

        tx.commit()?;
        tracing::info!(
            user = name,
            kind = totals.kind.as_str(),
            date = %totals.date,
            count = totals.count,
            coins = totals.coins_earned,
            "session recorded"
        );
        Ok(())
    }

    /// Reduce stored progress by 10% per fully missed day since the last
    /// exercise. Returns the applied reduction, if any.
    pub fn apply_missed_day_penalty(&self, name: &str, today: &str) -> Result<Option<u32>> {
        let user = self.get_user(name)?;
        let Some(last) = user.last_exercise_date.as_deref() else {
            return Ok(None);
        };

        let (Ok(last), Ok(today)) = (
            NaiveDate::parse_from_str(last, "%Y-%m-%d"),
            NaiveDate::parse_from_str(today, "%Y-%m-%d"),
        ) else {
            return Ok(None);
        };

        let days_missed = (today - last).num_days() - 1;
        if days_missed <= 0 {
            return Ok(None);
        }

        let reduction = (PENALTY_PER_MISSED_DAY * days_missed as u32).min(100);
        let new_progress = (user.progress - reduction as f32).max(0.0);

        let conn = self.conn.lock().expect("profile store mutex poisoned");
        conn.execute(
            "UPDATE users SET progress = ?2 WHERE name = ?1",
            (name, new_progress),
        )?;
        tracing::info!(user = name, days_missed, reduction, "missed-day penalty");
        Ok(Some(reduction))
    }

    // History queries

    pub fn history(&self, name: &str, kind: ExerciseKind) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT date, count FROM exercise_history
             WHERE user = ?1 AND kind = ?2 ORDER BY date",
        )?;
        let rows = stmt.query_map((name, kind.as_str()), |row| {
            Ok(HistoryEntry {
                date: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Per-user lifetime totals for one exercise kind (chart data).
    pub fn totals_by_user(&self, kind: ExerciseKind) -> Result<Vec<(String, u64)>> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT user, SUM(count) FROM exercise_history
             WHERE kind = ?1 GROUP BY user ORDER BY user",
        )?;
        let rows = stmt.query_map([kind.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    // Marketplace

    /// Debit coins and add the item to the user's inventory.
    pub fn purchase(&self, name: &str, item: &str, price: u64) -> Result<()> {
        let user = self.get_user(name)?;
        if user.coins < price {
            return Err(ProfileError::InsufficientCoins {
                have: user.coins,
                need: price,
            });
        }

        let mut inventory = user.inventory;
        inventory.push(item.to_lowercase());
        let inventory_json = serde_json::to_string(&inventory)?;

        let conn = self.conn.lock().expect("profile store mutex poisoned");
        conn.execute(
            "UPDATE users SET coins = coins - ?2, inventory_json = ?3 WHERE name = ?1",
            (name, price, inventory_json),
        )?;
        tracing::info!(user = name, item, price, "item purchased");
        Ok(())
    }
}
