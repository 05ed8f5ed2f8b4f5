//! Game repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{FieldValue, GameRecord, MetadataField, NewGame};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

const SELECT_COLUMNS: &str = "id, title, platform, cover_image_url, release_date, genre, \
                              description, critic_rating, market_price";

/// Game repository interface used by the metadata resolver
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Find a game by its ID
    ///
    /// # Returns
    /// - `Ok(Some(game))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: i64) -> Result<Option<GameRecord>>;

    /// Insert a new game and return its ID
    ///
    /// # Errors
    /// Returns error if validation fails or the database rejects the row
    async fn insert(&self, game: &NewGame) -> Result<i64>;

    /// Games whose `field` column is NULL or blank, oldest first
    ///
    /// # Arguments
    /// * `field` - Metadata column to inspect
    /// * `limit` - Optional cap on the number of rows returned
    async fn find_missing(&self, field: MetadataField, limit: Option<u32>)
        -> Result<Vec<GameRecord>>;

    /// Count games whose `field` column is NULL or blank
    async fn count_missing(&self, field: MetadataField) -> Result<i64>;

    /// Write a resolved value into one metadata column
    ///
    /// # Errors
    /// Returns `NotFound` if no game has this ID
    async fn update_field(&self, id: i64, field: MetadataField, value: &FieldValue) -> Result<()>;
}

/// SQLite implementation of GameRepository
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    /// Create a new SQLite game repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn missing_clause(field: MetadataField) -> String {
    let column = field.column_name();
    format!("({column} IS NULL OR TRIM(CAST({column} AS TEXT)) = '')")
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<GameRecord>> {
        let game = query_as::<_, GameRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM games WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(game)
    }

    async fn insert(&self, game: &NewGame) -> Result<i64> {
        game.validate()
            .map_err(|msg| LibraryError::invalid("game", msg))?;

        let result = sqlx::query(
            r#"
            INSERT INTO games (
                title, platform, cover_image_url, release_date,
                genre, description, critic_rating, market_price
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.title)
        .bind(&game.platform)
        .bind(&game.cover_image_url)
        .bind(&game.release_date)
        .bind(&game.genre)
        .bind(&game.description)
        .bind(game.critic_rating)
        .bind(game.market_price)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_missing(
        &self,
        field: MetadataField,
        limit: Option<u32>,
    ) -> Result<Vec<GameRecord>> {
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM games WHERE {} ORDER BY id",
            missing_clause(field)
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let games = query_as::<_, GameRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(field = %field, count = games.len(), "Loaded games missing field");
        Ok(games)
    }

    async fn count_missing(&self, field: MetadataField) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM games WHERE {}", missing_clause(field));
        let count: (i64,) = query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count.0)
    }

    async fn update_field(&self, id: i64, field: MetadataField, value: &FieldValue) -> Result<()> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE games SET {} = ? WHERE id = ?", field.column_name());
        let query = sqlx::query(&sql);
        let query = match value {
            FieldValue::Text(text) => query.bind(text.clone()),
            FieldValue::Integer(number) => query.bind(*number),
            FieldValue::Real(number) => query.bind(*number),
        };

        let result = query.bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Game".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }
}
