use tokio_postgres::Row;

use crate::db::models::{Comment, User, WatchlistEntry, WriteStatus};
use crate::db::postgres::PostgresClient;
use crate::utils::generate_id;

fn row_to_user(row: &Row) -> User {
    User {
        id: row.get("id"),
        wallet_address: row.get("wallet_address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_comment(row: &Row) -> Comment {
    let status: String = row.get("status");
    Comment {
        id: row.get("id"),
        token_address: row.get("token_address"),
        user_id: row.get("user_id"),
        wallet_address: row.get("wallet_address"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        status: WriteStatus::from_str_or_persisted(&status),
    }
}

fn row_to_entry(row: &Row) -> WatchlistEntry {
    WatchlistEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_address: row.get("token_address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl PostgresClient {
    // ==================== USERS ====================

    /// Get or create a user by wallet address.
    ///
    /// The boolean is true when a new row was inserted.
    pub async fn get_or_create_user(&self, wallet_address: &str) -> anyhow::Result<(User, bool)> {
        let client = self.pool.get().await?;

        let insert = r#"
            INSERT INTO social.users (id, wallet_address)
            VALUES ($1, $2)
            ON CONFLICT (wallet_address) DO NOTHING
            RETURNING id, wallet_address, created_at, updated_at
        "#;

        let id = generate_id("user");
        if let Some(row) = client.query_opt(insert, &[&id, &wallet_address]).await? {
            return Ok((row_to_user(&row), true));
        }

        let row = client
            .query_one(
                "SELECT id, wallet_address, created_at, updated_at FROM social.users WHERE wallet_address = $1",
                &[&wallet_address],
            )
            .await?;

        Ok((row_to_user(&row), false))
    }

    pub async fn get_user_by_wallet(&self, wallet_address: &str) -> anyhow::Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, wallet_address, created_at, updated_at FROM social.users WHERE wallet_address = $1",
                &[&wallet_address],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    // ==================== COMMENTS ====================

    pub async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO social.comments (id, token_address, user_id, wallet_address, content, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
        "#;

        client
            .execute(
                query,
                &[
                    &comment.id,
                    &comment.token_address,
                    &comment.user_id,
                    &comment.wallet_address,
                    &comment.content,
                    &comment.status.as_str(),
                    &comment.created_at,
                ],
            )
            .await?;

        Ok(())
    }

    /// Newest-first comments for one token.
    pub async fn latest_comments(
        &self,
        token_address: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<Comment>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT id, token_address, user_id, wallet_address, content, status, created_at
            FROM social.comments
            WHERE token_address = $1
            ORDER BY created_at DESC
            LIMIT $2
        "#;

        let rows = client.query(query, &[&token_address, &limit]).await?;
        Ok(rows.iter().map(row_to_comment).collect())
    }

    /// Delete rows beyond the `keep` newest for one token.
    ///
    /// Runs as a non-transactional follow-up to the insert; a concurrent
    /// insert can briefly expose one extra row.
    pub async fn prune_comments(&self, token_address: &str, keep: i64) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let query = r#"
            DELETE FROM social.comments
            WHERE token_address = $1
              AND id NOT IN (
                SELECT id FROM social.comments
                WHERE token_address = $1
                ORDER BY created_at DESC
                LIMIT $2
              )
        "#;

        Ok(client.execute(query, &[&token_address, &keep]).await?)
    }

    // ==================== WATCHLIST ====================

    /// Which of `tokens` the user already watches.
    pub async fn watchlist_existing(
        &self,
        user_id: &str,
        tokens: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT token_address FROM social.watchlist_entries WHERE user_id = $1 AND token_address = ANY($2)",
                &[&user_id, &tokens],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get("token_address")).collect())
    }

    /// Batch insert with skip-duplicates semantics. Returns inserted rows.
    pub async fn watchlist_insert(&self, user_id: &str, tokens: &[String]) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO social.watchlist_entries (user_id, token_address)
            SELECT $1, t FROM unnest($2::text[]) AS t
            ON CONFLICT (user_id, token_address) DO NOTHING
        "#;

        Ok(client.execute(query, &[&user_id, &tokens]).await?)
    }

    /// Returns the number of deleted rows.
    pub async fn watchlist_delete(&self, user_id: &str, tokens: &[String]) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        Ok(client
            .execute(
                "DELETE FROM social.watchlist_entries WHERE user_id = $1 AND token_address = ANY($2)",
                &[&user_id, &tokens],
            )
            .await?)
    }

    /// Newest-first page of a user's watchlist.
    pub async fn watchlist_page(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<WatchlistEntry>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT id, user_id, token_address, created_at, updated_at
            FROM social.watchlist_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
        "#;

        let rows = client.query(query, &[&user_id, &limit, &offset]).await?;
        Ok(rows.iter().map(row_to_entry).collect())
    }

    pub async fn watchlist_total(&self, user_id: &str) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM social.watchlist_entries WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn watchlist_contains(
        &self,
        user_id: &str,
        token_address: &str,
    ) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM social.watchlist_entries WHERE user_id = $1 AND token_address = $2)",
                &[&user_id, &token_address],
            )
            .await?;
        Ok(row.get(0))
    }
}
