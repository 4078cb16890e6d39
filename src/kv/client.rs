//! Typed command interface over the in-memory key/value store.
//!
//! One [`redis::aio::ConnectionManager`] serves every command and publish;
//! subscriptions live on the dedicated connection in
//! [`super::subscriber`], because a connection in subscribe mode cannot
//! multiplex commands.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::KvSettings;

/// Async KV client with per-command timeouts and transactional helpers.
#[derive(Clone)]
pub struct KvClient {
    conn: ConnectionManager,
    timeout: Duration,
}

impl KvClient {
    pub async fn connect(settings: &KvSettings) -> Result<Self> {
        info!("Connecting to KV store");
        let client = redis::Client::open(settings.url.as_str()).context("Invalid KV URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to KV store")?;
        info!("Successfully connected to KV store");

        Ok(Self {
            conn,
            timeout: Duration::from_millis(settings.command_timeout_ms),
        })
    }

    async fn run<T>(
        &self,
        what: &str,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(anyhow::Error::new(err).context(format!("kv {what} failed"))),
            Err(_) => bail!("kv {what} timed out after {:?}", self.timeout),
        }
    }

    // ==================== STRINGS / JSON ====================

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        let payload = serde_json::to_string(value).context("failed to serialize value")?;
        let mut conn = self.conn.clone();
        match ttl_secs {
            Some(ttl) => {
                self.run("setJSON", async move {
                    conn.set_ex::<_, _, ()>(key, payload, ttl).await
                })
                .await
            }
            None => {
                self.run("setJSON", async move {
                    conn.set::<_, _, ()>(key, payload).await
                })
                .await
            }
        }
    }

    /// Atomically write several JSON blobs with one TTL (MULTI/EXEC).
    pub async fn set_json_many<T: Serialize>(
        &self,
        entries: &[(String, T)],
        ttl_secs: u64,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            let payload = serde_json::to_string(value).context("failed to serialize value")?;
            pipe.cmd("SET")
                .arg(key)
                .arg(payload)
                .arg("EX")
                .arg(ttl_secs)
                .ignore();
        }
        let mut conn = self.conn.clone();
        self.run("setJSON pipeline", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    /// Returns `None` on a missing key or an undecodable payload.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self
            .run("getJSON", async move { conn.get(key).await })
            .await?;
        Ok(raw.and_then(|payload| serde_json::from_str(&payload).ok()))
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("del", async move { conn.del::<_, ()>(key).await })
            .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.run("exists", async move { conn.exists(key).await })
            .await
    }

    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        self.run("ttl", async move { conn.ttl(key).await }).await
    }

    // ==================== HASHES ====================

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("hset", async move {
            conn.hset::<_, _, _, ()>(key, field, value).await
        })
        .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("hget", async move { conn.hget(key, field).await })
            .await
    }

    pub async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        self.run("hgetAll", async move { conn.hgetall(key).await })
            .await
    }

    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        self.run("hincrBy", async move { conn.hincr(key, field, delta).await })
            .await
    }

    /// The reaction triple as one transaction: previous value, HINCRBY
    /// result and the full hash after the increment.
    pub async fn reaction_txn(
        &self,
        key: &str,
        field: &str,
        increment: i64,
    ) -> Result<(i64, i64, HashMap<String, String>)> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hget(key, field)
            .hincr(key, field, increment)
            .hgetall(key);
        let mut conn = self.conn.clone();
        let (previous, updated, fields): (Option<i64>, i64, HashMap<String, String>) = self
            .run("reaction transaction", async move {
                pipe.query_async(&mut conn).await
            })
            .await?;
        Ok((previous.unwrap_or(0), updated, fields))
    }

    /// HSET a dedup marker and refresh the key's TTL in one transaction.
    /// Returns true when the field did not exist before.
    pub async fn dedup_mark(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl_secs: i64,
    ) -> Result<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic().hset(key, field, value).expire(key, ttl_secs);
        let mut conn = self.conn.clone();
        let (added, _expired): (i64, i64) = self
            .run("dedup mark", async move { pipe.query_async(&mut conn).await })
            .await?;
        Ok(added == 1)
    }

    // ==================== LISTS ====================

    pub async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("lpush", async move {
            conn.lpush::<_, _, ()>(key, value).await
        })
        .await
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.run("lrange", async move { conn.lrange(key, start, stop).await })
            .await
    }

    pub async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("ltrim", async move {
            conn.ltrim::<_, ()>(key, start, stop).await
        })
        .await
    }

    pub async fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("llen", async move { conn.llen(key).await }).await
    }

    /// LPUSH + LTRIM as one transaction, keeping indexes `[0, keep]`.
    pub async fn lpush_trim(&self, key: &str, value: &str, keep: isize) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, keep)
            .ignore();
        let mut conn = self.conn.clone();
        self.run("lpush+ltrim", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    /// LPUSH + LTRIM + EXPIRE as one transaction.
    pub async fn lpush_trim_expire(
        &self,
        key: &str,
        value: &str,
        keep: isize,
        ttl_secs: i64,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, keep)
            .ignore()
            .expire(key, ttl_secs)
            .ignore();
        let mut conn = self.conn.clone();
        self.run("lpush+ltrim+expire", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    // ==================== SETS ====================

    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("sadd", async move {
            conn.sadd::<_, _, ()>(key, member).await
        })
        .await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("srem", async move {
            conn.srem::<_, _, ()>(key, member).await
        })
        .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.run("smembers", async move { conn.smembers(key).await })
            .await
    }

    /// SADD every member in one transaction.
    pub async fn sadd_all(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for member in members {
            pipe.sadd(key, member).ignore();
        }
        let mut conn = self.conn.clone();
        self.run("sadd pipeline", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    /// SREM every member in one transaction.
    pub async fn srem_all(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for member in members {
            pipe.srem(key, member).ignore();
        }
        let mut conn = self.conn.clone();
        self.run("srem pipeline", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    // ==================== PUB/SUB ====================

    pub async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("publish", async move {
            conn.publish::<_, _, ()>(channel, message).await
        })
        .await
    }

    // ==================== HEALTH ====================

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .run("ping", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        if pong != "PONG" {
            bail!("unexpected PING reply: {pong}");
        }
        Ok(())
    }
}
