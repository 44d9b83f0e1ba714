use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::info;

use skyway_core::repository::{RateLimiter, SessionStore};
use skyway_core::{CoreError, CoreResult};

/// Redis-backed token revocation and rate limiting.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail at startup rather than on the first request.
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        info!("Connected to Redis");
        Ok(Self { client })
    }

    pub async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("revoked:{}", jti);
        conn.set_ex::<_, _, ()>(key, 1, ttl_seconds.max(1)).await
    }

    pub async fn is_token_revoked(&self, jti: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("revoked:{}", jti);
        conn.exists(key).await
    }

    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

fn redis_error(err: redis::RedisError) -> CoreError {
    tracing::error!("Redis error: {}", err);
    CoreError::internal(err)
}

#[async_trait]
impl SessionStore for RedisClient {
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> CoreResult<()> {
        self.revoke_token(jti, ttl_seconds).await.map_err(redis_error)
    }

    async fn is_revoked(&self, jti: &str) -> CoreResult<bool> {
        self.is_token_revoked(jti).await.map_err(redis_error)
    }
}

#[async_trait]
impl RateLimiter for RedisClient {
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        RedisClient::check_rate_limit(self, key, limit, window_seconds)
            .await
            .map_err(redis_error)
    }
}
