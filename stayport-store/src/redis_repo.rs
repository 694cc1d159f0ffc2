use redis::{AsyncCommands, RedisResult};

/// Thin wrapper over the hosted key-value store. Every component that needs
/// cross-invocation state goes through this client; there is no other shared
/// storage.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set(key, value).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex(key, value, ttl_seconds).await
    }

    /// SET NX: only set if the key does not exist. No expiry.
    pub async fn set_nx(&self, key: &str, value: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    /// SET NX EX: acquire a short-lived lock key.
    pub async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    pub async fn del(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }

    pub async fn expire(&self, key: &str, ttl_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.expire(key, ttl_seconds).await
    }

    pub async fn sadd(&self, key: &str, member: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.sadd(key, member).await
    }

    pub async fn smembers(&self, key: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.smembers(key).await
    }

    pub async fn zadd(&self, key: &str, member: &str, score: i64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zadd(key, member, score).await
    }

    pub async fn zrem(&self, key: &str, member: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zrem(key, member).await
    }

    pub async fn zcard(&self, key: &str) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zcard(key).await
    }

    /// Lowest-scored member, if any.
    pub async fn zrange_first(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let members: Vec<String> = conn.zrange(key, 0, 0).await?;
        Ok(members.into_iter().next())
    }

    pub async fn zrangebyscore(&self, key: &str, min: i64, max: i64) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zrangebyscore(key, min, max).await
    }

    pub async fn zremrangebyscore(&self, key: &str, min: i64, max: i64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zrembyscore(key, min, max).await
    }

    /// Keyspace scan. Only the legacy payment-intent fallback and the admin
    /// debug surface use this; everything else goes through explicit indexes.
    pub async fn keys(&self, pattern: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.keys(pattern).await
    }
}
