use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, ErrorDetails};
use crate::store::{IncrementOutcome, UsageStore};
use crate::tier::ResourceType;
use crate::window::{UsageWindow, WindowBounds};

/// Redis-backed usage store.
///
/// Each (subject, resource) pair maps to one hash holding the active
/// window's start and counter; rollover is supersession-by-overwrite
/// inside the scripts, so both operations stay single round trips. The
/// conditional increment is a Lua script, which Redis executes atomically.
pub struct RedisUsageStore {
    conn: MultiplexedConnection,
    op_timeout: Duration,
    get_or_init_script: Script,
    increment_script: Script,
}

impl RedisUsageStore {
    pub async fn connect(url: &str, op_timeout_ms: u64) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to create Redis client: {e}"),
            })
        })?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::StoreUnavailable {
                    message: format!("Failed to get Redis connection: {e}"),
                })
            })?;
        debug!("Connected to Redis usage store");
        Ok(Self::with_connection(conn, op_timeout_ms))
    }

    pub fn with_connection(conn: MultiplexedConnection, op_timeout_ms: u64) -> Self {
        let get_or_init_script = Script::new(
            r#"
            local ws = tonumber(ARGV[1])
            local ttl = tonumber(ARGV[2])

            local stored = redis.call('HGET', KEYS[1], 'ws')
            if not stored or tonumber(stored) ~= ws then
                -- Stored window expired (or first use): supersede it.
                redis.call('HSET', KEYS[1], 'ws', ws, 'n', 0)
                redis.call('EXPIRE', KEYS[1], ttl)
                return 0
            end
            return tonumber(redis.call('HGET', KEYS[1], 'n') or '0')
            "#,
        );

        let increment_script = Script::new(
            r#"
            local ws = tonumber(ARGV[1])
            local limit = tonumber(ARGV[2])
            local ttl = tonumber(ARGV[3])

            local stored = redis.call('HGET', KEYS[1], 'ws')
            if not stored or tonumber(stored) ~= ws then
                redis.call('HSET', KEYS[1], 'ws', ws, 'n', 0)
                redis.call('EXPIRE', KEYS[1], ttl)
            end

            local n = tonumber(redis.call('HGET', KEYS[1], 'n') or '0')
            if n < limit then
                n = redis.call('HINCRBY', KEYS[1], 'n', 1)
                return {1, n}
            end
            return {0, n}
            "#,
        );

        Self {
            conn,
            op_timeout: Duration::from_millis(op_timeout_ms),
            get_or_init_script,
            increment_script,
        }
    }

    fn key(subject: &str, resource: ResourceType) -> String {
        format!("quota:{subject}:{resource}")
    }

    /// Seconds the row should outlive its window. An expired key is
    /// superseded by the scripts anyway; the TTL just keeps dead rows from
    /// accumulating.
    fn ttl_seconds(window: &WindowBounds) -> i64 {
        (window.end - Utc::now()).num_seconds().max(1)
    }
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn get_or_init(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
    ) -> Result<UsageWindow, Error> {
        let mut conn = self.conn.clone();
        let mut invocation = self.get_or_init_script.prepare_invoke();
        invocation
            .key(Self::key(subject, resource))
            .arg(window.start.timestamp())
            .arg(Self::ttl_seconds(window));

        let count = match timeout(self.op_timeout, invocation.invoke_async::<i64>(&mut conn)).await
        {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                return Err(Error::new(ErrorDetails::StoreUnavailable {
                    message: format!("Redis error reading usage window: {e}"),
                }))
            }
            Err(_) => {
                return Err(Error::new(ErrorDetails::StoreUnavailable {
                    message: format!(
                        "Redis timeout after {}ms reading usage window",
                        self.op_timeout.as_millis()
                    ),
                }))
            }
        };

        Ok(UsageWindow {
            subject_id: subject.to_string(),
            resource,
            window_start: window.start,
            window_end: window.end,
            count: u32::try_from(count).unwrap_or(0),
        })
    }

    async fn increment_if_below(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
        limit: u32,
    ) -> Result<IncrementOutcome, Error> {
        let mut conn = self.conn.clone();
        let mut invocation = self.increment_script.prepare_invoke();
        invocation
            .key(Self::key(subject, resource))
            .arg(window.start.timestamp())
            .arg(limit)
            .arg(Self::ttl_seconds(window));

        let reply = match timeout(
            self.op_timeout,
            invocation.invoke_async::<Vec<i64>>(&mut conn),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                return Err(Error::new(ErrorDetails::StoreUnavailable {
                    message: format!("Redis error incrementing usage: {e}"),
                }))
            }
            Err(_) => {
                return Err(Error::new(ErrorDetails::StoreUnavailable {
                    message: format!(
                        "Redis timeout after {}ms incrementing usage",
                        self.op_timeout.as_millis()
                    ),
                }))
            }
        };

        match reply.as_slice() {
            [success, new_count] => Ok(IncrementOutcome {
                success: *success == 1,
                new_count: u32::try_from(*new_count).unwrap_or(0),
            }),
            _ => Err(Error::new(ErrorDetails::InternalError {
                message: format!("Malformed increment script reply: {reply:?}"),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::ResetPeriod;
    use crate::window::WindowClock;

    #[test]
    fn test_key_format() {
        assert_eq!(
            RedisUsageStore::key("user-42", ResourceType::AssistantColy),
            "quota:user-42:assistant_coly"
        );
    }

    #[test]
    fn test_ttl_at_least_one_second() {
        let mut window = WindowClock::current_window(ResetPeriod::Hourly, Utc::now());
        assert!(RedisUsageStore::ttl_seconds(&window) >= 1);

        // Already-expired window still yields a valid EXPIRE argument.
        window.end = window.start;
        assert_eq!(RedisUsageStore::ttl_seconds(&window), 1);
    }
}
