use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use redis::{
    AsyncCommands, Client, ConnectionInfo, ErrorKind, IntoConnectionInfo, RedisError,
    aio::ConnectionManager,
};

use crate::{CounterStore, QuotaError};

/// Number of connections opened by [`RedisCounterStoreOptions::new`].
pub const DEFAULT_CONNECTION_COUNT: usize = 5;

/// Configuration for [`RedisCounterStore::connect`].
///
/// # Examples
///
/// ```ignore
/// use quotabucket::redis::{RedisCounterStore, RedisCounterStoreOptions};
///
/// let store = RedisCounterStore::connect(RedisCounterStoreOptions {
///     password: Some("s3cret".to_string()),
///     ..RedisCounterStoreOptions::new("redis://127.0.0.1:6379/")
/// })
/// .await?;
/// ```
#[derive(Clone, Debug)]
pub struct RedisCounterStoreOptions {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/` or `unix:///tmp/redis.sock`.
    pub url: String,

    /// Credential sent with `AUTH` on every new connection.
    ///
    /// Overrides any password embedded in `url`.
    pub password: Option<String>,

    /// Number of multiplexed connections to spread commands over. Must be > 0.
    pub connection_count: usize,
}

impl RedisCounterStoreOptions {
    /// Options for `url` with no password and [`DEFAULT_CONNECTION_COUNT`] connections.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            password: None,
            connection_count: DEFAULT_CONNECTION_COUNT,
        }
    }
}

/// A [`CounterStore`] backed by Redis.
///
/// Holds a fixed set of [`ConnectionManager`]s and hands them out round-robin, one per
/// command. Each manager reconnects on its own after a failure; commands are never
/// retried by this type. Clones share the connections and the rotation.
///
/// Commands issued: `GET`, `INCRBY`, `PEXPIRE`, `PTTL` and `PING`.
#[derive(Clone)]
pub struct RedisCounterStore {
    connections: Arc<[ConnectionManager]>,
    next: Arc<AtomicUsize>,
}

impl RedisCounterStoreOptions {
    fn connection_info(&self) -> Result<ConnectionInfo, QuotaError> {
        if self.connection_count == 0 {
            return Err(QuotaError::InvalidConnectionCount(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connection_info = self.url.as_str().into_connection_info()?;
        if let Some(password) = &self.password {
            connection_info.redis.password = Some(password.clone());
        }

        Ok(connection_info)
    }
}

impl RedisCounterStore {
    /// Connect and verify the store is reachable.
    ///
    /// Fails fast: the connections are opened and a `PING` is issued before returning, so
    /// an unreachable address or a rejected credential surfaces here instead of on the
    /// first bucket operation. Credential failures are reported as
    /// [`QuotaError::Authentication`].
    pub async fn connect(options: RedisCounterStoreOptions) -> Result<Self, QuotaError> {
        let client = Client::open(options.connection_info()?)?;
        let store = Self::open(&client, options.connection_count).await?;

        store.ping().await.map_err(|err| match err {
            QuotaError::RedisError(err) => connect_error(err),
            err => err,
        })?;

        tracing::info!(
            connection_count = options.connection_count,
            "Connected to Redis counter store"
        );

        Ok(store)
    }

    /// Build a store over an existing [`redis::Client`] with `connection_count`
    /// connections.
    ///
    /// Unlike [`RedisCounterStore::connect`] this does not issue a `PING`.
    pub async fn from_client(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, QuotaError> {
        let count = NonZeroUsize::new(connection_count).ok_or_else(|| {
            QuotaError::InvalidConnectionCount("connection count must be > 0".to_string())
        })?;

        Self::open(&client, count.get()).await
    }

    async fn open(client: &Client, count: usize) -> Result<Self, QuotaError> {
        let mut connections = Vec::with_capacity(count);
        while connections.len() < count {
            connections.push(
                client
                    .get_connection_manager()
                    .await
                    .map_err(connect_error)?,
            );
        }

        Ok(Self {
            connections: connections.into(),
            next: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of pooled connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The connection for the next command.
    pub(crate) fn connection(&self) -> ConnectionManager {
        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        self.connections[turn % self.connections.len()].clone()
    }
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl CounterStore for RedisCounterStore {
    async fn read_count(&self, key: &str) -> Result<Option<u64>, QuotaError> {
        let mut conn = self.connection();
        let count: Option<u64> = conn.get(key).await?;

        Ok(count)
    }

    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, QuotaError> {
        let mut conn = self.connection();
        let total: u64 = conn.incr(key, amount).await?;

        Ok(total)
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), QuotaError> {
        let ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let mut conn = self.connection();
        let _: bool = conn.pexpire(key, ms).await?;

        Ok(())
    }

    async fn read_ttl(&self, key: &str) -> Result<Duration, QuotaError> {
        let mut conn = self.connection();
        let ttl_ms: i64 = conn.pttl(key).await?;

        match ttl_ms {
            -2 => Err(QuotaError::KeyNotFound(key.to_string())),
            ms if ms < 0 => Err(QuotaError::NoExpiry(key.to_string())),
            ms => Ok(Duration::from_millis(ms as u64)),
        }
    }

    async fn ping(&self) -> Result<(), QuotaError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(())
    }
}

fn connect_error(err: RedisError) -> QuotaError {
    let rejected_credential = err.kind() == ErrorKind::AuthenticationFailed
        || matches!(err.code(), Some("WRONGPASS") | Some("NOAUTH"));

    if rejected_credential {
        QuotaError::Authentication(err)
    } else {
        QuotaError::RedisError(err)
    }
}
