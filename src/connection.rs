//! The store client surface the routing proxy decorates.
//!
//! Methods return boxed futures so both traits stay object safe: the proxy
//! holds `Arc<dyn Multiplexer>` / `Arc<dyn Database>` and the connection
//! factory hands out trait objects.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::flags::CommandFlags;
use crate::types::{HashEntry, RedisKey, RedisResult, RedisValue, When};

/// Per-database command surface. Every command takes the caller's flags.
pub trait Database: Send + Sync {
    /// Database index this handle addresses; `None` is the connection default.
    fn index(&self) -> Option<u32>;

    fn hash_get<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>>;

    fn hash_get_many<'a>(
        &'a self,
        key: &'a RedisKey,
        fields: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<Option<RedisValue>>>>;

    fn hash_set<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        value: &'a RedisValue,
        when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    fn hash_set_many<'a>(
        &'a self,
        key: &'a RedisKey,
        entries: &'a [HashEntry],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<()>>;

    /// `EVAL` with the script source.
    fn script_evaluate<'a>(
        &'a self,
        script: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>>;

    /// `EVALSHA` with the hex SHA1 digest of a loaded script.
    fn script_evaluate_sha<'a>(
        &'a self,
        sha1: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>>;

    fn hash_get_all<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<HashEntry>>>;

    fn hash_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    fn hash_length<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<u64>>;

    fn string_get<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>>;

    fn string_set<'a>(
        &'a self,
        key: &'a RedisKey,
        value: &'a RedisValue,
        expiry: Option<Duration>,
        when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    fn key_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    fn key_exists<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Set (`Some`) or clear (`None`) the expiry of a key.
    fn key_expire<'a>(
        &'a self,
        key: &'a RedisKey,
        expiry: Option<Duration>,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Remaining time to live; `None` when the key is missing or persistent.
    fn key_ttl<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<Duration>>>;

    /// Round-trip latency.
    fn ping<'a>(&'a self, flags: CommandFlags) -> BoxFuture<'a, Result<Duration>>;

    /// Arbitrary command.
    fn execute<'a>(
        &'a self,
        command: &'a str,
        args: &'a [Bytes],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>>;
}

/// Long-lived connection manager.
pub trait Multiplexer: Send + Sync {
    /// Acquire a lightweight handle for database `db` (`None` = default).
    fn database(&self, db: Option<u32>) -> Arc<dyn Database>;

    fn client_name(&self) -> String;

    /// The configuration string the multiplexer was built from.
    fn configuration(&self) -> String;

    fn timeout(&self) -> Duration;

    fn operation_count(&self) -> u64;

    fn is_connected(&self) -> bool;

    fn is_connecting(&self) -> bool;

    fn servers(&self) -> Vec<ServerInfo>;

    /// Human readable status report.
    fn status(&self) -> String;

    fn add_event_handler(&self, handler: EventHandler) -> HandlerId;

    fn remove_event_handler(&self, id: HandlerId) -> bool;

    fn close(&self) -> BoxFuture<'_, Result<()>>;

    /// True for a multiplexer already decorated with command-flag routing.
    fn is_routing_proxy(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    Primary,
    Replica,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Primary => f.write_str("primary"),
            ServerRole::Replica => f.write_str("replica"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub endpoint: String,
    pub role: ServerRole,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectionFailed { endpoint: String, reason: String },
    ConnectionRestored { endpoint: String },
    /// The server answered a command with an error reply.
    ErrorMessage { endpoint: String, message: String },
}

pub type EventHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Registry of event handlers owned by a multiplexer.
#[derive(Default)]
pub struct EventHub {
    handlers: DashMap<HandlerId, EventHandler>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.insert(id, handler);
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn emit(&self, event: &ConnectionEvent) {
        // Snapshot first so handlers may add or remove registrations.
        let handlers: Vec<EventHandler> = self.handlers.iter().map(|e| e.value().clone()).collect();
        for handler in handlers {
            handler(event);
        }
    }
}
