//! Recording fakes for the proxy tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use redis_flagroute::{
    CommandFlags, Database, Error, EventHandler, EventHub, HandlerId, HashEntry, Multiplexer,
    RedisKey, RedisResult, RedisValue, Result, RoutingPolicy, ServerInfo, When,
};

/// One command observed by a [`RecordingDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub key: RedisKey,
    pub flags: CommandFlags,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Keys with this prefix make a [`RecordingDatabase`] command fail.
pub const DOWN_PREFIX: &str = "down:";

pub struct RecordingDatabase {
    db: Option<u32>,
    calls: CallLog,
}

impl RecordingDatabase {
    pub fn new(calls: CallLog) -> Self {
        Self { db: None, calls }
    }

    /// Log the command; keys starting with [`DOWN_PREFIX`] then fail with a timeout.
    fn record(&self, op: &'static str, key: &RedisKey, flags: CommandFlags) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            op,
            key: key.clone(),
            flags,
        });
        if key.as_bytes().starts_with(DOWN_PREFIX.as_bytes()) {
            return Err(Error::Timeout {
                endpoint: "fake:6379".to_string(),
                after: Duration::from_secs(5),
            });
        }
        Ok(())
    }
}

impl Database for RecordingDatabase {
    fn index(&self) -> Option<u32> {
        self.db
    }

    fn hash_get<'a>(
        &'a self,
        key: &'a RedisKey,
        _field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>> {
        Box::pin(async move {
            self.record("hash_get", key, flags)?;
            Ok(Some(Bytes::from_static(b"value")))
        })
    }

    fn hash_get_many<'a>(
        &'a self,
        key: &'a RedisKey,
        fields: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<Option<RedisValue>>>> {
        Box::pin(async move {
            self.record("hash_get_many", key, flags)?;
            Ok(vec![None; fields.len()])
        })
    }

    fn hash_set<'a>(
        &'a self,
        key: &'a RedisKey,
        _field: &'a RedisValue,
        _value: &'a RedisValue,
        _when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("hash_set", key, flags)?;
            Ok(true)
        })
    }

    fn hash_set_many<'a>(
        &'a self,
        key: &'a RedisKey,
        _entries: &'a [HashEntry],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record("hash_set_many", key, flags)?;
            Ok(())
        })
    }

    fn script_evaluate<'a>(
        &'a self,
        _script: &'a str,
        keys: &'a [RedisKey],
        _values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(async move {
            self.record("script_evaluate", &keys.first().cloned().unwrap_or_default(), flags)?;
            Ok(RedisResult::Integer(keys.len() as i64))
        })
    }

    fn script_evaluate_sha<'a>(
        &'a self,
        _sha1: &'a str,
        keys: &'a [RedisKey],
        _values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(async move {
            self.record("script_evaluate_sha", &keys.first().cloned().unwrap_or_default(), flags)?;
            Ok(RedisResult::Integer(keys.len() as i64))
        })
    }

    fn hash_get_all<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<HashEntry>>> {
        Box::pin(async move {
            self.record("hash_get_all", key, flags)?;
            Ok(Vec::new())
        })
    }

    fn hash_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        _field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("hash_delete", key, flags)?;
            Ok(true)
        })
    }

    fn hash_length<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            self.record("hash_length", key, flags)?;
            Ok(0)
        })
    }

    fn string_get<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>> {
        Box::pin(async move {
            self.record("string_get", key, flags)?;
            Ok(None)
        })
    }

    fn string_set<'a>(
        &'a self,
        key: &'a RedisKey,
        _value: &'a RedisValue,
        _expiry: Option<Duration>,
        _when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("string_set", key, flags)?;
            Ok(true)
        })
    }

    fn key_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("key_delete", key, flags)?;
            Ok(true)
        })
    }

    fn key_exists<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("key_exists", key, flags)?;
            Ok(false)
        })
    }

    fn key_expire<'a>(
        &'a self,
        key: &'a RedisKey,
        _expiry: Option<Duration>,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record("key_expire", key, flags)?;
            Ok(true)
        })
    }

    fn key_ttl<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<Duration>>> {
        Box::pin(async move {
            self.record("key_ttl", key, flags)?;
            Ok(Some(Duration::from_secs(60)))
        })
    }

    fn ping<'a>(&'a self, flags: CommandFlags) -> BoxFuture<'a, Result<Duration>> {
        Box::pin(async move {
            self.record("ping", &RedisKey::null(), flags)?;
            Ok(Duration::ZERO)
        })
    }

    fn execute<'a>(
        &'a self,
        _command: &'a str,
        _args: &'a [Bytes],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(async move {
            self.record("execute", &RedisKey::null(), flags)?;
            Ok(RedisResult::Nil)
        })
    }
}

/// Multiplexer whose databases record every command into one shared log.
#[derive(Default)]
pub struct FakeMultiplexer {
    pub calls: CallLog,
    pub events: EventHub,
    pub closed: AtomicUsize,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Multiplexer for FakeMultiplexer {
    fn database(&self, db: Option<u32>) -> Arc<dyn Database> {
        Arc::new(RecordingDatabase {
            db,
            calls: self.calls.clone(),
        })
    }

    fn client_name(&self) -> String {
        "fake".to_string()
    }

    fn configuration(&self) -> String {
        "fake:6379".to_string()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn operation_count(&self) -> u64 {
        self.calls.lock().unwrap().len() as u64
    }

    fn is_connected(&self) -> bool {
        self.closed.load(Ordering::SeqCst) == 0
    }

    fn is_connecting(&self) -> bool {
        false
    }

    fn servers(&self) -> Vec<ServerInfo> {
        Vec::new()
    }

    fn status(&self) -> String {
        "fake status".to_string()
    }

    fn add_event_handler(&self, handler: EventHandler) -> HandlerId {
        self.events.add(handler)
    }

    fn remove_event_handler(&self, id: HandlerId) -> bool {
        self.events.remove(id)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// What a [`RecordingPolicy`] was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consult {
    Read(CommandFlags, RedisKey),
    Write(CommandFlags, RedisKey),
}

/// Policy returning fixed directives (unvalidated) and recording each call.
pub struct RecordingPolicy {
    pub read: CommandFlags,
    pub write: CommandFlags,
    pub consulted: Mutex<Vec<Consult>>,
}

impl RecordingPolicy {
    pub fn new(read: CommandFlags, write: CommandFlags) -> Self {
        Self {
            read,
            write,
            consulted: Mutex::new(Vec::new()),
        }
    }

    pub fn consulted(&self) -> Vec<Consult> {
        self.consulted.lock().unwrap().clone()
    }
}

impl RoutingPolicy for RecordingPolicy {
    fn route_for_read(&self, flags: CommandFlags, key: &RedisKey) -> CommandFlags {
        self.consulted
            .lock()
            .unwrap()
            .push(Consult::Read(flags, key.clone()));
        self.read
    }

    fn route_for_write(&self, flags: CommandFlags, key: &RedisKey) -> CommandFlags {
        self.consulted
            .lock()
            .unwrap()
            .push(Consult::Write(flags, key.clone()));
        self.write
    }
}

pub fn key(k: &str) -> RedisKey {
    RedisKey::from(k)
}

pub fn value(v: &'static str) -> RedisValue {
    Bytes::from_static(v.as_bytes())
}

pub fn last_call(calls: &CallLog) -> Call {
    calls.lock().unwrap().last().cloned().expect("no call recorded")
}
