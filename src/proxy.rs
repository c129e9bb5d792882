//! Command-flag routing proxies.
//!
//! [`ProxyMultiplexer`] hands out a [`ProxyDatabase`] for every acquired
//! database. The proxy database consults the [`RoutingPolicy`] for hash reads,
//! hash writes and script evaluation, swaps the routing part of the caller's
//! flags for the policy's directive and forwards to the wrapped handle.
//! Everything else is forwarded untouched.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{self, BoxFuture};

use crate::connection::{Database, EventHandler, HandlerId, Multiplexer, ServerInfo};
use crate::error::Result;
use crate::flags::CommandFlags;
use crate::policy::RoutingPolicy;
use crate::types::{HashEntry, RedisKey, RedisResult, RedisValue, When};

/// Forward async commands to `self.inner` as-is.
macro_rules! delegate_commands {
    ($( fn $name:ident<$lt:lifetime>($($arg:ident : $ty:ty),*) -> $ret:ty; )*) => {
        $(
            fn $name<$lt>(&$lt self $(, $arg: $ty)*) -> BoxFuture<$lt, Result<$ret>> {
                self.inner.$name($($arg),*)
            }
        )*
    };
}

/// Forward plain members to `self.inner` as-is.
macro_rules! delegate_members {
    ($( fn $name:ident($($arg:ident : $ty:ty),*) -> $ret:ty; )*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.inner.$name($($arg),*)
            }
        )*
    };
}

pub struct ProxyDatabase {
    inner: Arc<dyn Database>,
    policy: Arc<dyn RoutingPolicy>,
}

impl ProxyDatabase {
    pub fn new(inner: Arc<dyn Database>, policy: Arc<dyn RoutingPolicy>) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &Arc<dyn Database> {
        &self.inner
    }

    fn read_flags(&self, op: &'static str, flags: CommandFlags, key: &RedisKey) -> Result<CommandFlags> {
        let routed = flags.with_replacement_routing_flags(self.policy.route_for_read(flags, key))?;
        tracing::trace!(op, %key, original = %flags, routed = %routed, "routing read");
        Ok(routed)
    }

    fn write_flags(&self, op: &'static str, flags: CommandFlags, key: &RedisKey) -> Result<CommandFlags> {
        let routed = flags.with_replacement_routing_flags(self.policy.route_for_write(flags, key))?;
        tracing::trace!(op, %key, original = %flags, routed = %routed, "routing write");
        Ok(routed)
    }
}

/// Key handed to the policy for script evaluation: the key when exactly one
/// is given, the null key otherwise.
fn script_key(keys: &[RedisKey]) -> RedisKey {
    match keys {
        [key] => key.clone(),
        _ => RedisKey::null(),
    }
}

fn forward_routed<'a, T: Send + 'a>(
    flags: Result<CommandFlags>,
    call: impl FnOnce(CommandFlags) -> BoxFuture<'a, Result<T>>,
) -> BoxFuture<'a, Result<T>> {
    match flags {
        Ok(flags) => call(flags),
        Err(e) => Box::pin(future::ready(Err(e))),
    }
}

impl Database for ProxyDatabase {
    fn index(&self) -> Option<u32> {
        self.inner.index()
    }

    fn hash_get<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>> {
        forward_routed(self.read_flags("HGET", flags, key), |flags| {
            self.inner.hash_get(key, field, flags)
        })
    }

    fn hash_get_many<'a>(
        &'a self,
        key: &'a RedisKey,
        fields: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<Option<RedisValue>>>> {
        forward_routed(self.read_flags("HMGET", flags, key), |flags| {
            self.inner.hash_get_many(key, fields, flags)
        })
    }

    fn hash_set<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        value: &'a RedisValue,
        when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        forward_routed(self.write_flags("HSET", flags, key), |flags| {
            self.inner.hash_set(key, field, value, when, flags)
        })
    }

    fn hash_set_many<'a>(
        &'a self,
        key: &'a RedisKey,
        entries: &'a [HashEntry],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<()>> {
        forward_routed(self.write_flags("HSET", flags, key), |flags| {
            self.inner.hash_set_many(key, entries, flags)
        })
    }

    fn script_evaluate<'a>(
        &'a self,
        script: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        forward_routed(self.write_flags("EVAL", flags, &script_key(keys)), |flags| {
            self.inner.script_evaluate(script, keys, values, flags)
        })
    }

    fn script_evaluate_sha<'a>(
        &'a self,
        sha1: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        forward_routed(self.write_flags("EVALSHA", flags, &script_key(keys)), |flags| {
            self.inner.script_evaluate_sha(sha1, keys, values, flags)
        })
    }

    delegate_commands! {
        fn hash_get_all<'a>(key: &'a RedisKey, flags: CommandFlags) -> Vec<HashEntry>;
        fn hash_delete<'a>(key: &'a RedisKey, field: &'a RedisValue, flags: CommandFlags) -> bool;
        fn hash_length<'a>(key: &'a RedisKey, flags: CommandFlags) -> u64;
        fn string_get<'a>(key: &'a RedisKey, flags: CommandFlags) -> Option<RedisValue>;
        fn string_set<'a>(
            key: &'a RedisKey,
            value: &'a RedisValue,
            expiry: Option<Duration>,
            when: When,
            flags: CommandFlags
        ) -> bool;
        fn key_delete<'a>(key: &'a RedisKey, flags: CommandFlags) -> bool;
        fn key_exists<'a>(key: &'a RedisKey, flags: CommandFlags) -> bool;
        fn key_expire<'a>(key: &'a RedisKey, expiry: Option<Duration>, flags: CommandFlags) -> bool;
        fn key_ttl<'a>(key: &'a RedisKey, flags: CommandFlags) -> Option<Duration>;
        fn ping<'a>(flags: CommandFlags) -> Duration;
        fn execute<'a>(command: &'a str, args: &'a [Bytes], flags: CommandFlags) -> RedisResult;
    }
}

/// Multiplexer decorator whose databases route through a [`RoutingPolicy`].
pub struct ProxyMultiplexer {
    inner: Arc<dyn Multiplexer>,
    policy: Arc<dyn RoutingPolicy>,
}

impl ProxyMultiplexer {
    pub fn new(inner: Arc<dyn Multiplexer>, policy: Arc<dyn RoutingPolicy>) -> Self {
        Self { inner, policy }
    }
}

impl Multiplexer for ProxyMultiplexer {
    fn database(&self, db: Option<u32>) -> Arc<dyn Database> {
        Arc::new(ProxyDatabase::new(self.inner.database(db), self.policy.clone()))
    }

    fn is_routing_proxy(&self) -> bool {
        true
    }

    delegate_members! {
        fn client_name() -> String;
        fn configuration() -> String;
        fn timeout() -> Duration;
        fn operation_count() -> u64;
        fn is_connected() -> bool;
        fn is_connecting() -> bool;
        fn servers() -> Vec<ServerInfo>;
        fn status() -> String;
        fn add_event_handler(handler: EventHandler) -> HandlerId;
        fn remove_event_handler(id: HandlerId) -> bool;
        fn close() -> BoxFuture<'_, Result<()>>;
    }
}
