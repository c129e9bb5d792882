//! Synchronous variants of the [`Database`] surface.
//!
//! `BlockingDatabase` drives the async call to completion on a tokio runtime
//! handle, so it must be used from outside the runtime's worker threads.
//! Wrapping a [`crate::ProxyDatabase`] keeps its routing: the policy runs once,
//! inside the proxy.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::connection::Database;
use crate::error::Result;
use crate::flags::CommandFlags;
use crate::types::{HashEntry, RedisKey, RedisResult, RedisValue, When};

macro_rules! block_on_each {
    ($( fn $name:ident($($arg:ident : $ty:ty),*) -> $ret:ty; )*) => {
        $(
            pub fn $name(&self $(, $arg: $ty)*) -> Result<$ret> {
                self.handle.block_on(self.inner.$name($($arg),*))
            }
        )*
    };
}

pub struct BlockingDatabase {
    inner: Arc<dyn Database>,
    handle: Handle,
}

impl BlockingDatabase {
    pub fn new(inner: Arc<dyn Database>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    pub fn index(&self) -> Option<u32> {
        self.inner.index()
    }

    block_on_each! {
        fn hash_get(key: &RedisKey, field: &RedisValue, flags: CommandFlags) -> Option<RedisValue>;
        fn hash_get_many(key: &RedisKey, fields: &[RedisValue], flags: CommandFlags) -> Vec<Option<RedisValue>>;
        fn hash_set(
            key: &RedisKey,
            field: &RedisValue,
            value: &RedisValue,
            when: When,
            flags: CommandFlags
        ) -> bool;
        fn hash_set_many(key: &RedisKey, entries: &[HashEntry], flags: CommandFlags) -> ();
        fn script_evaluate(
            script: &str,
            keys: &[RedisKey],
            values: &[RedisValue],
            flags: CommandFlags
        ) -> RedisResult;
        fn script_evaluate_sha(
            sha1: &str,
            keys: &[RedisKey],
            values: &[RedisValue],
            flags: CommandFlags
        ) -> RedisResult;
        fn hash_get_all(key: &RedisKey, flags: CommandFlags) -> Vec<HashEntry>;
        fn hash_delete(key: &RedisKey, field: &RedisValue, flags: CommandFlags) -> bool;
        fn hash_length(key: &RedisKey, flags: CommandFlags) -> u64;
        fn string_get(key: &RedisKey, flags: CommandFlags) -> Option<RedisValue>;
        fn string_set(
            key: &RedisKey,
            value: &RedisValue,
            expiry: Option<Duration>,
            when: When,
            flags: CommandFlags
        ) -> bool;
        fn key_delete(key: &RedisKey, flags: CommandFlags) -> bool;
        fn key_exists(key: &RedisKey, flags: CommandFlags) -> bool;
        fn key_expire(key: &RedisKey, expiry: Option<Duration>, flags: CommandFlags) -> bool;
        fn key_ttl(key: &RedisKey, flags: CommandFlags) -> Option<Duration>;
        fn ping(flags: CommandFlags) -> Duration;
        fn execute(command: &str, args: &[Bytes], flags: CommandFlags) -> RedisResult;
    }
}
