//! Command-flag routing for a replicated Redis client.
//!
//! A [`ProxyMultiplexer`] decorates any [`Multiplexer`] so that hash reads,
//! hash writes and script evaluation take their routing flags from a
//! [`RoutingPolicy`]. [`guard`] applies the decoration to a connection
//! factory exactly once, and [`add_redis_cache`] wires it into cache options.
//! [`RespMultiplexer`] is a small RESP client that honours the routing flags.

pub mod blocking;
pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod flags;
pub mod guard;
pub mod policy;
pub mod proxy;
pub mod resp;
pub mod routing;
pub mod stats;
pub mod types;

pub use blocking::BlockingDatabase;
pub use cache::{CacheOptions, add_redis_cache};
pub use client::{RespDatabase, RespMultiplexer};
pub use config::{ConnectionOptions, RedisEndpoint};
pub use connection::{
    ConnectionEvent, Database, EventHandler, EventHub, HandlerId, Multiplexer, ServerInfo,
    ServerRole,
};
pub use error::{Error, Result};
pub use flags::{CommandFlags, NodePreference};
pub use guard::{ConnectionFactory, LazyConnection, connection_factory, guard};
pub use policy::{FixedRoutingPolicy, NoOpRoutingPolicy, RoutingPolicy};
pub use proxy::{ProxyDatabase, ProxyMultiplexer};
pub use types::{HashEntry, RedisKey, RedisResult, RedisValue, When};
