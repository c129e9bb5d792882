//! Node selection for the bundled client.

use crate::error::{Error, Result};
use crate::flags::NodePreference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Primary,
    Replica,
}

/// Where a command goes first, and where it may go if that node's connection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePlan {
    pub route: Route,
    pub fallback: Option<Route>,
}

impl RoutePlan {
    fn only(route: Route) -> Self {
        Self {
            route,
            fallback: None,
        }
    }

    fn with_fallback(route: Route, fallback: Route) -> Self {
        Self {
            route,
            fallback: Some(fallback),
        }
    }
}

/// Decide the target node of a command from its node preference.
///
/// Only replica-safe reads may leave the primary; everything else is pinned
/// to it, and demanding a replica for such a command is an error.
pub fn plan_route(
    cmd_upper: &str,
    preference: NodePreference,
    replica_available: bool,
) -> Result<RoutePlan> {
    if is_always_primary(cmd_upper) || !is_replica_read(cmd_upper) {
        if preference == NodePreference::DemandReplica {
            return Err(Error::ReplicaWriteRejected(cmd_upper.to_string()));
        }
        return Ok(RoutePlan::only(Route::Primary));
    }

    let plan = match preference {
        NodePreference::Any | NodePreference::PreferPrimary if replica_available => {
            RoutePlan::with_fallback(Route::Primary, Route::Replica)
        }
        NodePreference::Any | NodePreference::PreferPrimary | NodePreference::DemandPrimary => {
            RoutePlan::only(Route::Primary)
        }
        NodePreference::PreferReplica if replica_available => {
            RoutePlan::with_fallback(Route::Replica, Route::Primary)
        }
        NodePreference::PreferReplica => RoutePlan::only(Route::Primary),
        NodePreference::DemandReplica if replica_available => RoutePlan::only(Route::Replica),
        NodePreference::DemandReplica => {
            return Err(Error::NoConnectionAvailable(format!(
                "{cmd_upper} (replica demanded, none configured)"
            )));
        }
    };
    Ok(plan)
}

/// Extremely conservative whitelist of commands that are safe to route to a read replica.
///
/// Policy: **default primary, explicit allow-list only**.
pub fn is_replica_read(cmd_upper: &str) -> bool {
    matches!(
        cmd_upper,
        // connection / healthcheck
        "PING" |
        // scan family (cursor-based iterators)
        "SCAN" | "SSCAN" | "HSCAN" | "ZSCAN" |
        // strings
        "GET" | "MGET" | "GETRANGE" | "STRLEN" |
        // hashes
        "HGET" | "HMGET" | "HGETALL" | "HEXISTS" | "HLEN" | "HSTRLEN" | "HKEYS" | "HVALS" |
        // lists
        "LINDEX" | "LLEN" | "LRANGE" |
        // sets
        "SCARD" | "SISMEMBER" | "SMISMEMBER" | "SMEMBERS" | "SRANDMEMBER" |
        // sorted sets
        "ZCARD" | "ZCOUNT" | "ZRANGE" | "ZRANGEBYSCORE" | "ZREVRANGE" | "ZREVRANGEBYSCORE" |
        "ZRANK" | "ZREVRANK" | "ZSCORE" | "ZMSCORE" |
        // generic
        "EXISTS" | "TYPE" | "TTL" | "PTTL"
    )
}

/// Commands that are always routed to the primary regardless of flags.
///
/// This includes scripting and other constructs where reads/writes can be mixed, or where semantics depend on connection state.
pub fn is_always_primary(cmd_upper: &str) -> bool {
    matches!(
        cmd_upper,
        "MULTI"
            | "EXEC"
            | "DISCARD"
            | "WATCH"
            | "UNWATCH"
            | "EVAL"
            | "EVALSHA"
            | "EVAL_RO"
            | "SCRIPT"
            | "FUNCTION"
            | "FCALL"
            | "FCALL_RO"
            | "MONITOR"
            | "SUBSCRIBE"
            | "PSUBSCRIBE"
            | "SSUBSCRIBE"
            | "PUNSUBSCRIBE"
            | "UNSUBSCRIBE"
            | "SUNSUBSCRIBE"
    )
}
