use crate::error::Result;
use crate::flags::CommandFlags;
use crate::types::RedisKey;

/// Chooses the routing flags used for proxied reads and writes.
///
/// Both entry points receive the flags the caller passed and the key the
/// operation addresses (the null key when there is no single key), and return
/// a replacement directive made of routing flags only. An empty return means
/// "no preference". Returning any non-routing flag makes the proxied call fail
/// with [`crate::Error::InvalidRoutingDirective`].
pub trait RoutingPolicy: Send + Sync {
    fn route_for_read(&self, flags: CommandFlags, key: &RedisKey) -> CommandFlags;

    fn route_for_write(&self, flags: CommandFlags, key: &RedisKey) -> CommandFlags;
}

/// Policy that expresses no preference for either kind of operation.
///
/// The empty directive replaces whatever routing bits the caller passed, so a
/// proxied call under this policy runs with the client's default routing.
/// Non-routing flags are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRoutingPolicy;

impl RoutingPolicy for NoOpRoutingPolicy {
    fn route_for_read(&self, _flags: CommandFlags, _key: &RedisKey) -> CommandFlags {
        CommandFlags::NONE
    }

    fn route_for_write(&self, _flags: CommandFlags, _key: &RedisKey) -> CommandFlags {
        CommandFlags::NONE
    }
}

/// Policy returning the same directive for every read and every write.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoutingPolicy {
    read: CommandFlags,
    write: CommandFlags,
}

impl FixedRoutingPolicy {
    pub fn new(read: CommandFlags, write: CommandFlags) -> Result<Self> {
        Ok(Self {
            read: read.assert_routing_only()?,
            write: write.assert_routing_only()?,
        })
    }

    pub fn read(&self) -> CommandFlags {
        self.read
    }

    pub fn write(&self) -> CommandFlags {
        self.write
    }
}

impl RoutingPolicy for FixedRoutingPolicy {
    fn route_for_read(&self, _flags: CommandFlags, _key: &RedisKey) -> CommandFlags {
        self.read
    }

    fn route_for_write(&self, _flags: CommandFlags, _key: &RedisKey) -> CommandFlags {
        self.write
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn no_op_returns_empty_directives() {
        let policy = NoOpRoutingPolicy;
        let flags = CommandFlags::FIRE_AND_FORGET | CommandFlags::DEMAND_PRIMARY;
        assert!(policy.route_for_read(flags, &RedisKey::from("k")).is_empty());
        assert!(policy.route_for_write(flags, &RedisKey::null()).is_empty());
    }

    #[test]
    fn fixed_policy_validates_directives() {
        let policy =
            FixedRoutingPolicy::new(CommandFlags::PREFER_REPLICA, CommandFlags::DEMAND_PRIMARY)
                .unwrap();
        assert_eq!(
            policy.route_for_read(CommandFlags::NONE, &RedisKey::null()),
            CommandFlags::PREFER_REPLICA
        );
        assert_eq!(
            policy.route_for_write(CommandFlags::NONE, &RedisKey::null()),
            CommandFlags::DEMAND_PRIMARY
        );

        assert!(matches!(
            FixedRoutingPolicy::new(CommandFlags::NONE, CommandFlags::FIRE_AND_FORGET),
            Err(Error::InvalidRoutingDirective { .. })
        ));
    }
}
