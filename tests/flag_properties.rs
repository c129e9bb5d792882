use proptest::prelude::*;
use redis_flagroute::{CommandFlags, Error};

fn any_flags() -> impl Strategy<Value = CommandFlags> {
    any::<u32>().prop_map(CommandFlags::from_bits_retain)
}

fn routing_only() -> impl Strategy<Value = CommandFlags> {
    prop_oneof![
        Just(CommandFlags::NONE),
        Just(CommandFlags::PREFER_PRIMARY),
        Just(CommandFlags::DEMAND_PRIMARY),
        Just(CommandFlags::PREFER_REPLICA),
        Just(CommandFlags::DEMAND_REPLICA),
    ]
}

/// Any value with at least one non-routing bit, known or unknown.
fn with_non_routing() -> impl Strategy<Value = CommandFlags> {
    (any::<u32>(), 0u32..32)
        .prop_filter("bit must be non-routing", |(_, bit)| {
            !CommandFlags::ROUTING.contains(CommandFlags::from_bits_retain(1 << bit))
        })
        .prop_map(|(bits, bit)| CommandFlags::from_bits_retain(bits | (1 << bit)))
}

proptest! {
    /// Property: replacement keeps every non-routing bit and exactly the directive's routing bits
    #[test]
    fn replacement_swaps_only_routing_bits(f in any_flags(), r in routing_only()) {
        let merged = f.with_replacement_routing_flags(r).unwrap();
        prop_assert_eq!(merged.without_routing_flags(), f.without_routing_flags());
        prop_assert_eq!(merged.routing_flags(), r);
    }

    /// Property: an empty directive strips routing
    #[test]
    fn empty_directive_strips_routing(f in any_flags()) {
        prop_assert_eq!(
            f.with_replacement_routing_flags(CommandFlags::NONE).unwrap(),
            f.without_routing_flags()
        );
    }

    /// Property: directives carrying non-routing bits are always rejected
    #[test]
    fn non_routing_directive_is_rejected(f in any_flags(), r in with_non_routing()) {
        let err = f.with_replacement_routing_flags(r).unwrap_err();
        match err {
            Error::InvalidRoutingDirective { directive, offending } => {
                prop_assert_eq!(directive, r);
                prop_assert_eq!(offending, r.without_routing_flags());
            }
            other => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// Property: stripping routing is idempotent and never adds bits
    #[test]
    fn without_routing_is_idempotent(f in any_flags()) {
        let stripped = f.without_routing_flags();
        prop_assert_eq!(stripped.without_routing_flags(), stripped);
        prop_assert!(f.contains(stripped));
        prop_assert!(!stripped.intersects(CommandFlags::ROUTING));
    }
}

#[test]
fn documented_examples() {
    let f = CommandFlags::FIRE_AND_FORGET | CommandFlags::NO_SCRIPT_CACHE | CommandFlags::PREFER_PRIMARY;
    assert_eq!(
        f.without_routing_flags(),
        CommandFlags::FIRE_AND_FORGET | CommandFlags::NO_SCRIPT_CACHE
    );

    assert_eq!(
        CommandFlags::FIRE_AND_FORGET
            .with_replacement_routing_flags(CommandFlags::PREFER_REPLICA)
            .unwrap(),
        CommandFlags::FIRE_AND_FORGET | CommandFlags::PREFER_REPLICA
    );

    assert_eq!(
        (CommandFlags::FIRE_AND_FORGET | CommandFlags::DEMAND_PRIMARY)
            .with_replacement_routing_flags(CommandFlags::PREFER_REPLICA)
            .unwrap(),
        CommandFlags::FIRE_AND_FORGET | CommandFlags::PREFER_REPLICA
    );

    assert!(matches!(
        CommandFlags::DEMAND_REPLICA.with_replacement_routing_flags(CommandFlags::FIRE_AND_FORGET),
        Err(Error::InvalidRoutingDirective { .. })
    ));
}
