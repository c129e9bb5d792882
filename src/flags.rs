//! Per-command behaviour flags and the algebra used to swap their routing part.
//!
//! Flags fall in two disjoint classes. Routing flags pick the node a command
//! is sent to (at most one of them is set in a well-formed value). Every other
//! bit, including bits this crate does not know about, is a non-routing flag
//! and is never touched when routing is replaced.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandFlags(u32);

impl CommandFlags {
    pub const NONE: Self = Self(0);
    /// Send the command and do not wait for the reply.
    pub const FIRE_AND_FORGET: Self = Self(1 << 0);
    pub const PREFER_PRIMARY: Self = Self(1 << 1);
    pub const DEMAND_PRIMARY: Self = Self(1 << 2);
    pub const PREFER_REPLICA: Self = Self(1 << 3);
    pub const DEMAND_REPLICA: Self = Self(1 << 4);
    pub const NO_REDIRECT: Self = Self(1 << 5);
    pub const NO_SCRIPT_CACHE: Self = Self(1 << 6);

    /// Every bit that describes primary/replica selection.
    pub const ROUTING: Self = Self(
        Self::PREFER_PRIMARY.0 | Self::DEMAND_PRIMARY.0 | Self::PREFER_REPLICA.0 | Self::DEMAND_REPLICA.0,
    );

    const NAMED: [(Self, &'static str); 7] = [
        (Self::FIRE_AND_FORGET, "FIRE_AND_FORGET"),
        (Self::PREFER_PRIMARY, "PREFER_PRIMARY"),
        (Self::DEMAND_PRIMARY, "DEMAND_PRIMARY"),
        (Self::PREFER_REPLICA, "PREFER_REPLICA"),
        (Self::DEMAND_REPLICA, "DEMAND_REPLICA"),
        (Self::NO_REDIRECT, "NO_REDIRECT"),
        (Self::NO_SCRIPT_CACHE, "NO_SCRIPT_CACHE"),
    ];

    /// Build a value from raw bits, keeping bits that have no name.
    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Only the routing bits of `self`.
    pub const fn routing_flags(self) -> Self {
        Self(self.0 & Self::ROUTING.0)
    }

    /// Clear every routing bit, leaving all other bits untouched.
    pub const fn without_routing_flags(self) -> Self {
        Self(self.0 & !Self::ROUTING.0)
    }

    /// Replace the routing part of `self` with `replacement`.
    ///
    /// `replacement` must consist of routing flags only (it may be empty, which
    /// means "no preference"); anything else is a policy bug and is reported as
    /// [`Error::InvalidRoutingDirective`].
    pub fn with_replacement_routing_flags(self, replacement: Self) -> Result<Self> {
        Ok(self.without_routing_flags() | replacement.assert_routing_only()?)
    }

    /// Return `self` if it carries nothing but routing flags.
    pub fn assert_routing_only(self) -> Result<Self> {
        let offending = self.without_routing_flags();
        if !offending.is_empty() {
            return Err(Error::InvalidRoutingDirective {
                directive: self,
                offending,
            });
        }
        Ok(self)
    }

    /// Collapse the routing bits into a single node preference.
    ///
    /// Ill-formed values carrying several routing bits resolve with demand
    /// before prefer and primary before replica.
    pub fn node_preference(self) -> NodePreference {
        if self.contains(Self::DEMAND_PRIMARY) {
            NodePreference::DemandPrimary
        } else if self.contains(Self::DEMAND_REPLICA) {
            NodePreference::DemandReplica
        } else if self.contains(Self::PREFER_PRIMARY) {
            NodePreference::PreferPrimary
        } else if self.contains(Self::PREFER_REPLICA) {
            NodePreference::PreferReplica
        } else {
            NodePreference::Any
        }
    }
}

/// Node selection requested by the routing bits of a [`CommandFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePreference {
    /// No routing flag set; the client default (primary, replica as fallback for reads).
    Any,
    PreferPrimary,
    DemandPrimary,
    PreferReplica,
    DemandReplica,
}

impl NodePreference {
    pub fn as_flags(self) -> CommandFlags {
        match self {
            NodePreference::Any => CommandFlags::NONE,
            NodePreference::PreferPrimary => CommandFlags::PREFER_PRIMARY,
            NodePreference::DemandPrimary => CommandFlags::DEMAND_PRIMARY,
            NodePreference::PreferReplica => CommandFlags::PREFER_REPLICA,
            NodePreference::DemandReplica => CommandFlags::DEMAND_REPLICA,
        }
    }
}

impl BitOr for CommandFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CommandFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CommandFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for CommandFlags {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for CommandFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }

        let mut rest = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }

        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFlags({self})")
    }
}
