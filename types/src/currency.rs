//! Fixed-point currency.
//!
//! Rips are the platform's spendable balance. 1 Rip converts at a fixed
//! $1.00 rate, and all arithmetic is done in minor units (cents) to avoid
//! float drift in balances. Card market values are also quoted in cents, so
//! sellback pricing is a straight integer computation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units per whole Rip.
pub const CENTS_PER_RIP: u64 = 100;

/// An amount of Rips, stored in minor units (cents).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rips(u64);

impl Rips {
    pub const ZERO: Rips = Rips(0);

    /// Construct from minor units (cents).
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Construct from whole Rips. Saturates at the representable maximum.
    pub const fn from_whole(rips: u64) -> Self {
        Self(rips.saturating_mul(CENTS_PER_RIP))
    }

    pub const fn cents(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Rips) -> Option<Rips> {
        self.0.checked_add(other.0).map(Rips)
    }

    pub fn checked_sub(self, other: Rips) -> Option<Rips> {
        self.0.checked_sub(other.0).map(Rips)
    }
}

impl fmt::Display for Rips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / CENTS_PER_RIP, self.0 % CENTS_PER_RIP)
    }
}
