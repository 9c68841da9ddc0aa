//! Identifier newtypes.
//!
//! All entity identifiers are UUIDs behind distinct newtypes so a holding id
//! can never be passed where a pack id is expected. `ExternalRef` wraps the
//! payment provider's session/intent identifier and is the natural
//! idempotency key for settlement.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// A platform user.
    UserId
);
uuid_id!(
    /// A purchasable pack.
    PackId
);
uuid_id!(
    /// A card in a game catalog.
    CardId
);
uuid_id!(
    /// An item in a user's inventory.
    HoldingId
);
uuid_id!(
    /// A recorded pack-opening event.
    OpeningId
);

/// The payment provider's unique reference for a settled purchase
/// (e.g. a checkout session or payment intent id).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported card games. Each game has its own catalog adapter and card
/// metadata schema; the set is fixed at compile time rather than dispatched
/// on runtime strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameCode {
    Mtg,
    Pokemon,
}

impl GameCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mtg => "mtg",
            Self::Pokemon => "pokemon",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "mtg" => Some(Self::Mtg),
            "pokemon" => Some(Self::Pokemon),
            _ => None,
        }
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
