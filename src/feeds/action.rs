//! Feed actions and the client-grantable subset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An operation on a feed.
///
/// `All` is the wildcard carried by the self-issued server credential and is
/// never granted to an external client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Read items from a feed
    #[serde(rename = "READ")]
    Read,
    /// Publish or delete items
    #[serde(rename = "WRITE")]
    Write,
    /// Every action (server credential only)
    #[serde(rename = "*")]
    All,
}

/// Actions a client may be issued through the authorization endpoint.
pub const CLIENT_GRANTABLE: &[Action] = &[Action::Read];

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::All => "*",
        }
    }

    /// Whether this action may be handed to an external client.
    #[must_use]
    pub fn is_client_grantable(self) -> bool {
        CLIENT_GRANTABLE.contains(&self)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "*" => Ok(Self::All),
            _ => Err(invalid_action()),
        }
    }
}

/// Validate a raw action token against the client-grantable set.
///
/// Plain set membership: anything that is not exactly one of
/// [`CLIENT_GRANTABLE`] is rejected, including internal actions such as
/// `WRITE` and `*`.
pub fn validate_client_action(raw: &str) -> Result<Action> {
    let action: Action = raw.parse()?;
    if action.is_client_grantable() {
        Ok(action)
    } else {
        Err(invalid_action())
    }
}

fn invalid_action() -> Error {
    Error::InvalidAction {
        accepted: CLIENT_GRANTABLE.to_vec(),
    }
}
