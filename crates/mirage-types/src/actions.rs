//! Agent actions and their wire format.
//!
//! Clients submit loosely-typed JSON objects with a `type` discriminator.
//! The enum below is the statically-typed rendition: unrecognized types
//! parse into [`Action::Unknown`] and missing fields take neutral defaults,
//! so malformed payloads never fail at the request boundary. They instead
//! resolve to `ACTION_REJECTED` events inside the tick.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// One action an agent may perform during a tick.
///
/// Exactly one action per agent is resolved per tick; an agent that
/// submits nothing performs [`Action::Rest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Step one tile in a cardinal direction.
    Move {
        /// Horizontal delta; must combine with `dy` to a unit step.
        #[serde(default)]
        dx: i64,
        /// Vertical delta; must combine with `dx` to a unit step.
        #[serde(default)]
        dy: i64,
    },

    /// Extract one resource unit from the tile the agent stands on.
    Gather,

    /// Recover one hit point; silent at full health.
    #[default]
    Rest,

    /// Transfer resources to another agent at the current market price.
    Trade {
        /// The receiving agent.
        target: Option<AgentId>,
        /// Units of resource to transfer; must be positive.
        #[serde(default)]
        amount: i64,
    },

    /// Strike an adjacent agent.
    Attack {
        /// The agent to strike; must be within Manhattan distance 1.
        target: Option<AgentId>,
    },

    /// Catch-all for unrecognized action types.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn move_parses_with_deltas() {
        let action: Action = serde_json::from_str(r#"{"type":"move","dx":1,"dy":0}"#).unwrap();
        assert_eq!(action, Action::Move { dx: 1, dy: 0 });
    }

    #[test]
    fn missing_deltas_default_to_zero() {
        let action: Action = serde_json::from_str(r#"{"type":"move"}"#).unwrap();
        assert_eq!(action, Action::Move { dx: 0, dy: 0 });
    }

    #[test]
    fn trade_without_target_parses_to_none() {
        let action: Action = serde_json::from_str(r#"{"type":"trade","amount":3}"#).unwrap();
        assert_eq!(
            action,
            Action::Trade {
                target: None,
                amount: 3
            }
        );
    }

    #[test]
    fn unrecognized_type_parses_to_unknown() {
        let action: Action = serde_json::from_str(r#"{"type":"teleport"}"#).unwrap();
        assert_eq!(action, Action::Unknown);
    }

    #[test]
    fn round_trip_preserves_tag() {
        let action = Action::Attack {
            target: Some(AgentId::from("victim")),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
        assert!(json.contains(r#""type":"attack""#));
    }

    #[test]
    fn default_action_is_rest() {
        assert_eq!(Action::default(), Action::Rest);
    }
}
