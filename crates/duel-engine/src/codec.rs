use core::str::FromStr;

use thiserror::Error;

use crate::types::ActionKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown action tag {0}")]
    UnknownActionTag(u8),
    #[error("unknown action name {0:?}")]
    UnknownActionName(String),
}

/// Encode an action into its wire tag.
/// Pass = 0, Boost = 1, Shield = 2, Double = 3.
pub fn encode_action(action: ActionKind) -> u8 {
    action as u8
}

/// Decode a wire tag. Anything outside [0, 3] is rejected here so the
/// state machine never sees an unknown action.
pub fn decode_action(tag: u8) -> Result<ActionKind, CodecError> {
    match tag {
        0 => Ok(ActionKind::Pass),
        1 => Ok(ActionKind::Boost),
        2 => Ok(ActionKind::Shield),
        3 => Ok(ActionKind::Double),
        other => Err(CodecError::UnknownActionTag(other)),
    }
}

impl FromStr for ActionKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CodecError::UnknownActionName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_discriminants() {
        assert_eq!(encode_action(ActionKind::Pass), 0);
        assert_eq!(encode_action(ActionKind::Double), 3);
        for action in ActionKind::ALL {
            assert_eq!(decode_action(encode_action(action)), Ok(action));
        }
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        assert_eq!(decode_action(4), Err(CodecError::UnknownActionTag(4)));
        assert_eq!(decode_action(255), Err(CodecError::UnknownActionTag(255)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("BOOST".parse::<ActionKind>(), Ok(ActionKind::Boost));
        assert_eq!(" shield ".parse::<ActionKind>(), Ok(ActionKind::Shield));
        assert!("triple".parse::<ActionKind>().is_err());
    }
}
