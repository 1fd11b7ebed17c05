//! The per-game rules engines.
//!
//! Every play stores one typed state document, tagged by the game type that
//! owns it. All transitions of a document go through its engine; the rest of
//! the server only moves documents between the database and the engine.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::rules::bulls_and_cows::*;
use crate::models::GameType;

mod bulls_and_cows;

/// The state document stored inside a play.
///
/// One variant per game type; adding a game means adding a variant here and
/// an engine module next to [bulls_and_cows].
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayData {
    /// A bulls and cows session
    BullsAndCows(BullsAndCowsState),
}

impl PlayData {
    /// The initial document for a fresh play of the given game type
    pub fn initial(game_type: GameType) -> Self {
        match game_type {
            GameType::BullsAndCows => PlayData::BullsAndCows(BullsAndCowsState::new()),
        }
    }

    /// The document as served to the player in `seat`, with everything they
    /// are not supposed to see stripped
    pub fn redacted_for(&self, seat: Seat) -> Self {
        match self {
            PlayData::BullsAndCows(state) => PlayData::BullsAndCows(state.redacted_for(seat)),
        }
    }
}

/// A rejected engine action.
///
/// [RulesError::InvalidDigits] means the input itself is malformed and has
/// to be corrected by the user. All other variants are conflicts with the
/// current state of the play: the client should re-read the play and decide
/// again. The engine never partially applies an action, so after any of
/// these the document is untouched.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RulesError {
    /// The submitted secret or guess broke a digit rule; carries which one
    InvalidDigits(&'static str),
    /// The action is not available in the play's current phase
    WrongPhase,
    /// The player tried to replace a secret they already committed
    SecretAlreadySet,
    /// A guess from the player whose turn it isn't
    NotYourTurn,
    /// The opponent's secret is missing although the play claims to be
    /// running. Should be unreachable, checked anyway.
    OpponentSecretMissing,
}

impl Display for RulesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesError::InvalidDigits(rule) => write!(f, "Invalid input: {rule}"),
            RulesError::WrongPhase => write!(f, "This action is not available right now"),
            RulesError::SecretAlreadySet => write!(f, "You have already set your secret"),
            RulesError::NotYourTurn => write!(f, "It's not your turn"),
            RulesError::OpponentSecretMissing => {
                write!(f, "Your partner has not set their secret yet")
            }
        }
    }
}

/// Which side of a play a user occupies
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Seat {
    /// The play's `partner_one`, i.e. the original requester
    PartnerOne,
    /// The play's `partner_two`, i.e. the accepter
    PartnerTwo,
}

impl Seat {
    /// The seat of the other player
    pub fn other(self) -> Self {
        match self {
            Seat::PartnerOne => Seat::PartnerTwo,
            Seat::PartnerTwo => Seat::PartnerOne,
        }
    }
}
