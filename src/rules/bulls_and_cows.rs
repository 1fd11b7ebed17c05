//! The bulls and cows rules engine.
//!
//! Both partners commit a secret 4-digit number, then take turns guessing
//! the other's. A guess is scored with *bulls* (right digit, right position)
//! and *cows* (right digit, wrong position); 4 bulls win the play.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rules::{RulesError, Seat};

/// Number of digits in a secret and in every guess
pub const SECRET_LENGTH: usize = 4;

/// Phase of a bulls and cows play
#[derive(Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BullsAndCowsPhase {
    /// At least one partner still has to commit their secret
    WaitingSecrets,
    /// Both secrets are in, guessing is going on
    Playing,
    /// Somebody scored 4 bulls
    Completed,
}

/// One scored guess
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
pub struct Guess {
    /// The player who made the guess
    pub player_id: Uuid,
    /// The guessed digits
    pub guess: String,
    /// Digits that match in value and position
    pub bulls: u8,
    /// Digits that match in value only
    pub cows: u8,
    /// When the guess was made
    pub timestamp: DateTime<Utc>,
}

/// The state document of one bulls and cows play.
///
/// Serialized field names are part of the client API, don't rename them.
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
pub struct BullsAndCowsState {
    /// Phase of the play
    pub status: BullsAndCowsPhase,
    /// The secret committed by partner one
    pub partner1_secret: Option<String>,
    /// The secret committed by partner two
    pub partner2_secret: Option<String>,
    /// The player whose guess is expected next
    pub current_turn: Option<Uuid>,
    /// Every scored guess, in order
    #[serde(default)]
    pub guesses: Vec<Guess>,
    /// Set once somebody scored 4 bulls
    pub winner_id: Option<Uuid>,
}

impl BullsAndCowsState {
    /// A fresh document: no secrets, no turn, no guesses
    pub fn new() -> Self {
        Self {
            status: BullsAndCowsPhase::WaitingSecrets,
            partner1_secret: None,
            partner2_secret: None,
            current_turn: None,
            guesses: Vec::new(),
            winner_id: None,
        }
    }

    /// Commit `secret` for the player in `seat`.
    ///
    /// A secret is one-shot: once committed it can't be replaced, so nobody
    /// can change theirs after seeing how the game goes. The second
    /// committed secret starts the play as a side effect: phase moves to
    /// [BullsAndCowsPhase::Playing] and the first turn goes to
    /// `partner_one`.
    pub fn set_secret(
        &mut self,
        seat: Seat,
        secret: &str,
        partner_one: Uuid,
    ) -> Result<(), RulesError> {
        validate_digits(secret)?;

        if self.status != BullsAndCowsPhase::WaitingSecrets {
            return Err(RulesError::WrongPhase);
        }

        let slot = match seat {
            Seat::PartnerOne => &mut self.partner1_secret,
            Seat::PartnerTwo => &mut self.partner2_secret,
        };
        if slot.is_some() {
            return Err(RulesError::SecretAlreadySet);
        }
        *slot = Some(secret.to_string());

        if self.partner1_secret.is_some() && self.partner2_secret.is_some() {
            self.status = BullsAndCowsPhase::Playing;
            self.current_turn = Some(partner_one);
            self.guesses = Vec::new();
        }

        Ok(())
    }

    /// Score `guess` for `player` sitting in `seat` against the opponent's
    /// secret and append it to the guess list.
    ///
    /// 4 bulls complete the play and record the winner, anything else hands
    /// the turn to `opponent`. Returns the awarded (bulls, cows).
    pub fn make_guess(
        &mut self,
        seat: Seat,
        player: Uuid,
        opponent: Uuid,
        guess: &str,
        now: DateTime<Utc>,
    ) -> Result<(u8, u8), RulesError> {
        validate_digits(guess)?;

        if self.status != BullsAndCowsPhase::Playing {
            return Err(RulesError::WrongPhase);
        }
        if self.current_turn != Some(player) {
            return Err(RulesError::NotYourTurn);
        }

        let secret = match seat {
            Seat::PartnerOne => self.partner2_secret.as_deref(),
            Seat::PartnerTwo => self.partner1_secret.as_deref(),
        }
        .ok_or(RulesError::OpponentSecretMissing)?;

        let (bulls, cows) = score(secret, guess);

        self.guesses.push(Guess {
            player_id: player,
            guess: guess.to_string(),
            bulls,
            cows,
            timestamp: now,
        });

        if bulls as usize == SECRET_LENGTH {
            self.status = BullsAndCowsPhase::Completed;
            self.winner_id = Some(player);
        } else {
            self.current_turn = Some(opponent);
        }

        Ok((bulls, cows))
    }

    /// Whether the play has reached its terminal phase
    pub fn is_completed(&self) -> bool {
        self.status == BullsAndCowsPhase::Completed
    }

    /// The document as served to the player in `seat`.
    ///
    /// The opponent's secret is stripped while the play is running; the
    /// caller's own secret stays visible. Once completed, both are served.
    pub fn redacted_for(&self, seat: Seat) -> Self {
        let mut doc = self.clone();
        if doc.status != BullsAndCowsPhase::Completed {
            match seat {
                Seat::PartnerOne => doc.partner2_secret = None,
                Seat::PartnerTwo => doc.partner1_secret = None,
            }
        }
        doc
    }
}

impl Default for BullsAndCowsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the digit rules shared by secrets and guesses: exactly 4 digits,
/// no leading zero, no repeated digit.
pub fn validate_digits(value: &str) -> Result<(), RulesError> {
    if value.chars().count() != SECRET_LENGTH {
        return Err(RulesError::InvalidDigits("must be exactly 4 digits"));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(RulesError::InvalidDigits("must contain only digits"));
    }
    if value.starts_with('0') {
        return Err(RulesError::InvalidDigits("must not start with 0"));
    }
    if value.chars().unique().count() != SECRET_LENGTH {
        return Err(RulesError::InvalidDigits("must have unique digits"));
    }
    Ok(())
}

/// Score a guess against a secret.
///
/// Bulls are positional matches. Cows are counted over the multiset
/// intersection of the two non-bull remainders, so a digit that already
/// scored as a bull can't be counted again as a cow.
pub fn score(secret: &str, guess: &str) -> (u8, u8) {
    let pairs = || secret.chars().zip(guess.chars());

    let bulls = pairs().filter(|(s, g)| s == g).count();

    let secret_rest = pairs().filter(|(s, g)| s != g).map(|(s, _)| s).counts();
    let guess_rest = pairs().filter(|(s, g)| s != g).map(|(_, g)| g).counts();
    let cows: usize = guess_rest
        .iter()
        .map(|(digit, count)| count.min(secret_rest.get(digit).unwrap_or(&0)))
        .sum();

    (bulls as u8, cows as u8)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    // Secrets: partner one holds 1234, partner two holds 5678; it is
    // partner one's turn.
    fn running_play(one: Uuid) -> BullsAndCowsState {
        let mut state = BullsAndCowsState::new();
        state.set_secret(Seat::PartnerOne, "1234", one).unwrap();
        state.set_secret(Seat::PartnerTwo, "5678", one).unwrap();
        state
    }

    #[test]
    fn scoring_scenarios() {
        assert_eq!(score("1234", "1243"), (2, 2));
        assert_eq!(score("1234", "5678"), (0, 0));
        assert_eq!(score("1234", "4321"), (0, 4));
        assert_eq!(score("1234", "1234"), (4, 0));
    }

    #[test]
    fn scoring_is_bounded() {
        let secrets = ["1234", "9876", "1023", "4567"];
        for secret in secrets {
            for guess in secrets {
                let (bulls, cows) = score(secret, guess);
                assert!(bulls as usize + cows as usize <= SECRET_LENGTH);
            }
        }
    }

    #[test]
    fn digit_rules_name_the_violation() {
        assert_eq!(
            validate_digits("123"),
            Err(RulesError::InvalidDigits("must be exactly 4 digits"))
        );
        assert_eq!(
            validate_digits("12a4"),
            Err(RulesError::InvalidDigits("must contain only digits"))
        );
        assert_eq!(
            validate_digits("0123"),
            Err(RulesError::InvalidDigits("must not start with 0"))
        );
        assert_eq!(
            validate_digits("1224"),
            Err(RulesError::InvalidDigits("must have unique digits"))
        );
        assert_eq!(validate_digits("1234"), Ok(()));
    }

    #[test]
    fn second_secret_starts_the_play() {
        let one = Uuid::new_v4();
        let mut state = BullsAndCowsState::new();

        state.set_secret(Seat::PartnerTwo, "5678", one).unwrap();
        assert_eq!(state.status, BullsAndCowsPhase::WaitingSecrets);
        assert_eq!(state.current_turn, None);

        state.set_secret(Seat::PartnerOne, "1234", one).unwrap();
        assert_eq!(state.status, BullsAndCowsPhase::Playing);
        assert_eq!(state.current_turn, Some(one));
        assert!(state.guesses.is_empty());
    }

    #[test]
    fn secrets_are_one_shot() {
        let one = Uuid::new_v4();
        let mut state = BullsAndCowsState::new();
        state.set_secret(Seat::PartnerOne, "1234", one).unwrap();

        let before = state.clone();
        assert_eq!(
            state.set_secret(Seat::PartnerOne, "5678", one),
            Err(RulesError::SecretAlreadySet)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn guessing_out_of_turn_changes_nothing() {
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let mut state = running_play(one);

        let before = state.clone();
        assert_eq!(
            state.make_guess(Seat::PartnerTwo, two, one, "1234", Utc::now()),
            Err(RulesError::NotYourTurn)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn turns_alternate() {
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let mut state = running_play(one);

        let (bulls, cows) = state
            .make_guess(Seat::PartnerOne, one, two, "5687", Utc::now())
            .unwrap();
        assert_eq!((bulls, cows), (2, 2));
        assert_eq!(state.current_turn, Some(two));
        assert_eq!(state.guesses.len(), 1);

        state
            .make_guess(Seat::PartnerTwo, two, one, "9876", Utc::now())
            .unwrap();
        assert_eq!(state.current_turn, Some(one));
    }

    #[test]
    fn four_bulls_complete_the_play() {
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let mut state = running_play(one);

        let (bulls, _) = state
            .make_guess(Seat::PartnerOne, one, two, "5678", Utc::now())
            .unwrap();
        assert_eq!(bulls, 4);
        assert!(state.is_completed());
        assert_eq!(state.winner_id, Some(one));

        // Terminal: no further guesses accepted
        assert_eq!(
            state.make_guess(Seat::PartnerTwo, two, one, "1234", Utc::now()),
            Err(RulesError::WrongPhase)
        );
    }

    #[test]
    fn guessing_before_both_secrets_is_rejected() {
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let mut state = BullsAndCowsState::new();
        state.set_secret(Seat::PartnerOne, "1234", one).unwrap();

        assert_eq!(
            state.make_guess(Seat::PartnerOne, one, two, "5678", Utc::now()),
            Err(RulesError::WrongPhase)
        );
    }

    #[test]
    fn redaction_hides_only_the_opponents_secret() {
        let one = Uuid::new_v4();
        let state = running_play(one);

        let for_one = state.redacted_for(Seat::PartnerOne);
        assert_eq!(for_one.partner1_secret.as_deref(), Some("1234"));
        assert_eq!(for_one.partner2_secret, None);

        let for_two = state.redacted_for(Seat::PartnerTwo);
        assert_eq!(for_two.partner1_secret, None);
        assert_eq!(for_two.partner2_secret.as_deref(), Some("5678"));
    }

    #[test]
    fn completed_plays_are_served_unredacted() {
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let mut state = running_play(one);
        state
            .make_guess(Seat::PartnerOne, one, two, "5678", Utc::now())
            .unwrap();

        let for_two = state.redacted_for(Seat::PartnerTwo);
        assert_eq!(for_two.partner1_secret.as_deref(), Some("1234"));
        assert_eq!(for_two.partner2_secret.as_deref(), Some("5678"));
    }

    #[test]
    fn wire_format_keeps_the_original_field_names() {
        let one = Uuid::new_v4();
        let state = {
            let mut state = BullsAndCowsState::new();
            state.set_secret(Seat::PartnerOne, "1234", one).unwrap();
            state
        };

        let value = serde_json::to_value(crate::rules::PlayData::BullsAndCows(state)).unwrap();
        assert_eq!(value["type"], "bulls_and_cows");
        assert_eq!(value["status"], "waiting_secrets");
        assert_eq!(value["partner1_secret"], "1234");
        assert!(value["partner2_secret"].is_null());
        assert!(value["guesses"].as_array().unwrap().is_empty());
    }
}
