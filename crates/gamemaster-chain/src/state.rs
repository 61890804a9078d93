/// Phase of a game contract as reported by `getGameState()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Players are committing hashed moves
    Commit,
    /// Players are revealing their moves
    Reveal,
    /// Winnings are being paid out
    Payout,
    /// Any value the operator does not know how to drive
    Unknown(u64),
}

pub const GAME_COMMIT_STATE: u64 = 0;
pub const GAME_REVEAL_STATE: u64 = 1;
pub const GAME_PAYOUT_STATE: u64 = 2;

impl GameState {
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            GAME_COMMIT_STATE => GameState::Commit,
            GAME_REVEAL_STATE => GameState::Reveal,
            GAME_PAYOUT_STATE => GameState::Payout,
            other => GameState::Unknown(other),
        }
    }

    /// Decode an ABI-encoded uint256 return value.
    /// Values that do not fit in 64 bits saturate to `Unknown(u64::MAX)`.
    pub fn from_word(word: &[u8; 32]) -> Self {
        if word[..24].iter().any(|b| *b != 0) {
            return GameState::Unknown(u64::MAX);
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&word[24..]);
        Self::from_raw(u64::from_be_bytes(low))
    }

    pub fn raw(&self) -> u64 {
        match self {
            GameState::Commit => GAME_COMMIT_STATE,
            GameState::Reveal => GAME_REVEAL_STATE,
            GameState::Payout => GAME_PAYOUT_STATE,
            GameState::Unknown(raw) => *raw,
        }
    }

    /// Forcing action that moves the game out of this state
    pub fn next_transition(&self) -> Option<Transition> {
        match self {
            GameState::Commit => Some(Transition::ForceReveal),
            GameState::Reveal => Some(Transition::ForcePayout),
            GameState::Payout => Some(Transition::Reset),
            GameState::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameState::Commit => write!(f, "commit"),
            GameState::Reveal => write!(f, "reveal"),
            GameState::Payout => write!(f, "payout"),
            GameState::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// State-forcing call on the game contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    ForceReveal,
    ForcePayout,
    Reset,
}

/// Selector of `getGameState()`
pub const GET_GAME_STATE_SELECTOR: [u8; 4] = [0xb7, 0xd0, 0x62, 0x8b];

impl Transition {
    /// Contract method invoked for this transition
    pub fn method(&self) -> &'static str {
        match self {
            Transition::ForceReveal => "forceToRevealState()",
            Transition::ForcePayout => "forceToPayoutState()",
            Transition::Reset => "resetGame()",
        }
    }

    /// First four bytes of keccak256(method)
    pub fn selector(&self) -> [u8; 4] {
        match self {
            Transition::ForceReveal => [0x86, 0xb2, 0xb9, 0x86],
            Transition::ForcePayout => [0x76, 0x07, 0x04, 0xc1],
            Transition::Reset => [0xbb, 0x47, 0x22, 0x19],
        }
    }

    /// State the game is expected to be in after this transition lands
    pub fn target(&self) -> GameState {
        match self {
            Transition::ForceReveal => GameState::Reveal,
            Transition::ForcePayout => GameState::Payout,
            Transition::Reset => GameState::Commit,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::ForceReveal => write!(f, "force game into reveal"),
            Transition::ForcePayout => write!(f, "force game into payout"),
            Transition::Reset => write!(f, "reset game"),
        }
    }
}

/// Receipt of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: String,
}
