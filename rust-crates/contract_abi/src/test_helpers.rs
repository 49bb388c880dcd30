use alloy::{
    primitives::{
        Address,
        FixedBytes,
        Log,
        U256,
    },
    sol_types::SolEvent,
};

use crate::game_types::{
    Bet,
    BetPlaced,
};

/// Builds the raw log the game contract emits when a bet is accepted.
pub fn bet_placed_log(
    game: Address,
    bet_id: u64,
    user: Address,
    guess: &str,
    amount: U256,
    block_number: u64,
) -> Log {
    let event = BetPlaced {
        betId: U256::from(bet_id),
        user,
        guess: guess.to_string(),
        amount,
        blockNumber: U256::from(block_number),
    };
    Log {
        address: game,
        data: event.encode_log_data(),
    }
}

/// A resolved bet snapshot as `getBet` would return it.
pub fn resolved_bet(
    user: Address,
    guess: &str,
    amount: U256,
    block_number: u64,
    won: bool,
    reward: U256,
) -> Bet {
    Bet {
        user,
        guess: guess.to_string(),
        amount,
        targetByte: FixedBytes([guess.as_bytes().first().copied().unwrap_or(b'0')]),
        won,
        reward,
        blockNumber: U256::from(block_number),
        resolved: true,
    }
}
