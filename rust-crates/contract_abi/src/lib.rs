use alloy::{
    primitives::{
        Address,
        Log,
    },
    sol,
    sol_types::SolEvent,
};

pub mod game_types {
    use super::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        struct Bet {
            address user;
            string guess;
            uint256 amount;
            bytes1 targetByte;
            bool won;
            uint256 reward;
            uint256 blockNumber;
            bool resolved;
        }

        #[derive(Debug, PartialEq, Eq)]
        event BetPlaced(
            uint256 indexed betId,
            address indexed user,
            string guess,
            uint256 amount,
            uint256 blockNumber
        );

        interface GuessCounterGame {
            function placeBet(string guess, uint256 amount) external returns (uint256);
            function resolveBet(uint256 betId) external;
            function getBet(uint256 betId) external view returns (Bet);
            function betCounter() external view returns (uint256);
        }
    }
}

pub mod token_types {
    use super::sol;

    sol! {
        interface Erc20 {
            function approve(address spender, uint256 amount) external returns (bool);
            function allowance(address owner, address spender) external view returns (uint256);
            function balanceOf(address owner) external view returns (uint256);
        }
    }
}

pub mod claim_types {
    use super::sol;

    sol! {
        interface TokenClaim {
            function claim() external;
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

/// Finds the first `BetPlaced` event emitted by `game` among `logs`.
///
/// Logs from other contracts, or with a different topic, are skipped; a log
/// that carries the right topic but fails to decode is skipped as well.
pub fn find_bet_placed(game: Address, logs: &[Log]) -> Option<game_types::BetPlaced> {
    logs.iter()
        .filter(|log| log.address == game)
        .filter(|log| {
            log.topics().first() == Some(&game_types::BetPlaced::SIGNATURE_HASH)
        })
        .find_map(|log| game_types::BetPlaced::decode_log(log, true).ok())
        .map(|decoded| decoded.data)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::bet_placed_log;
    use alloy::primitives::{
        U256,
        address,
    };

    const GAME: Address = address!("64f82C34e8F0f023952977E3B74fc5370C425c34");
    const USER: Address = address!("00000000000000000000000000000000000000aa");

    #[test]
    fn find_bet_placed__decodes_event_from_game_contract() {
        // given
        let logs = vec![bet_placed_log(GAME, 7, USER, "c", U256::from(100u64), 1_234)];

        // when
        let found = find_bet_placed(GAME, &logs).expect("event should be decoded");

        // then
        assert_eq!(found.betId, U256::from(7u64));
        assert_eq!(found.user, USER);
        assert_eq!(found.guess, "c");
        assert_eq!(found.blockNumber, U256::from(1_234u64));
    }

    #[test]
    fn find_bet_placed__ignores_logs_from_other_contracts() {
        // given
        let other = address!("00000000000000000000000000000000000000bb");
        let logs = vec![bet_placed_log(other, 7, USER, "c", U256::from(1u64), 10)];

        // when
        let found = find_bet_placed(GAME, &logs);

        // then
        assert!(found.is_none());
    }
}
