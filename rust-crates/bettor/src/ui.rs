use alloy::primitives::{
    TxHash,
    U256,
};
use base_bettor::{
    activity_log::{
        LogEntry,
        LogKind,
    },
    amount::format_token_amount,
    orchestrator::RunSummary,
};
use deployments::NetworkDeployment;

pub const RULES: &str = "\
How to play
  1. Connect your wallet; the client switches it to Base.
  2. Claim free tokens once if your balance is empty.
  3. Pick a guess from 0-9 or a-f, or let the client pick at random.
  4. Each bet is settled against the block mined 4 blocks after it.
  5. If your guess equals the last hex character of that block's hash,
     the game pays 12x your bet.
  The game contract decides every result; the client only reports it.";

/// Shortens a hex string to `0x1234...abcd`.
pub fn shorten(hex: &str) -> String {
    if hex.len() <= 12 {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..6], &hex[hex.len() - 4..])
}

/// Renders activity log entries as terminal lines with explorer links.
pub struct LogRenderer<'a> {
    deployment: &'a NetworkDeployment,
}

impl<'a> LogRenderer<'a> {
    pub fn new(deployment: &'a NetworkDeployment) -> Self {
        Self { deployment }
    }

    fn tx_link(&self, tx_hash: &TxHash) -> String {
        let hash = tx_hash.to_string();
        format!("{} ({})", shorten(&hash), self.deployment.explorer_tx_url(&hash))
    }

    fn tokens(&self, amount: U256) -> String {
        format!(
            "{} {}",
            format_token_amount(amount, self.deployment.token_decimals),
            self.deployment.token_ticker
        )
    }

    pub fn render(&self, entry: &LogEntry) -> String {
        let time = entry.at.format("%H:%M:%S");
        let body = match &entry.kind {
            LogKind::PlainMessage { message } => message.clone(),
            LogKind::TransactionIssued { message, tx_hash } => {
                format!("{message} tx: {}", self.tx_link(tx_hash))
            }
            LogKind::BetPlaced {
                bet_id,
                block_number,
            } => format!(
                "Bet placed. Bet ID: {bet_id}, Block: {block_number} ({})",
                self.deployment.explorer_block_url(block_number)
            ),
            LogKind::BlockInfo {
                block_number,
                block_hash,
                target_byte,
            } => format!(
                "Block: {block_number} Hash: {}, Target Byte: {target_byte}",
                shorten(&block_hash.to_string())
            ),
            LogKind::Result {
                bet_id,
                won: true,
                reward,
                tx_hash,
            } => {
                let mut line = format!("WOW! YOUR WIN!!! Bet {bet_id}.");
                if let (Some(reward), Some(tx_hash)) = (reward, tx_hash) {
                    line.push_str(&format!(
                        "\n  Send {} tx: {}",
                        self.tokens(*reward),
                        self.tx_link(tx_hash)
                    ));
                }
                line
            }
            LogKind::Result { bet_id, .. } => format!("Lost bet {bet_id}."),
        };
        format!("[{time}] {body}")
    }
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "Played {} of {} bets: {} won, {} lost",
        summary.iterations, summary.requested, summary.won, summary.lost
    );
    if summary.failed > 0 {
        line.push_str(&format!(", {} failed", summary.failed));
    }
    if summary.unresolved > 0 {
        line.push_str(&format!(", {} unresolved", summary.unresolved));
    }
    if summary.stopped {
        line.push_str(" (stopped)");
    }
    line
}
