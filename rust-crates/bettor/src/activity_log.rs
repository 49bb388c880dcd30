use alloy::primitives::{
    B256,
    TxHash,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LogKind {
    PlainMessage {
        message: String,
    },
    TransactionIssued {
        message: String,
        tx_hash: TxHash,
    },
    BetPlaced {
        bet_id: U256,
        block_number: u64,
    },
    BlockInfo {
        block_number: u64,
        block_hash: B256,
        target_byte: char,
    },
    Result {
        bet_id: U256,
        won: bool,
        reward: Option<U256>,
        tx_hash: Option<TxHash>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: LogKind,
}

/// Ordered, append-only record of everything a betting session did.
///
/// Entries are never mutated or removed. Readers either borrow the slice or
/// subscribe to a channel that receives each entry as it is appended.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
    subscribers: Vec<mpsc::UnboundedSender<LogEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LogEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn push(&mut self, kind: LogKind) {
        trace_entry(&kind);
        let entry = LogEntry {
            at: Utc::now(),
            kind,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(entry.clone()).is_ok());
        self.entries.push(entry);
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.push(LogKind::PlainMessage {
            message: message.into(),
        });
    }

    pub fn tx_issued(&mut self, message: impl Into<String>, tx_hash: TxHash) {
        self.push(LogKind::TransactionIssued {
            message: message.into(),
            tx_hash,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn plain_messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match &entry.kind {
            LogKind::PlainMessage { message } => Some(message.as_str()),
            _ => None,
        })
    }
}

fn trace_entry(kind: &LogKind) {
    match kind {
        LogKind::PlainMessage { message } => tracing::info!(%message, "activity"),
        LogKind::TransactionIssued { message, tx_hash } => {
            tracing::info!(%message, %tx_hash, "transaction issued")
        }
        LogKind::BetPlaced {
            bet_id,
            block_number,
        } => tracing::info!(%bet_id, block = block_number, "bet placed"),
        LogKind::BlockInfo {
            block_number,
            block_hash,
            target_byte,
        } => tracing::info!(
            block = block_number,
            %block_hash,
            %target_byte,
            "outcome block"
        ),
        LogKind::Result {
            bet_id,
            won,
            reward,
            tx_hash,
        } => tracing::info!(%bet_id, won, ?reward, ?tx_hash, "bet resolved"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn push__keeps_emission_order() {
        // given
        let mut log = ActivityLog::new();

        // when
        log.message("first");
        log.push(LogKind::BetPlaced {
            bet_id: U256::from(3u64),
            block_number: 10,
        });
        log.message("second");

        // then
        assert_eq!(log.len(), 3);
        assert_eq!(log.plain_messages().collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(matches!(log.entries()[1].kind, LogKind::BetPlaced { .. }));
    }

    #[tokio::test]
    async fn subscribe__receives_entries_appended_after_subscription() {
        // given
        let mut log = ActivityLog::new();
        log.message("before");
        let mut rx = log.subscribe();

        // when
        log.message("after");
        drop(log);

        // then
        let received = rx.recv().await.unwrap();
        assert_eq!(
            received.kind,
            LogKind::PlainMessage {
                message: "after".to_string()
            }
        );
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn push__dropped_subscriber__does_not_stop_logging() {
        // given
        let mut log = ActivityLog::new();
        let rx = log.subscribe();
        drop(rx);

        // when
        log.message("still recorded");

        // then
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn serialize__tags_entries_by_camel_case_type() {
        // given
        let entry = LogEntry {
            at: Utc::now(),
            kind: LogKind::BlockInfo {
                block_number: 12,
                block_hash: B256::ZERO,
                target_byte: '0',
            },
        };

        // when
        let json = serde_json::to_value(&entry).unwrap();

        // then
        assert_eq!(json["type"], "blockInfo");
        assert_eq!(json["blockNumber"], 12);
        assert_eq!(json["targetByte"], "0");
    }
}
