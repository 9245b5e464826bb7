//! Line-oriented console session.
//!
//! Reads commands, drives the engine and writes replies. Outcome notices
//! (success, refund, validation warnings) are published by the engine and
//! printed by the notifier, so failed engine calls produce no reply here.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use tokendex_domain::{Item, ItemId};
use tokendex_engine::{BulkSelection, Engine, GenerationGateway, GenerationReceipt};
use tokendex_store::RecordStore;

use crate::command::{Command, HELP};
use crate::error::{DaemonError, DaemonResult};

/// Characters of an ID shown in listings
const SHORT_ID_LEN: usize = 8;

pub struct Console<S: RecordStore, G: GenerationGateway> {
    engine: Arc<Engine<S, G>>,
    selection: BulkSelection,
}

impl<S: RecordStore, G: GenerationGateway> Console<S, G> {
    pub fn new(engine: Arc<Engine<S, G>>) -> Self {
        Self {
            engine,
            selection: BulkSelection::new(),
        }
    }

    pub fn selection(&self) -> &BulkSelection {
        &self.selection
    }

    /// Process input lines until `quit` or end of input.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> DaemonResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let command = match Command::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    write_lines(&mut writer, &[format!("error: {}", e)]).await?;
                    continue;
                },
            };

            match self.execute(command).await {
                Ok(reply) => write_lines(&mut writer, &reply).await?,
                Err(DaemonError::Engine(e)) => debug!(error = %e, "Command failed"),
                Err(e) => write_lines(&mut writer, &[format!("error: {}", e)]).await?,
            }
        }

        Ok(())
    }

    /// Execute one command and return the reply lines.
    pub async fn execute(&mut self, command: Command) -> DaemonResult<Vec<String>> {
        let engine = Arc::clone(&self.engine);

        let reply = match command {
            Command::Balance => vec![balance_line(engine.balance())],
            Command::List => {
                let items = engine.items();
                if items.is_empty() {
                    vec!["Your collection is empty. Generate some items!".to_string()]
                } else {
                    items.iter().enumerate().map(|(i, item)| item_line(i + 1, item)).collect()
                }
            },
            Command::Generate => receipt_lines(&engine.generate_one().await?),
            Command::Batch => receipt_lines(&engine.generate_batch().await?),
            Command::Quote(refs) => {
                let ids = self.resolve(&refs)?;
                let quote = engine.quote_sale(&ids)?;
                let mut lines: Vec<String> =
                    quote.items.iter().enumerate().map(|(i, item)| item_line(i + 1, item)).collect();
                lines.push(format!(
                    "Selling {} would pay {} tokens ({}). Use 'sell' to confirm.",
                    count_label(quote.items.len()),
                    quote.total_value,
                    quote.state()
                ));
                lines
            },
            Command::Sell(refs) => {
                let ids = self.resolve(&refs)?;
                let receipt = engine.sell(&ids).await?;
                vec![balance_line(receipt.balance)]
            },
            Command::Select(refs) => {
                for id in self.resolve(&refs)? {
                    self.selection.toggle(id);
                }
                vec![self.selection_line()]
            },
            Command::SelectAll => {
                self.selection.select_all(engine.items().into_iter().map(|item| item.id));
                vec![self.selection_line()]
            },
            Command::Clear => {
                self.selection.clear();
                vec!["Selection cleared.".to_string()]
            },
            Command::Selected => {
                let mut lines: Vec<String> = self
                    .selection
                    .resolve(engine.inventory())
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item_line(i + 1, item))
                    .collect();
                lines.push(self.selection_line());
                lines
            },
            Command::SellSelected => {
                let receipt = engine.sell_selection(&mut self.selection).await?;
                vec![balance_line(receipt.balance)]
            },
            Command::Undo => {
                let receipt = engine.undo_sale().await?;
                vec![balance_line(receipt.balance)]
            },
            Command::Status => {
                let snapshot = engine.snapshot();
                let value: u64 = snapshot.items.iter().map(|item| item.price).sum();
                let mut lines = vec![
                    balance_line(snapshot.balance),
                    format!("Collection: {} worth {} tokens", count_label(snapshot.items.len()), value),
                ];
                if let Some(undo) = snapshot.undo {
                    lines.push(format!(
                        "Sold {}. Undo ({}s)",
                        count_label(undo.item_count),
                        undo.remaining_secs
                    ));
                }
                if !self.selection.is_empty() {
                    lines.push(self.selection_line());
                }
                lines
            },
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Quit => Vec::new(),
        };

        Ok(reply)
    }

    /// Map list numbers and ID fragments to item IDs.
    fn resolve(&self, refs: &[String]) -> DaemonResult<Vec<ItemId>> {
        let items = self.engine.items();

        refs.iter()
            .map(|reference| {
                if let Ok(position) = reference.parse::<usize>() {
                    if let Some(item) = position.checked_sub(1).and_then(|i| items.get(i)) {
                        return Ok(item.id.clone());
                    }
                }

                let matches: Vec<&Item> = items
                    .iter()
                    .filter(|item| {
                        let id = item.id.as_str();
                        id.starts_with(reference.as_str()) || id.ends_with(reference.as_str())
                    })
                    .collect();

                match matches.as_slice() {
                    [item] => Ok(item.id.clone()),
                    [] => Err(DaemonError::UnknownItem(reference.clone())),
                    many => Err(DaemonError::UnknownItem(format!(
                        "{} matches {} items",
                        reference,
                        many.len()
                    ))),
                }
            })
            .collect()
    }

    fn selection_line(&self) -> String {
        format!(
            "Selected: {} worth {} tokens",
            count_label(self.selection.resolve(self.engine.inventory()).len()),
            self.selection.total_value(self.engine.inventory())
        )
    }
}

async fn write_lines<W: AsyncWrite + Unpin>(writer: &mut W, lines: &[String]) -> DaemonResult<()> {
    for line in lines {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

fn balance_line(balance: u64) -> String {
    format!("Balance: {} tokens", balance)
}

fn count_label(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{} items", count)
    }
}

fn short_id(id: &ItemId) -> &str {
    let id = id.as_str();
    let start = id.len().saturating_sub(SHORT_ID_LEN);
    id.get(start..).unwrap_or(id)
}

fn item_line(position: usize, item: &Item) -> String {
    format!(
        "{:>3}. [{}] {:<24} {:<2} {:>6} tokens",
        position,
        short_id(&item.id),
        item.name,
        item.rarity,
        item.price
    )
}

fn receipt_lines(receipt: &GenerationReceipt) -> Vec<String> {
    let mut lines: Vec<String> = receipt
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| item_line(i + 1, item))
        .collect();
    if let Some(item) = &receipt.showcase {
        lines.push(format!("*** {} pull! {} ***", item.rarity, item.name));
    }
    lines.push(balance_line(receipt.balance));
    lines
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use tokendex_domain::RarityTier;
    use tokendex_engine::{EngineConfig, EventBus, ManualScheduler, StubGateway};
    use tokendex_store::MemoryStore;

    struct Fixture {
        scheduler: Arc<ManualScheduler>,
        console: Console<MemoryStore, StubGateway>,
        items: Vec<Item>,
    }

    async fn fixture(balance: u64) -> Fixture {
        let items: Vec<Item> = [("Pyrokin", 30), ("Aqualing", 20), ("Voltfang", 25)]
            .iter()
            .enumerate()
            .map(|(i, (name, price))| {
                Item::new(*name, RarityTier::D, "")
                    .with_price(*price)
                    .with_generated_at(Utc::now() - ChronoDuration::minutes(i as i64))
            })
            .collect();

        let store = Arc::new(MemoryStore::with_state(
            items.iter().map(Item::to_record).collect(),
            balance,
        ));
        let scheduler = Arc::new(ManualScheduler::new());
        let engine = Engine::open(
            store,
            Arc::new(StubGateway::new()),
            scheduler.clone(),
            Arc::new(EventBus::default()),
            EngineConfig::default(),
        )
        .await
        .unwrap();

        Fixture {
            scheduler,
            console: Console::new(Arc::new(engine)),
            items,
        }
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let mut f = fixture(100).await;

        let lines = f.console.execute(Command::List).await.unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Pyrokin"));
        assert!(lines[2].contains("Voltfang"));
    }

    #[tokio::test]
    async fn test_sell_by_position_and_undo() {
        let mut f = fixture(100).await;

        let lines = f.console.execute(Command::Sell(vec!["1".to_string()])).await.unwrap();
        assert_eq!(lines, vec!["Balance: 130 tokens".to_string()]);

        f.scheduler.advance(Duration::from_secs(4));
        let status = f.console.execute(Command::Status).await.unwrap();
        assert!(status.contains(&"Sold 1 item. Undo (6s)".to_string()));

        let lines = f.console.execute(Command::Undo).await.unwrap();
        assert_eq!(lines, vec!["Balance: 100 tokens".to_string()]);
    }

    #[tokio::test]
    async fn test_sell_by_id_fragment() {
        let mut f = fixture(0).await;
        let target = f.items[1].id.as_str().to_string();
        let suffix = target[target.len() - SHORT_ID_LEN..].to_string();

        f.console.execute(Command::Sell(vec![suffix])).await.unwrap();
        let lines = f.console.execute(Command::Balance).await.unwrap();
        assert_eq!(lines, vec!["Balance: 20 tokens".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let mut f = fixture(0).await;

        let err = f.console.execute(Command::Sell(vec!["zzzz".to_string()])).await.unwrap_err();
        assert!(matches!(err, DaemonError::UnknownItem(_)));
    }

    #[tokio::test]
    async fn test_selection_flow() {
        let mut f = fixture(0).await;

        let lines = f
            .console
            .execute(Command::Select(vec!["1".to_string(), "3".to_string()]))
            .await
            .unwrap();
        assert_eq!(lines, vec!["Selected: 2 items worth 55 tokens".to_string()]);

        f.console.execute(Command::SellSelected).await.unwrap();
        assert!(f.console.selection().is_empty());

        let lines = f.console.execute(Command::Balance).await.unwrap();
        assert_eq!(lines, vec!["Balance: 55 tokens".to_string()]);
    }

    #[tokio::test]
    async fn test_quote_is_read_only() {
        let mut f = fixture(0).await;

        let lines = f.console.execute(Command::Quote(vec!["2".to_string()])).await.unwrap();
        let summary = lines.last().unwrap();
        assert!(summary.contains("would pay 20 tokens"));
        assert!(summary.contains("(pending confirmation)"));
        assert_eq!(f.console.execute(Command::List).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_engine_failure_is_an_engine_error() {
        let mut f = fixture(5).await;

        let err = f.console.execute(Command::Generate).await.unwrap_err();
        assert!(matches!(err, DaemonError::Engine(_)));
    }

    #[tokio::test]
    async fn test_run_reads_until_quit() {
        let mut f = fixture(100).await;
        let input = b"balance\n\nbogus\nsell 1\nquit\nbalance\n";
        let mut output = Vec::new();

        f.console.run(&input[..], &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Balance: 100 tokens");
        assert!(lines[1].starts_with("error: Invalid command: bogus"));
        assert_eq!(lines[2], "Balance: 130 tokens");
        assert_eq!(lines.len(), 3);
    }
}
