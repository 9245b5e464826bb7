//! Console command parsing.

use crate::error::{DaemonError, DaemonResult};

/// A parsed console command.
///
/// Item references are list positions (1-based, as shown by `list`) or
/// leading characters of an item ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Balance,
    List,
    Generate,
    Batch,
    Quote(Vec<String>),
    Sell(Vec<String>),
    Select(Vec<String>),
    SelectAll,
    Clear,
    Selected,
    SellSelected,
    Undo,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  balance               show token balance
  list                  show the collection, newest first
  generate              generate one item
  batch                 generate a batch of items
  quote <item>...       show what selling these items would pay
  sell <item>...        sell items (undoable for a short while)
  select <item>...      toggle items in the selection
  select-all            select every item
  clear                 empty the selection
  selected              show the selection
  sell-selected         sell the selection
  undo                  undo the last sale
  status                balance, collection size and undo countdown
  help                  show this help
  quit                  exit
Items are referenced by list number or ID prefix.";

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> DaemonResult<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let command = match verb.to_lowercase().as_str() {
            "balance" | "bal" => Command::Balance,
            "list" | "ls" => Command::List,
            "generate" | "gen" => Command::Generate,
            "batch" => Command::Batch,
            "quote" => Command::Quote(Self::require_args(verb, args)?),
            "sell" => Command::Sell(Self::require_args(verb, args)?),
            "select" => Command::Select(Self::require_args(verb, args)?),
            "select-all" => Command::SelectAll,
            "clear" | "deselect-all" => Command::Clear,
            "selected" => Command::Selected,
            "sell-selected" => Command::SellSelected,
            "undo" => Command::Undo,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(DaemonError::InvalidCommand(format!(
                    "{} (type 'help' for commands)",
                    other
                )))
            },
        };
        Ok(Some(command))
    }

    fn require_args(verb: &str, args: Vec<String>) -> DaemonResult<Vec<String>> {
        if args.is_empty() {
            return Err(DaemonError::InvalidCommand(format!("{} needs at least one item", verb)));
        }
        Ok(args)
    }
}
