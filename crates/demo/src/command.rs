//! Line-oriented command parsing.

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Bind,
	Unbind,
	/// `None` adds a generated sample record.
	Add(Option<String>),
	List,
	Remove(String),
	Clear,
	/// `None` repeats the last search.
	Search(Option<String>),
	Process,
	Cancel,
	Stats {
		json: bool,
	},
	Ticker(TickerKind, TickerAction),
	Help,
	Quit,
}

/// Which of the host's two tickers a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerKind {
	/// Runs until stopped.
	Background,
	/// Stops itself after its configured tick limit.
	Foreground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerAction {
	Start,
	Stop,
	Status,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
	#[error("empty input")]
	Empty,
	#[error("unknown command '{0}' (try 'help')")]
	Unknown(String),
	#[error("'{command}' needs {what}")]
	MissingArgument { command: &'static str, what: &'static str },
}

pub const HELP: &str = "\
commands:
  bind | unbind            attach to / detach from the worker service
  add [text]               add a record (a sample record when text is omitted)
  list                     list all records
  remove <text>            remove the first matching record
  clear                    remove every record
  search [query]           case-insensitive substring search (repeats the last one)
  process | cancel         start / interrupt async processing
  stats [--json]           service statistics
  ticker start|stop|status periodic background task
  foreground start|stop|status
                           self-limiting foreground task
  help | quit";

/// Parses one input line. The argument is the rest of the line, trimmed.
pub fn parse(line: &str) -> Result<Command, ParseError> {
	let line = line.trim();
	if line.is_empty() {
		return Err(ParseError::Empty);
	}
	let (word, rest) = match line.split_once(char::is_whitespace) {
		Some((word, rest)) => (word, rest.trim()),
		None => (line, ""),
	};
	let arg = (!rest.is_empty()).then_some(rest);

	Ok(match word.to_ascii_lowercase().as_str() {
		"bind" => Command::Bind,
		"unbind" => Command::Unbind,
		"add" => Command::Add(arg.map(str::to_owned)),
		"list" | "get" => Command::List,
		"remove" | "rm" => Command::Remove(required(arg, "remove", "a record")?),
		"clear" => Command::Clear,
		"search" => Command::Search(arg.map(str::to_owned)),
		"process" => Command::Process,
		"cancel" => Command::Cancel,
		"stats" => Command::Stats { json: rest == "--json" },
		"ticker" | "background" => Command::Ticker(TickerKind::Background, ticker_action("ticker", rest)?),
		"foreground" => Command::Ticker(TickerKind::Foreground, ticker_action("foreground", rest)?),
		"help" | "?" => Command::Help,
		"quit" | "exit" => Command::Quit,
		other => return Err(ParseError::Unknown(other.to_owned())),
	})
}

fn required(arg: Option<&str>, command: &'static str, what: &'static str) -> Result<String, ParseError> {
	arg.map(str::to_owned).ok_or(ParseError::MissingArgument { command, what })
}

fn ticker_action(command: &'static str, rest: &str) -> Result<TickerAction, ParseError> {
	match rest {
		"start" => Ok(TickerAction::Start),
		"stop" => Ok(TickerAction::Stop),
		"" | "status" => Ok(TickerAction::Status),
		_ => Err(ParseError::MissingArgument {
			command,
			what: "start, stop or status",
		}),
	}
}
