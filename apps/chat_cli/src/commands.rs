//! Line commands accepted by the interactive prompt.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Clear,
    Reload,
    Restart,
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
commands:
  /clear    remove every message from the conversation
  /reload   discard all local state, as if the client had been restarted
  /restart  ask the server to restart the last uploaded model and wait for it
  /status   show the current status line and panel
  /help     show this help
  /quit     exit
anything else is sent to the model";

pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    let Some(name) = trimmed.strip_prefix('/') else {
        return ReplCommand::Send(line.to_string());
    };
    match name.to_ascii_lowercase().as_str() {
        "clear" => ReplCommand::Clear,
        "reload" => ReplCommand::Reload,
        "restart" => ReplCommand::Restart,
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(trimmed.to_string()),
    }
}
