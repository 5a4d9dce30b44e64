use std::path::PathBuf;

use messenger_core::MediaKind;

/// One line typed into the console screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(String),
    Attach { kind: MediaKind, path: PathBuf },
    Refresh,
    Show,
    OpenPhoto(usize),
    Quit,
    Help,
}

pub const HELP: &str = "\
Type a message and press enter to send it.
  /photo <path>   attach a photo
  /video <path>   attach a video
  /refresh        reload the conversation
  /show           print the conversation
  /open <n>       print the location of photo number n
  /quit           close the screen";

/// Parse a console line. Unknown slash commands come back as `Err`.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ConsoleCommand::Send(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };

    match name {
        "photo" | "video" => {
            if arg.is_empty() {
                return Err(format!("/{} needs a file path", name));
            }
            let kind = if name == "photo" {
                MediaKind::Photo
            } else {
                MediaKind::Video
            };
            Ok(ConsoleCommand::Attach {
                kind,
                path: PathBuf::from(arg),
            })
        }
        "refresh" => Ok(ConsoleCommand::Refresh),
        "show" => Ok(ConsoleCommand::Show),
        "open" => arg
            .parse()
            .map(ConsoleCommand::OpenPhoto)
            .map_err(|_| format!("'{}' is not a message number", arg)),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "help" => Ok(ConsoleCommand::Help),
        other => Err(format!("Unknown command /{}", other)),
    }
}
