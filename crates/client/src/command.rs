use mpnet::{ClientId, GroupIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ready(bool),
    Private { to: ClientId, text: String },
    CreateGroup(Vec<ClientId>),
    GroupMessage { group: GroupIndex, text: String },
    Raw(String),
    Players,
    Quit,
    Public(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("unknown command /{0}")]
    Unknown(String),
}

impl Command {
    /// Parses one console line. Lines not starting with `/` are public chat.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Public(line.to_string())));
        };

        let (name, args) = split_word(rest);
        let command = match name {
            "ready" => Command::Ready(true),
            "unready" => Command::Ready(false),
            "pm" => {
                let (to, text) = split_word(args);
                if to.is_empty() || text.is_empty() {
                    return Err(CommandError::Usage("/pm <id> <text>"));
                }
                Command::Private {
                    to: parse_number(to)?,
                    text: text.to_string(),
                }
            }
            "group" => {
                if args.is_empty() {
                    return Err(CommandError::Usage("/group <id,id,..>"));
                }
                let ids = args
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(parse_number)
                    .collect::<Result<Vec<_>, _>>()?;
                Command::CreateGroup(ids)
            }
            "gmsg" => {
                let (group, text) = split_word(args);
                if group.is_empty() || text.is_empty() {
                    return Err(CommandError::Usage("/gmsg <group> <text>"));
                }
                Command::GroupMessage {
                    group: parse_number(group)?,
                    text: text.to_string(),
                }
            }
            "raw" => {
                if args.is_empty() {
                    return Err(CommandError::Usage("/raw <text>"));
                }
                Command::Raw(args.to_string())
            }
            "players" => Command::Players,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn parse_number(text: &str) -> Result<u64, CommandError> {
    text.parse()
        .map_err(|_| CommandError::NotANumber(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_public_chat() {
        assert_eq!(
            Command::parse("hello there").unwrap(),
            Some(Command::Public("hello there".into()))
        );
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_private_message() {
        assert_eq!(
            Command::parse("/pm 3 see you  soon").unwrap(),
            Some(Command::Private {
                to: 3,
                text: "see you  soon".into()
            })
        );
        assert_eq!(
            Command::parse("/pm 3"),
            Err(CommandError::Usage("/pm <id> <text>"))
        );
        assert_eq!(
            Command::parse("/pm x hi"),
            Err(CommandError::NotANumber("x".into()))
        );
    }

    #[test]
    fn test_group_commands() {
        assert_eq!(
            Command::parse("/group 0, 2,5").unwrap(),
            Some(Command::CreateGroup(vec![0, 2, 5]))
        );
        assert_eq!(
            Command::parse("/gmsg 1 hi all").unwrap(),
            Some(Command::GroupMessage {
                group: 1,
                text: "hi all".into()
            })
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("/ready").unwrap(), Some(Command::Ready(true)));
        assert_eq!(Command::parse("/unready").unwrap(), Some(Command::Ready(false)));
        assert_eq!(Command::parse("/raw ping").unwrap(), Some(Command::Raw("ping".into())));
        assert_eq!(Command::parse("/quit").unwrap(), Some(Command::Quit));
        assert_eq!(
            Command::parse("/dance"),
            Err(CommandError::Unknown("dance".into()))
        );
    }
}
