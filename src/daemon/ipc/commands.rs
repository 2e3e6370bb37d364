use crate::common::LogLevel;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    Quit,
    Status,
    List,
    Load(String),
    Off,
    Toggle(String),
    Active(String),
    Delete(String),
    Preview(String),
    Import(PathBuf),
    Edit(Option<String>),
    Set(String, String),
    Commit(Option<String>),
    Reapply,
    SetLog(LogLevel),
    WaitChange,
}

impl FromStr for Command {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let upper = parts.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
        match (upper.as_str(), &parts[parts.len().min(1)..]) {
            ("HELP" | "?", []) => Ok(Command::Help),
            ("PING", []) => Ok(Command::Ping),
            ("QUIT", []) => Ok(Command::Quit),
            ("STATUS", []) => Ok(Command::Status),
            ("LIST", []) => Ok(Command::List),
            ("OFF" | "TURN_OFF", []) => Ok(Command::Off),
            ("REAPPLY", []) => Ok(Command::Reapply),
            ("WAIT_CHANGE" | "WAITCHANGE", []) => Ok(Command::WaitChange),

            ("LOAD", [id]) => Ok(Command::Load(id.to_string())),
            ("LOAD", _) => Err("usage: LOAD <id>"),
            ("TOGGLE", [id]) => Ok(Command::Toggle(id.to_string())),
            ("TOGGLE", _) => Err("usage: TOGGLE <id>"),
            ("ACTIVE", [sel]) => Ok(Command::Active(sel.to_string())),
            ("ACTIVE", _) => Err("usage: ACTIVE <id|*>"),
            ("DELETE", [id]) => Ok(Command::Delete(id.to_string())),
            ("DELETE", _) => Err("usage: DELETE <id>"),
            ("PREVIEW", [id]) => Ok(Command::Preview(id.to_string())),
            ("PREVIEW", _) => Err("usage: PREVIEW <id>"),
            ("IMPORT", [path]) => Ok(Command::Import(PathBuf::from(path))),
            ("IMPORT", _) => Err("usage: IMPORT <path>"),
            ("EDIT", ["new" | "NEW"]) => Ok(Command::Edit(None)),
            ("EDIT", [id]) => Ok(Command::Edit(Some(id.to_string()))),
            ("EDIT", _) => Err("usage: EDIT <id|new>"),
            ("SET", [field, value @ ..]) if !value.is_empty() => {
                Ok(Command::Set(field.to_string(), value.join(" ")))
            }
            ("SET", _) => Err("usage: SET <field> <value>"),
            ("COMMIT", []) => Ok(Command::Commit(None)),
            ("COMMIT", title) => Ok(Command::Commit(Some(title.join(" ")))),

            ("SETLOG" | "SET_LOG", [level]) => LogLevel::from_str_ignore_case(level)
                .map(Command::SetLog)
                .ok_or("usage: SETLOG <DEBUG|INFO|WARN|ERROR>"),
            ("SETLOG" | "SET_LOG", _) => Err("usage: SETLOG <DEBUG|INFO|WARN|ERROR>"),

            ("", _) => Err("empty"),
            _ => Err("unknown command (try HELP)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("load 1700000000000".parse::<Command>(), Ok(Command::Load("1700000000000".into())));
        assert_eq!("ACTIVE *".parse::<Command>(), Ok(Command::Active("*".into())));
        assert_eq!("off".parse::<Command>(), Ok(Command::Off));
        assert_eq!("SETLOG debug".parse::<Command>(), Ok(Command::SetLog(LogLevel::Debug)));
        assert_eq!(
            "IMPORT /sdcard/desk.toml".parse::<Command>(),
            Ok(Command::Import(PathBuf::from("/sdcard/desk.toml")))
        );
    }

    #[test]
    fn test_parse_scratch_commands() {
        assert_eq!("EDIT new".parse::<Command>(), Ok(Command::Edit(None)));
        assert_eq!("edit 42".parse::<Command>(), Ok(Command::Edit(Some("42".into()))));
        assert_eq!(
            "SET overscan { enabled = true, top = 8 }".parse::<Command>(),
            Ok(Command::Set("overscan".into(), "{ enabled = true, top = 8 }".into()))
        );
        assert_eq!("COMMIT".parse::<Command>(), Ok(Command::Commit(None)));
        assert_eq!("COMMIT Big  screen".parse::<Command>(), Ok(Command::Commit(Some("Big screen".into()))));
        assert_eq!("SET density".parse::<Command>(), Err("usage: SET <field> <value>"));
        assert_eq!("EDIT".parse::<Command>(), Err("usage: EDIT <id|new>"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("LOAD".parse::<Command>(), Err("usage: LOAD <id>"));
        assert_eq!("SETLOG loud".parse::<Command>(), Err("usage: SETLOG <DEBUG|INFO|WARN|ERROR>"));
        assert_eq!("".parse::<Command>(), Err("empty"));
        assert_eq!("FROB".parse::<Command>(), Err("unknown command (try HELP)"));
        assert_eq!("PING extra".parse::<Command>(), Err("unknown command (try HELP)"));
    }
}
