//! Operator console commands (one per stdin line).
//!
//! ```text
//!  on <ACTUATOR>        manual ON for the override period
//!  off <ACTUATOR>       manual OFF for the override period
//!  release <ACTUATOR>   drop a manual override
//!  auto on|off          enable/disable automatic intents
//!  status               log the shared state
//!  quit                 graceful shutdown
//! ```

use crate::error::ProtocolError;
use crate::model::ActuatorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Set { actuator: ActuatorId, on: bool },
    Release(ActuatorId),
    Auto(bool),
    Status,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    Empty,
    UnknownVerb,
    MissingArgument,
    UnknownActuator,
}

impl core::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownVerb => write!(f, "expected on|off|release|auto|status|quit"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::UnknownActuator => write!(f, "unknown actuator"),
        }
    }
}

fn actuator(arg: Option<&str>) -> Result<ActuatorId, ConsoleError> {
    let name = arg.ok_or(ConsoleError::MissingArgument)?;
    name.to_ascii_uppercase()
        .parse()
        .map_err(|_: ProtocolError| ConsoleError::UnknownActuator)
}

pub fn parse(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(ConsoleError::Empty)?.to_ascii_lowercase();
    let arg = words.next();
    match verb.as_str() {
        "on" => Ok(ConsoleCommand::Set {
            actuator: actuator(arg)?,
            on: true,
        }),
        "off" => Ok(ConsoleCommand::Set {
            actuator: actuator(arg)?,
            on: false,
        }),
        "release" => Ok(ConsoleCommand::Release(actuator(arg)?)),
        "auto" => match arg.map(str::to_ascii_lowercase).as_deref() {
            Some("on") => Ok(ConsoleCommand::Auto(true)),
            Some("off") => Ok(ConsoleCommand::Auto(false)),
            _ => Err(ConsoleError::MissingArgument),
        },
        "status" => Ok(ConsoleCommand::Status),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        _ => Err(ConsoleError::UnknownVerb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operator_commands() {
        assert_eq!(
            parse("on mist_maker"),
            Ok(ConsoleCommand::Set {
                actuator: ActuatorId::MistMaker,
                on: true
            })
        );
        assert_eq!(
            parse("  OFF FRUITING_LED "),
            Ok(ConsoleCommand::Set {
                actuator: ActuatorId::FruitingLed,
                on: false
            })
        );
        assert_eq!(parse("release reserved"), Ok(ConsoleCommand::Release(ActuatorId::Reserved)));
        assert_eq!(parse("auto OFF"), Ok(ConsoleCommand::Auto(false)));
        assert_eq!(parse("quit"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse(""), Err(ConsoleError::Empty));
        assert_eq!(parse("toggle MIST_MAKER"), Err(ConsoleError::UnknownVerb));
        assert_eq!(parse("on"), Err(ConsoleError::MissingArgument));
        assert_eq!(parse("on HEATER"), Err(ConsoleError::UnknownActuator));
        assert_eq!(parse("auto maybe"), Err(ConsoleError::MissingArgument));
    }
}
