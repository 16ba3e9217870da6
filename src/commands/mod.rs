pub mod core;
pub mod sugar;

use std::str;
use std::vec;

use bytes::Bytes;
use thiserror::Error as ThisError;

use crate::frame::Frame;

/// Typed cursor over the argument tail of a parsed request array. The
/// command verb has already been consumed when an executor receives it.
pub struct Arguments {
    parts: vec::IntoIter<Frame>,
}

impl Arguments {
    pub fn new(parts: Vec<Frame>) -> Arguments {
        Arguments {
            parts: parts.into_iter(),
        }
    }

    pub fn next(&mut self) -> Option<Frame> {
        self.parts.next()
    }

    /// Next argument interpreted as UTF-8 text. Both `Simple` and `Bulk`
    /// representations may be strings; errors are a separate type even
    /// though they carry text.
    pub fn next_string(&mut self) -> Result<String, ArgumentError> {
        let frame = self.parts.next().ok_or(ArgumentError::EndOfArguments)?;

        match frame {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(ArgumentError::InvalidUtf8String),
            frame => Err(ArgumentError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, ArgumentError> {
        let frame = self.parts.next().ok_or(ArgumentError::EndOfArguments)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(ArgumentError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Next argument parsed as a signed 64-bit integer. Clients send
    /// numbers as bulk strings, so both integer frames and decimal text
    /// are accepted.
    pub fn next_integer(&mut self) -> Result<i64, ArgumentError> {
        let frame = self.parts.next().ok_or(ArgumentError::EndOfArguments)?;

        match frame {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(s) => s.parse().map_err(|_| ArgumentError::NotAnInteger(s)),
            Frame::Bulk(bytes) => {
                let s = str::from_utf8(&bytes[..])
                    .map_err(ArgumentError::InvalidUtf8String)?
                    .to_string();
                s.parse().map_err(|_| ArgumentError::NotAnInteger(s))
            }
            frame => Err(ArgumentError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ArgumentError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8String(#[from] str::Utf8Error),
    #[error("value {0:?} is not an integer")]
    NotAnInteger(String),
    /// The request array is fully consumed. Variadic parsers rely on this
    /// being distinct from the malformed-argument cases above.
    #[error("no more arguments")]
    EndOfArguments,
}

/// Everything that can go wrong between verb lookup and a handler reply.
/// All variants except `Quit` render as a single RESP error frame; `Quit`
/// carries the goodbye response and tells the session loop to close.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    Unknown(String),
    #[error("ERR missing argument '{param}' for '{cmd}' command")]
    MissingArgument { cmd: String, param: &'static str },
    #[error("ERR invalid argument '{param}' for '{cmd}' command: {source}")]
    WrongArgumentType {
        cmd: String,
        param: &'static str,
        source: ArgumentError,
    },
    #[error("{0}")]
    Handler(String),
    #[error("ERR internal error")]
    System,
    #[error("quit")]
    Quit(Frame),
}

impl CommandError {
    pub fn missing(cmd: &str, param: &'static str) -> CommandError {
        CommandError::MissingArgument {
            cmd: cmd.to_string(),
            param,
        }
    }

    fn wrong_type(cmd: &str, param: &'static str, source: ArgumentError) -> CommandError {
        CommandError::WrongArgumentType {
            cmd: cmd.to_string(),
            param,
            source,
        }
    }
}

// Shared verb-argument parse helpers, used by both registration phases.
// Absent arguments become missing-argument errors naming the verb and the
// parameter; present-but-malformed arguments become wrong-type errors.

pub(crate) fn required_string(
    cmd: &str,
    param: &'static str,
    args: &mut Arguments,
) -> Result<String, CommandError> {
    args.next_string().map_err(|err| match err {
        ArgumentError::EndOfArguments => CommandError::missing(cmd, param),
        err => CommandError::wrong_type(cmd, param, err),
    })
}

pub(crate) fn required_bytes(
    cmd: &str,
    param: &'static str,
    args: &mut Arguments,
) -> Result<Bytes, CommandError> {
    args.next_bytes().map_err(|err| match err {
        ArgumentError::EndOfArguments => CommandError::missing(cmd, param),
        err => CommandError::wrong_type(cmd, param, err),
    })
}

pub(crate) fn required_integer(
    cmd: &str,
    param: &'static str,
    args: &mut Arguments,
) -> Result<i64, CommandError> {
    args.next_integer().map_err(|err| match err {
        ArgumentError::EndOfArguments => CommandError::missing(cmd, param),
        err => CommandError::wrong_type(cmd, param, err),
    })
}

/// Consumes alternating key/value arguments until the request runs out.
/// An odd trailing key is a missing-argument error for its value.
pub(crate) fn parse_pairs(
    cmd: &str,
    args: &mut Arguments,
) -> Result<Vec<(String, Bytes)>, CommandError> {
    let mut pairs = vec![];

    loop {
        let key = match args.next_string() {
            Ok(key) => key,
            Err(ArgumentError::EndOfArguments) => break,
            Err(err) => return Err(CommandError::wrong_type(cmd, "key", err)),
        };
        let value = required_bytes(cmd, "value", args)?;
        pairs.push((key, value));
    }

    if pairs.is_empty() {
        return Err(CommandError::missing(cmd, "key"));
    }

    Ok(pairs)
}

/// Consumes the remaining arguments as strings; at least one is required.
pub(crate) fn parse_strings(
    cmd: &str,
    param: &'static str,
    args: &mut Arguments,
) -> Result<Vec<String>, CommandError> {
    let mut strings = vec![];

    loop {
        match args.next_string() {
            Ok(s) => strings.push(s),
            Err(ArgumentError::EndOfArguments) => break,
            Err(err) => return Err(CommandError::wrong_type(cmd, param, err)),
        }
    }

    if strings.is_empty() {
        return Err(CommandError::missing(cmd, param));
    }

    Ok(strings)
}

pub(crate) fn parse_keys(cmd: &str, args: &mut Arguments) -> Result<Vec<String>, CommandError> {
    parse_strings(cmd, "key", args)
}
