//! Phase-one registrations: connection management, string, and hash
//! verbs. Each executor parses its arguments off the cursor, synthesizes
//! the option record for its verb, and calls the matching handler method.

use std::sync::Arc;

use crate::commands::{
    parse_keys, parse_pairs, required_bytes, required_integer, required_string, ArgumentError,
    CommandError,
};
use crate::dispatch::Dispatcher;
use crate::handler::{
    GetOption, HGetOption, HMGetOption, HMSetOption, HSetOption, MGetOption, MSetOption, SetOption,
};

pub(crate) fn register(dispatcher: &mut Dispatcher) {
    // Connection management commands.

    dispatcher.register(
        "PING",
        Arc::new(|d, session, cmd, args| {
            let msg = match args.next_bytes() {
                Ok(msg) => Some(msg),
                Err(ArgumentError::EndOfArguments) => None,
                Err(err) => {
                    return Err(CommandError::WrongArgumentType {
                        cmd: cmd.to_string(),
                        param: "message",
                        source: err,
                    })
                }
            };
            d.system().ping(session, msg)
        }),
    );

    dispatcher.register(
        "ECHO",
        Arc::new(|d, session, cmd, args| {
            let msg = required_bytes(cmd, "message", args)?;
            d.system().echo(session, msg)
        }),
    );

    dispatcher.register(
        "SELECT",
        Arc::new(|d, session, cmd, args| {
            let id = required_integer(cmd, "index", args)?;
            d.system().select(session, id)
        }),
    );

    dispatcher.register("QUIT", Arc::new(|d, session, _cmd, _args| d.system().quit(session)));

    // String commands.

    dispatcher.register(
        "SET",
        Arc::new(|d, session, cmd, args| {
            let key = required_string(cmd, "key", args)?;
            let value = required_bytes(cmd, "value", args)?;
            d.user()?.set(session, &key, value, SetOption::default())
        }),
    );

    dispatcher.register(
        "SETNX",
        Arc::new(|d, session, cmd, args| {
            let opt = SetOption {
                nx: true,
                ..SetOption::default()
            };
            let key = required_string(cmd, "key", args)?;
            let value = required_bytes(cmd, "value", args)?;
            d.user()?.set(session, &key, value, opt)
        }),
    );

    dispatcher.register(
        "GET",
        Arc::new(|d, session, cmd, args| {
            let key = required_string(cmd, "key", args)?;
            d.user()?.get(session, &key, GetOption::default())
        }),
    );

    dispatcher.register(
        "GETSET",
        Arc::new(|d, session, cmd, args| {
            let opt = SetOption {
                get: true,
                ..SetOption::default()
            };
            let key = required_string(cmd, "key", args)?;
            let value = required_bytes(cmd, "value", args)?;
            d.user()?.set(session, &key, value, opt)
        }),
    );

    dispatcher.register(
        "MSET",
        Arc::new(|d, session, cmd, args| {
            let pairs = parse_pairs(cmd, args)?;
            d.user()?.mset(session, pairs, MSetOption::default())
        }),
    );

    dispatcher.register(
        "MSETNX",
        Arc::new(|d, session, cmd, args| {
            let pairs = parse_pairs(cmd, args)?;
            d.user()?.mset(session, pairs, MSetOption { nx: true })
        }),
    );

    dispatcher.register(
        "MGET",
        Arc::new(|d, session, cmd, args| {
            let keys = parse_keys(cmd, args)?;
            d.user()?.mget(session, keys, MGetOption::default())
        }),
    );

    // Hash commands.

    dispatcher.register(
        "HSET",
        Arc::new(|d, session, cmd, args| {
            let hash = required_string(cmd, "hash", args)?;
            let key = required_string(cmd, "key", args)?;
            let value = required_bytes(cmd, "value", args)?;
            d.user()?.hset(session, &hash, &key, value, HSetOption::default())
        }),
    );

    dispatcher.register(
        "HGET",
        Arc::new(|d, session, cmd, args| {
            let hash = required_string(cmd, "hash", args)?;
            let key = required_string(cmd, "key", args)?;
            d.user()?.hget(session, &hash, &key, HGetOption::default())
        }),
    );

    dispatcher.register(
        "HGETALL",
        Arc::new(|d, session, cmd, args| {
            let hash = required_string(cmd, "hash", args)?;
            d.user()?.hgetall(session, &hash)
        }),
    );

    dispatcher.register(
        "HMSET",
        Arc::new(|d, session, cmd, args| {
            let hash = required_string(cmd, "hash", args)?;
            let pairs = parse_pairs(cmd, args)?;
            d.user()?.hmset(session, &hash, pairs, HMSetOption::default())
        }),
    );

    dispatcher.register(
        "HMGET",
        Arc::new(|d, session, cmd, args| {
            let hash = required_string(cmd, "hash", args)?;
            let keys = parse_keys(cmd, args)?;
            d.user()?.hmget(session, &hash, keys, HMGetOption::default())
        }),
    );
}
