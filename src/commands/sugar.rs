//! Phase-two registrations: verbs layered on the same dispatch model as
//! the core set. Currently the set family.

use std::sync::Arc;

use crate::commands::{parse_strings, required_string};
use crate::dispatch::Dispatcher;

pub(crate) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(
        "SADD",
        Arc::new(|d, session, cmd, args| {
            let key = required_string(cmd, "key", args)?;
            let members = parse_strings(cmd, "member", args)?;
            d.user()?.sadd(session, &key, members)
        }),
    );

    dispatcher.register(
        "SMEMBERS",
        Arc::new(|d, session, cmd, args| {
            let key = required_string(cmd, "key", args)?;
            d.user()?.smembers(session, &key)
        }),
    );

    dispatcher.register(
        "SREM",
        Arc::new(|d, session, cmd, args| {
            let key = required_string(cmd, "key", args)?;
            let members = parse_strings(cmd, "member", args)?;
            d.user()?.srem(session, &key, members)
        }),
    );
}
