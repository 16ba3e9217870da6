use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::commands::CommandError;
use crate::frame::Frame;
use crate::session::Session;

/// Options recognized by the `SET` family. The dispatcher synthesizes
/// fixed constants per verb (`SETNX` sets `nx`, `GETSET` sets `get`);
/// nothing is parsed off the wire, so the expiry knobs stay unset until a
/// flag-parsing dispatcher fills them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOption {
    pub nx: bool,
    pub xx: bool,
    pub ex: Option<Duration>,
    pub px: Option<Duration>,
    pub exat: Option<SystemTime>,
    pub pxat: Option<SystemTime>,
    pub keepttl: bool,
    pub get: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MSetOption {
    pub nx: bool,
}

// Placeholder option records, preserved for forward extension.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOption {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MGetOption {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HSetOption {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HGetOption {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HMSetOption {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HMGetOption {}

/// Connection-management verbs. Implemented by the engine itself; the
/// user cannot override them.
pub trait SystemCommandHandler: Send + Sync {
    fn ping(&self, session: &mut Session, msg: Option<Bytes>) -> Result<Frame, CommandError>;
    fn echo(&self, session: &mut Session, msg: Bytes) -> Result<Frame, CommandError>;
    fn select(&self, session: &mut Session, db: i64) -> Result<Frame, CommandError>;
    fn quit(&self, session: &mut Session) -> Result<Frame, CommandError>;
}

/// Data verbs, supplied by the embedding application. The handler is
/// shared by reference among all sessions and owns its own concurrency
/// discipline; the engine makes no guarantee about concurrent calls from
/// different sessions.
#[allow(clippy::too_many_arguments)]
pub trait UserCommandHandler: Send + Sync {
    fn set(
        &self,
        session: &mut Session,
        key: &str,
        value: Bytes,
        opt: SetOption,
    ) -> Result<Frame, CommandError>;

    fn get(&self, session: &mut Session, key: &str, opt: GetOption) -> Result<Frame, CommandError>;

    fn mset(
        &self,
        session: &mut Session,
        pairs: Vec<(String, Bytes)>,
        opt: MSetOption,
    ) -> Result<Frame, CommandError>;

    fn mget(
        &self,
        session: &mut Session,
        keys: Vec<String>,
        opt: MGetOption,
    ) -> Result<Frame, CommandError>;

    fn hset(
        &self,
        session: &mut Session,
        hash: &str,
        key: &str,
        value: Bytes,
        opt: HSetOption,
    ) -> Result<Frame, CommandError>;

    fn hget(
        &self,
        session: &mut Session,
        hash: &str,
        key: &str,
        opt: HGetOption,
    ) -> Result<Frame, CommandError>;

    fn hgetall(&self, session: &mut Session, hash: &str) -> Result<Frame, CommandError>;

    fn hmset(
        &self,
        session: &mut Session,
        hash: &str,
        pairs: Vec<(String, Bytes)>,
        opt: HMSetOption,
    ) -> Result<Frame, CommandError>;

    fn hmget(
        &self,
        session: &mut Session,
        hash: &str,
        keys: Vec<String>,
        opt: HMGetOption,
    ) -> Result<Frame, CommandError>;

    fn sadd(
        &self,
        session: &mut Session,
        key: &str,
        members: Vec<String>,
    ) -> Result<Frame, CommandError>;

    fn smembers(&self, session: &mut Session, key: &str) -> Result<Frame, CommandError>;

    fn srem(
        &self,
        session: &mut Session,
        key: &str,
        members: Vec<String>,
    ) -> Result<Frame, CommandError>;
}

/// The engine-owned system handler. Stateless; safe to share.
pub struct SystemHandler;

impl SystemCommandHandler for SystemHandler {
    fn ping(&self, _session: &mut Session, msg: Option<Bytes>) -> Result<Frame, CommandError> {
        let res = match msg {
            None => Frame::Simple("PONG".to_string()),
            Some(msg) => Frame::Bulk(msg),
        };
        Ok(res)
    }

    fn echo(&self, _session: &mut Session, msg: Bytes) -> Result<Frame, CommandError> {
        Ok(Frame::Bulk(msg))
    }

    fn select(&self, session: &mut Session, db: i64) -> Result<Frame, CommandError> {
        session.select(db);
        Ok(Frame::Simple("OK".to_string()))
    }

    // The goodbye response rides inside the quit signal so the session
    // loop can write it before closing the connection.
    fn quit(&self, _session: &mut Session) -> Result<Frame, CommandError> {
        Err(CommandError::Quit(Frame::Simple("OK".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_without_payload_pongs() {
        let mut session = Session::new(1);
        let res = SystemHandler.ping(&mut session, None).unwrap();

        assert_eq!(res, Frame::Simple("PONG".to_string()));
    }

    #[test]
    fn ping_with_payload_echoes_bulk() {
        let mut session = Session::new(1);
        let res = SystemHandler
            .ping(&mut session, Some(Bytes::from("hello")))
            .unwrap();

        assert_eq!(res, Frame::Bulk(Bytes::from("hello")));
    }

    #[test]
    fn select_updates_the_session() {
        let mut session = Session::new(1);
        let res = SystemHandler.select(&mut session, 5).unwrap();

        assert_eq!(res, Frame::Simple("OK".to_string()));
        assert_eq!(session.db(), 5);
    }

    #[test]
    fn quit_carries_its_response() {
        let mut session = Session::new(1);
        let err = SystemHandler.quit(&mut session).unwrap_err();

        assert!(matches!(
            err,
            CommandError::Quit(Frame::Simple(ref s)) if s == "OK"
        ));
    }
}
