//! Example in-memory `UserCommandHandler`, used by the demo binary and
//! the test suite. Embedding applications supply their own handler; this
//! one keeps string, hash, and set records per selected database index.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;

use crate::commands::CommandError;
use crate::frame::Frame;
use crate::handler::{
    GetOption, HGetOption, HMGetOption, HMSetOption, HSetOption, MGetOption, MSetOption, SetOption,
    UserCommandHandler,
};
use crate::session::Session;

#[derive(Default)]
struct Database {
    strings: HashMap<String, Bytes>,
    hashes: HashMap<String, HashMap<String, Bytes>>,
    // Members keep insertion order, so SMEMBERS output is deterministic.
    sets: HashMap<String, Vec<String>>,
}

pub struct Store {
    databases: Mutex<HashMap<i64, Database>>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            databases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl UserCommandHandler for Store {
    fn set(
        &self,
        session: &mut Session,
        key: &str,
        value: Bytes,
        opt: SetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        if opt.nx && db.strings.contains_key(key) {
            return Ok(Frame::Integer(0));
        }

        let previous = db.strings.insert(key.to_string(), value);

        let res = if opt.get {
            previous.map_or(Frame::Null, Frame::Bulk)
        } else if opt.nx {
            Frame::Integer(1)
        } else {
            Frame::Simple("OK".to_string())
        };

        Ok(res)
    }

    fn get(
        &self,
        session: &mut Session,
        key: &str,
        _opt: GetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let res = db
            .strings
            .get(key)
            .map_or(Frame::Null, |value| Frame::Bulk(value.clone()));

        Ok(res)
    }

    fn mset(
        &self,
        session: &mut Session,
        pairs: Vec<(String, Bytes)>,
        opt: MSetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        if opt.nx {
            // All-or-nothing: a single existing key aborts the whole set.
            if pairs.iter().any(|(key, _)| db.strings.contains_key(key)) {
                return Ok(Frame::Integer(0));
            }
            for (key, value) in pairs {
                db.strings.insert(key, value);
            }
            return Ok(Frame::Integer(1));
        }

        for (key, value) in pairs {
            db.strings.insert(key, value);
        }

        Ok(Frame::Simple("OK".to_string()))
    }

    fn mget(
        &self,
        session: &mut Session,
        keys: Vec<String>,
        _opt: MGetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let values = keys
            .iter()
            .map(|key| {
                db.strings
                    .get(key)
                    .map_or(Frame::Null, |value| Frame::Bulk(value.clone()))
            })
            .collect();

        Ok(Frame::Array(values))
    }

    fn hset(
        &self,
        session: &mut Session,
        hash: &str,
        key: &str,
        value: Bytes,
        _opt: HSetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let record = db.hashes.entry(hash.to_string()).or_default();
        let added = i64::from(record.insert(key.to_string(), value).is_none());

        Ok(Frame::Integer(added))
    }

    fn hget(
        &self,
        session: &mut Session,
        hash: &str,
        key: &str,
        _opt: HGetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let res = db
            .hashes
            .get(hash)
            .and_then(|record| record.get(key))
            .map_or(Frame::Null, |value| Frame::Bulk(value.clone()));

        Ok(res)
    }

    fn hgetall(&self, session: &mut Session, hash: &str) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        // A missing hash is an empty response, not an error.
        let mut fields = vec![];
        if let Some(record) = db.hashes.get(hash) {
            for (key, value) in record {
                fields.push(Frame::Bulk(Bytes::copy_from_slice(key.as_bytes())));
                fields.push(Frame::Bulk(value.clone()));
            }
        }

        Ok(Frame::Array(fields))
    }

    fn hmset(
        &self,
        session: &mut Session,
        hash: &str,
        pairs: Vec<(String, Bytes)>,
        _opt: HMSetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let record = db.hashes.entry(hash.to_string()).or_default();
        for (key, value) in pairs {
            record.insert(key, value);
        }

        Ok(Frame::Simple("OK".to_string()))
    }

    fn hmget(
        &self,
        session: &mut Session,
        hash: &str,
        keys: Vec<String>,
        _opt: HMGetOption,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let record = db.hashes.get(hash);
        let values = keys
            .iter()
            .map(|key| {
                record
                    .and_then(|record| record.get(key))
                    .map_or(Frame::Null, |value| Frame::Bulk(value.clone()))
            })
            .collect();

        Ok(Frame::Array(values))
    }

    fn sadd(
        &self,
        session: &mut Session,
        key: &str,
        members: Vec<String>,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let record = db.sets.entry(key.to_string()).or_default();
        let mut added = 0;
        for member in members {
            if !record.contains(&member) {
                record.push(member);
                added += 1;
            }
        }

        Ok(Frame::Integer(added))
    }

    fn smembers(&self, session: &mut Session, key: &str) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        let members = db.sets.get(key).map_or_else(Vec::new, |record| {
            record
                .iter()
                .map(|member| Frame::Bulk(Bytes::copy_from_slice(member.as_bytes())))
                .collect()
        });

        Ok(Frame::Array(members))
    }

    fn srem(
        &self,
        session: &mut Session,
        key: &str,
        members: Vec<String>,
    ) -> Result<Frame, CommandError> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.entry(session.db()).or_default();

        // Mutate the backing record in place so removals persist across
        // calls.
        let mut removed = 0;
        if let Some(record) = db.sets.get_mut(key) {
            for member in members {
                if let Some(position) = record.iter().position(|m| m == &member) {
                    record.remove(position);
                    removed += 1;
                }
            }
        }

        Ok(Frame::Integer(removed))
    }
}
