/// Per-connection dispatch state. One session exists per accepted
/// connection and is dropped when its session loop exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Connection identifier, assigned monotonically at accept.
    id: u64,
    /// Database index selected with `SELECT`. New connections always use
    /// database 0; range validation is left to the user handler.
    db: i64,
}

impl Session {
    pub fn new(id: u64) -> Session {
        Session { id, db: 0 }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn db(&self) -> i64 {
        self.db
    }

    pub fn select(&mut self, db: i64) {
        self.db = db;
    }
}
