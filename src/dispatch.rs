use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::commands::{self, Arguments, CommandError};
use crate::frame::Frame;
use crate::handler::{SystemCommandHandler, SystemHandler, UserCommandHandler};
use crate::session::Session;

/// A function registered under a verb. It parses verb-specific arguments,
/// synthesizes the option record, and invokes the matching handler method
/// through the dispatcher it receives at call time.
pub type Executor =
    Arc<dyn Fn(&Dispatcher, &mut Session, &str, &mut Arguments) -> Result<Frame, CommandError> + Send + Sync>;

/// Optional per-command hook, invoked before the executor runs.
pub type Tracer = Arc<dyn Fn(&Session, &str) + Send + Sync>;

/// What the session loop should do after writing the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Close,
}

/// Verb-keyed executor registry plus the two handler slots. Cloning is
/// cheap (executors and handlers are shared), which is how the server
/// freezes a snapshot per serving run: registration mutates the server's
/// copy and takes effect at the next `start`.
#[derive(Clone)]
pub struct Dispatcher {
    executors: HashMap<String, Executor>,
    system: Arc<dyn SystemCommandHandler>,
    user: Option<Arc<dyn UserCommandHandler>>,
    tracer: Option<Tracer>,
}

impl Dispatcher {
    /// Builds the registry in two phases: core verbs (connection, string,
    /// hash families) and sugar verbs (set family). The split is
    /// organizational; both target the same map.
    pub fn new() -> Dispatcher {
        let mut dispatcher = Dispatcher {
            executors: HashMap::new(),
            system: Arc::new(SystemHandler),
            user: None,
            tracer: None,
        };
        commands::core::register(&mut dispatcher);
        commands::sugar::register(&mut dispatcher);
        dispatcher
    }

    /// Registers `executor` under `verb` (matched case-insensitively).
    /// Re-registering a verb replaces the previous executor.
    pub fn register(&mut self, verb: &str, executor: Executor) {
        self.executors.insert(verb.to_uppercase(), executor);
    }

    pub fn set_user_handler(&mut self, handler: Arc<dyn UserCommandHandler>) {
        self.user = Some(handler);
    }

    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = Some(tracer);
    }

    pub fn system(&self) -> &dyn SystemCommandHandler {
        self.system.as_ref()
    }

    /// The user handler slot. Dispatching a data verb without one is a
    /// system error so the client gets an error frame instead of silence.
    pub fn user(&self) -> Result<&dyn UserCommandHandler, CommandError> {
        self.user
            .as_deref()
            .ok_or(CommandError::System)
    }

    /// Dispatch entry point: unwraps nested request arrays, resolves the
    /// verb, runs its executor, and converts every recoverable error into
    /// a RESP error frame. The returned action tells the session loop
    /// whether to keep the connection open.
    pub fn execute(&self, session: &mut Session, request: Vec<Frame>) -> (Frame, Action) {
        // Some clients pipeline a command inside an outer array; unwrap
        // until the first element is a non-array.
        let mut request = request;
        while let Some(Frame::Array(_)) = request.first() {
            if let Frame::Array(inner) = request.remove(0) {
                request = inner;
            }
        }

        let mut args = Arguments::new(request);
        let verb = match args.next_string() {
            Ok(verb) => verb.to_uppercase(),
            Err(err) => {
                debug!(%err, "request carries no command verb");
                return (
                    Frame::Error("ERR protocol error: missing command".to_string()),
                    Action::Continue,
                );
            }
        };

        if let Some(tracer) = &self.tracer {
            tracer.as_ref()(session, &verb);
        }

        let Some(executor) = self.executors.get(&verb) else {
            let err = CommandError::Unknown(verb);
            return (Frame::Error(err.to_string()), Action::Continue);
        };

        match executor.as_ref()(self, session, &verb, &mut args) {
            Ok(frame) => (frame, Action::Continue),
            Err(CommandError::Quit(frame)) => (frame, Action::Close),
            Err(err) => (Frame::Error(err.to_string()), Action::Continue),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(parts: &[&str]) -> Vec<Frame> {
        parts
            .iter()
            .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
            .collect()
    }

    fn dispatcher_with_store() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_user_handler(Arc::new(Store::new()));
        dispatcher
    }

    #[test]
    fn verbs_match_case_insensitively() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        for verb in ["PING", "ping", "Ping"] {
            let (res, action) = dispatcher.execute(&mut session, request(&[verb]));
            assert_eq!(res, Frame::Simple("PONG".to_string()));
            assert_eq!(action, Action::Continue);
        }
    }

    #[test]
    fn unknown_command_is_recoverable() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        let (res, action) = dispatcher.execute(&mut session, request(&["NOSUCH"]));

        assert_eq!(
            res,
            Frame::Error("ERR unknown command 'NOSUCH'".to_string())
        );
        assert_eq!(action, Action::Continue);
    }

    #[test]
    fn registration_is_last_write_wins() {
        let first: Executor = Arc::new(|_, _, _, _| Ok(Frame::Integer(1)));
        let second: Executor = Arc::new(|_, _, _, _| Ok(Frame::Integer(2)));
        let mut session = Session::new(1);

        let mut dispatcher = Dispatcher::new();
        dispatcher.register("CUSTOM", first.clone());
        dispatcher.register("CUSTOM", second.clone());
        let (res, _) = dispatcher.execute(&mut session, request(&["CUSTOM"]));
        assert_eq!(res, Frame::Integer(2));

        // And the reverse ordering.
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("CUSTOM", second);
        dispatcher.register("CUSTOM", first);
        let (res, _) = dispatcher.execute(&mut session, request(&["CUSTOM"]));
        assert_eq!(res, Frame::Integer(1));
    }

    #[test]
    fn nested_request_arrays_are_unwrapped() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        let nested = vec![Frame::Array(vec![Frame::Array(request(&[
            "ECHO", "hello",
        ]))])];
        let (res, _) = dispatcher.execute(&mut session, nested);

        assert_eq!(res, Frame::Bulk(Bytes::from("hello")));
    }

    #[test]
    fn quit_closes_after_its_response() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        let (res, action) = dispatcher.execute(&mut session, request(&["QUIT"]));

        assert_eq!(res, Frame::Simple("OK".to_string()));
        assert_eq!(action, Action::Close);
    }

    #[test]
    fn data_verb_without_user_handler_is_a_system_error() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        let (res, action) = dispatcher.execute(&mut session, request(&["GET", "key"]));

        assert_eq!(res, Frame::Error("ERR internal error".to_string()));
        assert_eq!(action, Action::Continue);
    }

    #[test]
    fn missing_argument_names_verb_and_parameter() {
        let dispatcher = dispatcher_with_store();
        let mut session = Session::new(1);

        let (res, _) = dispatcher.execute(&mut session, request(&["SET", "key"]));

        assert_eq!(
            res,
            Frame::Error("ERR missing argument 'value' for 'SET' command".to_string())
        );
    }

    #[test]
    fn setnx_synthesizes_the_nx_option() {
        let dispatcher = dispatcher_with_store();
        let mut session = Session::new(1);

        let (first, _) = dispatcher.execute(&mut session, request(&["SETNX", "k", "value0"]));
        let (second, _) = dispatcher.execute(&mut session, request(&["SETNX", "k", "value1"]));
        let (get, _) = dispatcher.execute(&mut session, request(&["GET", "k"]));

        assert_eq!(first, Frame::Integer(1));
        assert_eq!(second, Frame::Integer(0));
        assert_eq!(get, Frame::Bulk(Bytes::from("value0")));
    }

    #[test]
    fn getset_synthesizes_the_get_option() {
        let dispatcher = dispatcher_with_store();
        let mut session = Session::new(1);

        let (first, _) = dispatcher.execute(&mut session, request(&["GETSET", "k", "value0"]));
        let (second, _) = dispatcher.execute(&mut session, request(&["GETSET", "k", "value1"]));

        assert_eq!(first, Frame::Null);
        assert_eq!(second, Frame::Bulk(Bytes::from("value0")));
    }

    #[test]
    fn tracer_sees_every_dispatched_verb() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut dispatcher = Dispatcher::new();
        dispatcher.set_tracer(Arc::new(|_, verb| {
            assert_eq!(verb, "PING");
            CALLS.fetch_add(1, Ordering::Relaxed);
        }));

        let mut session = Session::new(1);
        dispatcher.execute(&mut session, request(&["ping"]));

        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn empty_request_is_recoverable() {
        let dispatcher = Dispatcher::new();
        let mut session = Session::new(1);

        let (res, action) = dispatcher.execute(&mut session, vec![]);

        assert!(matches!(res, Frame::Error(_)));
        assert_eq!(action, Action::Continue);
    }
}
