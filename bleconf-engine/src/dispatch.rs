//! Command dispatch.
//!
//! A read-only map from command id to handler, built once at engine
//! construction. Unknown command ids are logged and produce no
//! response, unlike authorization failures which answer with an
//! explicit status frame.

use crate::session::EngineState;
use bleconf_protocol::Cursor;
use std::collections::HashMap;
use tracing::warn;

/// A command handler. Returns whether the command was handled
/// successfully; emitting a response frame is the handler's own
/// responsibility through [`EngineState::send_frame`].
pub type Handler = Box<dyn Fn(&mut EngineState, &mut Cursor<'_>) -> bool + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<u8, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cmd: u8, handler: Handler) {
        self.handlers.insert(cmd, handler);
    }

    /// Invokes the handler for `cmd` with a cursor over the payload.
    /// Unknown ids are dropped silently apart from a warning.
    pub fn dispatch(&self, cmd: u8, state: &mut EngineState, cursor: &mut Cursor<'_>) -> bool {
        match self.handlers.get(&cmd) {
            Some(handler) => handler(state, cursor),
            None => {
                warn!(cmd, "ignoring unknown command");
                false
            }
        }
    }
}
