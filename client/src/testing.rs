//! In-memory transport for exercising the core without a subprocess.

use std::mem;

use crate::client::Transport;
use crate::error::BridgeError;
use crate::protocol::{Command, Outcome};

type Handler = Box<dyn FnMut(&Command) -> Outcome>;

/// Transport that answers each command through a closure and records every
/// command it was asked to carry, in order.
pub(crate) struct ScriptedServer {
    handler: Handler,
    commands: Vec<Command>,
    generation: u64,
    respawn_pending: bool,
}

impl ScriptedServer {
    pub fn new(handler: impl FnMut(&Command) -> Outcome + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            commands: Vec::new(),
            generation: 1,
            respawn_pending: false,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Labels of the recorded commands, e.g. `["reset name", "tell struct", "seek exact"]`.
    pub fn labels(&self) -> Vec<String> {
        self.commands.iter().map(Command::label).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Pretend the server process was replaced.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Pretend the process died; the next call lands on a replacement.
    pub fn respawn_on_next_call(&mut self) {
        self.respawn_pending = true;
    }
}

impl Transport for ScriptedServer {
    async fn call(&mut self, command: &Command) -> Result<Outcome, BridgeError> {
        if mem::take(&mut self.respawn_pending) {
            self.generation += 1;
        }
        self.commands.push(command.clone());
        Ok((self.handler)(command))
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}
