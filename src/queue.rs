//! FIFO command queue with a single executing slot

use crate::command::RemoteCommand;
use std::collections::VecDeque;
use uuid::Uuid;

/// Pending commands, oldest first, plus the one currently executing
#[derive(Debug, Default)]
pub struct CommandQueue {
    waiting: VecDeque<RemoteCommand>,
    executing: Option<RemoteCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: RemoteCommand) {
        self.waiting.push_back(command);
    }

    pub fn dequeue(&mut self) -> Option<RemoteCommand> {
        self.waiting.pop_front()
    }

    /// Number of waiting commands (the executing slot is not counted)
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn pending(&self) -> Vec<RemoteCommand> {
        self.waiting.iter().cloned().collect()
    }

    pub fn set_executing(&mut self, command: Option<RemoteCommand>) {
        self.executing = command;
    }

    pub fn executing(&self) -> Option<&RemoteCommand> {
        self.executing.as_ref()
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<&RemoteCommand> {
        self.waiting
            .iter()
            .find(|c| c.id == id)
            .or_else(|| self.executing.as_ref().filter(|c| c.id == id))
    }

    /// Remove a waiting command. The executing command cannot be removed.
    pub fn remove_by_id(&mut self, id: Uuid) -> bool {
        if self.executing.as_ref().is_some_and(|c| c.id == id) {
            return false;
        }
        match self.waiting.iter().position(|c| c.id == id) {
            Some(idx) => self.waiting.remove(idx).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
        self.executing = None;
    }
}
