use rustc_hash::FxHashMap;

use super::Ty;
use crate::diagnostics::CompileError;

/// Where a name's value lives in the method being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Arg(u16),
    Local(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Ty,
    pub slot: Slot,
}

/// Lexical scopes of one method body. Names are unique across the whole
/// active stack: an inner block cannot redeclare an outer name.
#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<FxHashMap<String, Binding>>,
    pushed: usize,
    popped: usize,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
        self.pushed += 1;
    }

    pub fn pop(&mut self) {
        if self.frames.pop().is_some() {
            self.popped += 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames opened and closed so far.
    pub fn tally(&self) -> (usize, usize) {
        (self.pushed, self.popped)
    }

    /// Every push has been matched by a pop.
    pub fn is_balanced(&self) -> bool {
        self.pushed == self.popped && self.frames.is_empty()
    }

    pub fn declare(&mut self, name: &str, binding: Binding) -> Result<(), CompileError> {
        if self.lookup(name).is_some() {
            return Err(CompileError::unlocated(format!("variable '{name}' is already defined")));
        }
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| CompileError::unlocated(format!("cannot declare '{name}' outside a block")))?;
        frame.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}
