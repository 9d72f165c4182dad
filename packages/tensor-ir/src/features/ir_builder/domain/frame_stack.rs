//! LIFO stack of active frames
//!
//! Nesting rules:
//! - Module: only on an empty stack
//! - Function: on an empty stack or directly inside a Module
//! - Block: directly inside Function, Then or Else; dataflow blocks only
//!   directly inside a Function
//! - If: directly inside a plain Block, never under a dataflow block
//! - Then/Else: directly inside an If

use super::frame::{Frame, FrameKind};
use crate::features::ir_builder::errors::{BuilderError, BuilderResult};

/// Identity of a pushed frame, unique within one builder session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

#[derive(Debug)]
struct Entry {
    id: FrameId,
    frame: Frame,
}

#[derive(Debug, Default)]
pub struct FrameStack {
    entries: Vec<Entry>,
    next_id: u64,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push `frame` after checking that its kind may nest here
    pub fn enter(&mut self, frame: Frame) -> BuilderResult<FrameId> {
        self.check_nesting(frame.kind())?;
        let id = FrameId(self.next_id);
        self.next_id += 1;
        tracing::trace!(kind = %frame.kind(), depth = self.depth(), "enter frame");
        self.entries.push(Entry { id, frame });
        Ok(id)
    }

    /// Pop the top frame
    pub fn exit(&mut self) -> BuilderResult<Frame> {
        let entry = self
            .entries
            .pop()
            .ok_or_else(|| BuilderError::frame_stack("exit", "no active frame"))?;
        tracing::trace!(kind = %entry.frame.kind(), depth = self.depth(), "exit frame");
        Ok(entry.frame)
    }

    pub fn current(&self) -> BuilderResult<&Frame> {
        self.entries
            .last()
            .map(|e| &e.frame)
            .ok_or_else(|| BuilderError::frame_stack("current", "no active frame"))
    }

    pub fn current_mut(&mut self) -> BuilderResult<&mut Frame> {
        self.entries
            .last_mut()
            .map(|e| &mut e.frame)
            .ok_or_else(|| BuilderError::frame_stack("current", "no active frame"))
    }

    pub fn current_kind(&self) -> Option<FrameKind> {
        self.entries.last().map(|e| e.frame.kind())
    }

    pub fn current_id(&self) -> Option<FrameId> {
        self.entries.last().map(|e| e.id)
    }

    /// Position of a frame counted from the bottom
    pub fn position(&self, id: FrameId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn get(&self, pos: usize) -> Option<&Frame> {
        self.entries.get(pos).map(|e| &e.frame)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Frame> {
        self.entries.get_mut(pos).map(|e| &mut e.frame)
    }

    /// Frames from top to bottom
    pub fn iter_from_top(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter().rev().map(|e| &e.frame)
    }

    /// Position of the nearest frame of `kind`, searching from the top
    pub fn find(&self, kind: FrameKind) -> Option<usize> {
        self.entries.iter().rposition(|e| e.frame.kind() == kind)
    }

    /// Drop `id` and every frame above it without finalizing them.
    ///
    /// Returns the number of frames discarded.
    pub fn discard_from(&mut self, id: FrameId) -> usize {
        match self.position(id) {
            Some(pos) => {
                let dropped = self.entries.len() - pos;
                self.entries.truncate(pos);
                dropped
            }
            None => 0,
        }
    }

    fn check_nesting(&self, kind: FrameKind) -> BuilderResult<()> {
        let top = self.current_kind();
        let legal = match kind {
            FrameKind::Module => top.is_none(),
            FrameKind::Function => matches!(top, None | Some(FrameKind::Module)),
            FrameKind::Block { is_dataflow: true } => top == Some(FrameKind::Function),
            FrameKind::Block { is_dataflow: false } => matches!(
                top,
                Some(FrameKind::Function | FrameKind::Then | FrameKind::Else)
            ),
            FrameKind::If => {
                top == Some(FrameKind::Block { is_dataflow: false })
                    && self.find(FrameKind::Block { is_dataflow: true }).is_none()
            }
            FrameKind::Then | FrameKind::Else => top == Some(FrameKind::If),
        };
        if legal {
            Ok(())
        } else {
            let found = top.map(|k| k.name()).unwrap_or("empty stack");
            Err(BuilderError::frame_stack(
                "enter",
                format!("cannot open a {} frame on top of {}", kind, found),
            ))
        }
    }
}
