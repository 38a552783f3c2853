use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};
use crate::identifier::Identifier;

/// A statement within a procedural block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Statement {
    /// An ordinary SQL statement. Its contents are opaque here.
    Sql {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        span: Option<Range<usize>>,
    },
    /// A nested block-bearing statement.
    Block(Block),
    /// `LEAVE label`
    Leave(LabelReference),
    /// `ITERATE label`
    Iterate(LabelReference),
}

impl Statement {
    pub fn sql(text: impl Into<String>) -> Self {
        Statement::Sql {
            text: text.into(),
            span: None,
        }
    }

    pub fn leave(target: impl Into<Identifier>) -> Self {
        Statement::Leave(LabelReference::new(target))
    }

    pub fn iterate(target: impl Into<Identifier>) -> Self {
        Statement::Iterate(LabelReference::new(target))
    }

    /// The label reference of a `LEAVE`/`ITERATE`, if this is one.
    pub fn transfer(&self) -> Option<(TransferKind, &LabelReference)> {
        match self {
            Statement::Leave(reference) => Some((TransferKind::Leave, reference)),
            Statement::Iterate(reference) => Some((TransferKind::Iterate, reference)),
            Statement::Sql { .. } | Statement::Block(_) => None,
        }
    }
}

impl From<Block> for Statement {
    fn from(block: Block) -> Self {
        Statement::Block(block)
    }
}

/// Which control-transfer statement holds a label reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Leave,
    Iterate,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Leave => write!(f, "LEAVE"),
            TransferKind::Iterate => write!(f, "ITERATE"),
        }
    }
}

/// Outcome of resolving a label reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// The resolution pass has not run yet.
    #[default]
    Unresolved,
    /// The nearest enclosing block carrying the label.
    Resolved(BlockId),
    /// No enclosing block carries the label.
    NotFound,
}

impl Resolution {
    pub fn block(self) -> Option<BlockId> {
        match self {
            Resolution::Resolved(id) => Some(id),
            Resolution::Unresolved | Resolution::NotFound => None,
        }
    }

    pub fn is_settled(self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

/// The label operand of a `LEAVE` or `ITERATE` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelReference {
    pub target: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Range<usize>>,
    #[serde(skip)]
    resolution: Resolution,
}

impl LabelReference {
    pub fn new(target: impl Into<Identifier>) -> Self {
        LabelReference {
            target: target.into(),
            span: None,
            resolution: Resolution::Unresolved,
        }
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn resolved_block(&self) -> Option<BlockId> {
        self.resolution.block()
    }

    /// Record the outcome of the resolution pass. A reference settles once;
    /// settling it again fails with the resolution it already holds.
    pub fn settle(&mut self, outcome: Option<BlockId>) -> Result<(), Resolution> {
        if self.resolution.is_settled() {
            return Err(self.resolution);
        }
        self.resolution = match outcome {
            Some(id) => Resolution::Resolved(id),
            None => Resolution::NotFound,
        };
        Ok(())
    }

    /// Return to `Unresolved` so a new resolution pass can run.
    pub fn reset(&mut self) {
        self.resolution = Resolution::Unresolved;
    }
}
