use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;
use crate::statement::{LabelReference, Statement, TransferKind};

/// Identity of a block within one procedure body: its position in a
/// pre-order walk of the body, the outermost block being 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(usize);

impl BlockId {
    pub const ROOT: BlockId = BlockId(0);

    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The construct a block was written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BlockKind {
    /// `BEGIN ... END`
    BeginEnd,
    /// `WHILE condition DO ... END WHILE`
    While { condition: String },
    /// `LOOP ... END LOOP`
    Loop,
    /// `REPEAT ... UNTIL condition END REPEAT`
    Repeat { until: String },
    /// `IF ... END IF`; each arm is a `Branch` child.
    If,
    /// `CASE [operand] ... END CASE`; each arm is a `Branch` child.
    Case {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operand: Option<String>,
    },
    /// One arm of an `IF` or `CASE`. No condition means `ELSE`.
    Branch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
}

impl BlockKind {
    /// `WHILE`, `LOOP` and `REPEAT`: the only valid `ITERATE` targets.
    pub fn is_iteration(&self) -> bool {
        matches!(
            self,
            BlockKind::While { .. } | BlockKind::Loop | BlockKind::Repeat { .. }
        )
    }

    /// Only `BEGIN ... END` blocks and iteration statements may be labelled.
    pub fn accepts_label(&self) -> bool {
        matches!(self, BlockKind::BeginEnd) || self.is_iteration()
    }

    /// Short human-readable name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            BlockKind::BeginEnd => "BEGIN ... END block",
            BlockKind::While { .. } => "WHILE loop",
            BlockKind::Loop => "LOOP",
            BlockKind::Repeat { .. } => "REPEAT loop",
            BlockKind::If => "IF statement",
            BlockKind::Case { .. } => "CASE statement",
            BlockKind::Branch { condition: Some(_) } => "conditional branch",
            BlockKind::Branch { condition: None } => "ELSE branch",
        }
    }
}

/// A lexical region of procedural statements, optionally named by a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Block {
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Leading label (`label1: BEGIN`), as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Identifier>,
    /// Trailing label (`END WHILE label1`), as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_label: Option<Identifier>,
    /// Child statements in source order.
    #[serde(default)]
    pub statements: Vec<Statement>,
    /// Byte span in the procedure source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Range<usize>>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Block {
            kind,
            label: None,
            end_label: None,
            statements: Vec::new(),
            span: None,
        }
    }

    pub fn begin_end() -> Self {
        Block::new(BlockKind::BeginEnd)
    }

    pub fn with_label(mut self, label: impl Into<Identifier>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_end_label(mut self, label: impl Into<Identifier>) -> Self {
        self.end_label = Some(label.into());
        self
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_statement(mut self, statement: impl Into<Statement>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// Blocks that are direct children of this one, in source order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = &Block> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Block(block) => Some(block),
            _ => None,
        })
    }

    /// This block and every block nested in it, in pre-order, paired with
    /// the `BlockId` each would have if this block were a procedure body.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            stack: vec![self],
            next_index: 0,
        }
    }

    /// Every `LEAVE`/`ITERATE` reference under this block, in source order.
    pub fn transfers(&self) -> Vec<(TransferKind, &LabelReference)> {
        let mut out = Vec::new();
        collect_transfers(self, &mut out);
        out
    }

    /// Visit every `LEAVE`/`ITERATE` reference under this block mutably, in
    /// source order.
    pub fn for_each_transfer_mut(&mut self, f: &mut impl FnMut(TransferKind, &mut LabelReference)) {
        for stmt in &mut self.statements {
            match stmt {
                Statement::Block(block) => block.for_each_transfer_mut(f),
                Statement::Leave(reference) => f(TransferKind::Leave, reference),
                Statement::Iterate(reference) => f(TransferKind::Iterate, reference),
                Statement::Sql { .. } => {}
            }
        }
    }
}

fn collect_transfers<'a>(block: &'a Block, out: &mut Vec<(TransferKind, &'a LabelReference)>) {
    for stmt in &block.statements {
        match stmt {
            Statement::Block(child) => collect_transfers(child, out),
            Statement::Leave(reference) => out.push((TransferKind::Leave, reference)),
            Statement::Iterate(reference) => out.push((TransferKind::Iterate, reference)),
            Statement::Sql { .. } => {}
        }
    }
}

/// Pre-order iterator over a block tree. See [`Block::blocks`].
pub struct Blocks<'a> {
    stack: Vec<&'a Block>,
    next_index: usize,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.stack.pop()?;
        self.stack.extend(block.children().rev());
        let id = BlockId(self.next_index);
        self.next_index += 1;
        Some((id, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_numbered_in_pre_order() {
        // a: begin  b: begin  c: begin end  end  d: begin end  end
        let body = Block::begin_end()
            .with_label("a")
            .with_statement(
                Block::begin_end()
                    .with_label("b")
                    .with_statement(Block::begin_end().with_label("c")),
            )
            .with_statement(Statement::sql("select 1"))
            .with_statement(Block::begin_end().with_label("d"));

        let order: Vec<(usize, String)> = body
            .blocks()
            .map(|(id, b)| (id.index(), b.label.as_ref().unwrap().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "a".to_string()),
                (1, "b".to_string()),
                (2, "c".to_string()),
                (3, "d".to_string()),
            ]
        );
    }

    #[test]
    fn only_begin_end_and_loops_take_labels() {
        assert!(BlockKind::BeginEnd.accepts_label());
        assert!(BlockKind::Loop.accepts_label());
        assert!(BlockKind::While { condition: "x = 1".into() }.accepts_label());
        assert!(!BlockKind::If.accepts_label());
        assert!(!BlockKind::Branch { condition: None }.accepts_label());
        assert!(!BlockKind::BeginEnd.is_iteration());
    }

    #[test]
    fn transfers_follow_source_order() {
        let body = Block::begin_end()
            .with_statement(Statement::leave("a"))
            .with_statement(Block::new(BlockKind::Loop).with_statement(Statement::iterate("b")))
            .with_statement(Statement::leave("c"));

        let targets: Vec<String> = body
            .transfers()
            .into_iter()
            .map(|(kind, r)| format!("{} {}", kind, r.target))
            .collect();
        assert_eq!(targets, vec!["LEAVE a", "ITERATE b", "LEAVE c"]);
    }
}
