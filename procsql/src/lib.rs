pub mod block;
pub mod error;
pub mod identifier;
pub mod name_matcher;
pub mod statement;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};
use crate::statement::{LabelReference, TransferKind};

pub use error::LoadError;
pub use identifier::Identifier;
pub use name_matcher::NameMatcher;

/// A stored-procedure body ready for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    /// Name from `CREATE PROCEDURE`.
    pub name: String,
    /// SQL text the spans index into, when the host kept it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The outermost block of the body.
    pub body: Block,
    /// The source file ID (for error reporting with codespan-reporting).
    #[serde(skip)]
    pub source_id: usize,
}

impl Procedure {
    pub fn new(name: impl Into<String>, body: Block) -> Self {
        Procedure {
            name: name.into(),
            source: None,
            body,
            source_id: 0,
        }
    }

    /// Read a procedure document from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a procedure document from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Look up a block by its pre-order position in the body.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.body.blocks().nth(id.index()).map(|(_, block)| block)
    }

    /// Every `LEAVE`/`ITERATE` reference in the body, in source order.
    pub fn transfers(&self) -> Vec<(TransferKind, &LabelReference)> {
        self.body.transfers()
    }

    /// Put every label reference back to `Unresolved`.
    pub fn reset_resolutions(&mut self) {
        self.body.for_each_transfer_mut(&mut |_, reference| reference.reset());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::block::BlockKind;
    use crate::statement::{Resolution, Statement};

    const DOCUMENT: &str = r#"
name = "foo"

[body]
kind = "begin-end"
label = "label1"

[[body.statements]]
type = "sql"
text = "select a from abc"

[[body.statements]]
type = "block"
kind = "while"
condition = "bar = 1"
label = "loop1"
end-label = "loop1"

[[body.statements.statements]]
type = "leave"
target = "label1"
span = { start = 40, end = 53 }
"#;

    #[test]
    fn reads_nested_blocks_from_toml() {
        let procedure = Procedure::from_toml_str(DOCUMENT).expect("document should load");
        assert_eq!(procedure.name, "foo");
        assert_eq!(procedure.body.kind, BlockKind::BeginEnd);
        assert_eq!(procedure.body.label, Some(Identifier::regular("label1")));
        assert_eq!(procedure.body.statements.len(), 2);

        let inner = procedure.block(BlockId::new(1)).expect("while loop");
        assert_eq!(
            inner.kind,
            BlockKind::While {
                condition: "bar = 1".to_string()
            }
        );
        assert_eq!(inner.end_label, Some(Identifier::regular("loop1")));
        match &inner.statements[0] {
            Statement::Leave(reference) => {
                assert_eq!(reference.target.name(), "label1");
                assert_eq!(reference.span, Some(40..53));
                assert_eq!(reference.resolution(), Resolution::Unresolved);
            }
            other => panic!("expected LEAVE, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_block_kind() {
        let text = "name = \"p\"\n[body]\nkind = \"for-each\"\n";
        assert!(matches!(
            Procedure::from_toml_str(text),
            Err(LoadError::Toml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        let procedure = Procedure::load(file.path()).unwrap();
        assert_eq!(procedure.transfers().len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Procedure::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn reset_clears_every_reference() {
        let mut procedure = Procedure::new(
            "p",
            Block::begin_end()
                .with_statement(Statement::leave("a"))
                .with_statement(Block::new(BlockKind::Loop).with_statement(Statement::iterate("b"))),
        );
        procedure
            .body
            .for_each_transfer_mut(&mut |_, reference| reference.settle(None).unwrap());
        assert!(procedure.transfers().iter().all(|(_, r)| r.resolution().is_settled()));

        procedure.reset_resolutions();
        assert!(procedure.transfers().iter().all(|(_, r)| !r.resolution().is_settled()));
    }
}
