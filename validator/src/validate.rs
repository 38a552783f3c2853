use std::ops::Range;

use procsql::Procedure;
use procsql::block::{Block, BlockId};
use procsql::statement::{LabelReference, Resolution, Statement, TransferKind};
use procsql::{Identifier, NameMatcher};

use crate::config::{UnresolvedLabelPolicy, ValidatorConfig};
use crate::error::{DiagnosticError, ValidationError};
use crate::resolver::resolve;
use crate::scope::ScopeTree;

/// Resolves the labels of procedure bodies and checks their label usage.
///
/// Holds only configuration, so one validator can serve many procedures,
/// including from several threads.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Validator { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn name_matcher(&self) -> NameMatcher {
        self.config.name_matcher()
    }

    /// Resolve every `LEAVE`/`ITERATE` in `procedure` and check its labels.
    ///
    /// Each label reference ends up `Resolved` or `NotFound`. Diagnostics are
    /// in source order. Returns the warnings when nothing was an error, and
    /// every diagnostic otherwise.
    pub fn validate(
        &self,
        procedure: &mut Procedure,
    ) -> Result<Vec<DiagnosticError>, Vec<DiagnosticError>> {
        procedure.reset_resolutions();
        let tree = ScopeTree::build(&procedure.body);

        let mut pass = Pass {
            tree: &tree,
            matcher: self.name_matcher(),
            policy: self.config.unresolved_label_policy(),
            source_id: procedure.source_id,
            blocks: procedure
                .body
                .blocks()
                .map(|(_, block)| BlockSummary {
                    kind: block.kind.describe(),
                    iteration: block.kind.is_iteration(),
                    span: block.span.clone(),
                })
                .collect(),
            next_block: 0,
            diagnostics: Vec::new(),
        };
        pass.visit_block(&mut procedure.body);

        let diagnostics = pass.diagnostics;
        let errors = diagnostics.iter().filter(|d| !d.is_warning).count();
        tracing::debug!(
            procedure = %procedure.name,
            blocks = tree.len(),
            errors,
            warnings = diagnostics.len() - errors,
            "validated procedure"
        );
        if errors == 0 {
            Ok(diagnostics)
        } else {
            Err(diagnostics)
        }
    }

    /// The `(statement, target, resolution)` of every `LEAVE`/`ITERATE` in
    /// `procedure`, in source order.
    pub fn resolutions(procedure: &Procedure) -> Vec<(TransferKind, Identifier, Resolution)> {
        procedure
            .transfers()
            .into_iter()
            .map(|(kind, reference)| (kind, reference.target.clone(), reference.resolution()))
            .collect()
    }
}

struct BlockSummary {
    kind: &'static str,
    iteration: bool,
    span: Option<Range<usize>>,
}

/// State of one top-down walk over a procedure body.
struct Pass<'a> {
    tree: &'a ScopeTree,
    matcher: NameMatcher,
    policy: UnresolvedLabelPolicy,
    source_id: usize,
    /// Per-block facts indexed by `BlockId`, gathered before the body is
    /// borrowed mutably.
    blocks: Vec<BlockSummary>,
    /// `BlockId` of the next block the walk will enter; the walk is
    /// pre-order, matching the scope tree.
    next_block: usize,
    diagnostics: Vec<DiagnosticError>,
}

impl Pass<'_> {
    fn visit_block(&mut self, block: &mut Block) {
        let id = BlockId::new(self.next_block);
        self.next_block += 1;

        if let Some(label) = &block.label {
            if !block.kind.accepts_label() {
                self.error(
                    ValidationError::LabelNotAllowed {
                        label: label.clone(),
                        kind: block.kind.describe(),
                    },
                    block.span.clone(),
                );
            }
        }

        for stmt in &mut block.statements {
            match stmt {
                Statement::Block(child) => self.visit_block(child),
                Statement::Leave(reference) => self.visit_transfer(id, TransferKind::Leave, reference),
                Statement::Iterate(reference) => {
                    self.visit_transfer(id, TransferKind::Iterate, reference)
                }
                Statement::Sql { .. } => {}
            }
        }

        // The end label follows the children in the source.
        if let Some(end) = &block.end_label {
            let matches = block
                .label
                .as_ref()
                .is_some_and(|start| self.matcher.matches(start, end));
            if !matches {
                self.error(
                    ValidationError::LabelMismatch {
                        start: block.label.clone(),
                        end: end.clone(),
                    },
                    block.span.clone(),
                );
            }
        }
    }

    fn visit_transfer(&mut self, container: BlockId, kind: TransferKind, reference: &mut LabelReference) {
        // The walk numbers blocks in the same pre-order as the scope tree.
        let start = self
            .tree
            .scope_of(container)
            .expect("visited block has no scope");
        let found = resolve(self.tree, start, &reference.target, self.matcher);
        if let Err(previous) = reference.settle(found) {
            tracing::warn!(label = %reference.target, ?previous, "label reference already settled");
        }

        match found {
            None => {
                let error = ValidationError::UnresolvedLabel {
                    statement: kind,
                    label: reference.target.clone(),
                };
                match self.policy {
                    UnresolvedLabelPolicy::Error => self.error(error, reference.span.clone()),
                    UnresolvedLabelPolicy::Warn => self.diagnostics.push(DiagnosticError::warning(
                        error,
                        reference.span.clone(),
                        self.source_id,
                    )),
                    UnresolvedLabelPolicy::Ignore => {
                        tracing::debug!(label = %reference.target, "ignoring unresolved label")
                    }
                }
            }
            Some(target) if kind == TransferKind::Iterate => {
                let summary = &self.blocks[target.index()];
                if !summary.iteration {
                    let mut diag = DiagnosticError::error(
                        ValidationError::IterateTargetNotIteration {
                            label: reference.target.clone(),
                            kind: summary.kind,
                        },
                        reference.span.clone(),
                        self.source_id,
                    )
                    .with_note("ITERATE may only name a WHILE, LOOP or REPEAT statement");
                    if let Some(span) = &summary.span {
                        diag = diag.with_secondary(
                            span.clone(),
                            format!("label declared by this {}", summary.kind),
                        );
                    }
                    self.diagnostics.push(diag);
                }
            }
            Some(_) => {}
        }
    }

    fn error(&mut self, error: ValidationError, span: Option<Range<usize>>) {
        self.diagnostics
            .push(DiagnosticError::error(error, span, self.source_id));
    }
}
