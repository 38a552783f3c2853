use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use procsql::block::{Block, BlockId};
use procsql::Identifier;

/// Source of the tag that ties each [`ScopeId`] to its tree.
static NEXT_TREE: AtomicU64 = AtomicU64::new(0);

/// Index of a [`Scope`] within the [`ScopeTree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    tree: u64,
    index: usize,
}

impl ScopeId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// Validation-time mirror of one block's position in the nesting tree.
#[derive(Debug, Clone)]
pub struct Scope {
    /// The block this scope stands for.
    pub block: BlockId,
    /// Enclosing scope; `None` for the procedure body.
    pub parent: Option<ScopeId>,
    /// The block's leading label, if any.
    pub label: Option<Identifier>,
    /// Whether the block is a `WHILE`, `LOOP` or `REPEAT`.
    pub iteration: bool,
    /// Nesting depth; the body is 0.
    pub depth: usize,
}

/// One scope per block of a procedure body, stored in pre-order so that a
/// parent always precedes its children.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    tag: u64,
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// Walk `root` once and create a scope for every block under it.
    pub fn build(root: &Block) -> ScopeTree {
        let tag = NEXT_TREE.fetch_add(1, Ordering::Relaxed);
        let mut scopes = Vec::new();
        push_scope(&mut scopes, tag, root, None, 0);
        tracing::debug!(tree = tag, scopes = scopes.len(), "built scope tree");
        ScopeTree { tag, scopes }
    }

    fn id(&self, index: usize) -> ScopeId {
        ScopeId {
            tree: self.tag,
            index,
        }
    }

    /// Scope of the procedure body.
    pub fn root(&self) -> ScopeId {
        self.id(0)
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this tree.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        assert_eq!(
            id.tree, self.tag,
            "scope id #{} belongs to another scope tree",
            id.index
        );
        &self.scopes[id.index]
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).parent
    }

    /// The scope standing for `block`, if the block belongs to this tree.
    pub fn scope_of(&self, block: BlockId) -> Option<ScopeId> {
        self.scopes
            .get(block.index())
            .filter(|scope| scope.block == block)
            .map(|_| self.id(block.index()))
    }

    /// `id` followed by each enclosing scope out to the root.
    pub fn ancestors(&self, id: ScopeId) -> Ancestors<'_> {
        // Validate up front so a foreign id fails here, not mid-walk.
        let _ = self.scope(id);
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(index, scope)| (self.id(index), scope))
    }
}

fn push_scope(
    scopes: &mut Vec<Scope>,
    tree: u64,
    block: &Block,
    parent: Option<ScopeId>,
    depth: usize,
) {
    let id = ScopeId {
        tree,
        index: scopes.len(),
    };
    tracing::trace!(
        scope = id.index,
        parent = ?parent.map(ScopeId::index),
        label = ?block.label.as_ref().map(|l| l.to_string()),
        "scope"
    );
    scopes.push(Scope {
        block: BlockId::new(id.index),
        parent,
        label: block.label.clone(),
        iteration: block.kind.is_iteration(),
        depth,
    });
    for child in block.children() {
        push_scope(scopes, tree, child, Some(id), depth + 1);
    }
}

/// Iterator over a scope and its enclosing scopes. See [`ScopeTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a ScopeTree,
    next: Option<ScopeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = (ScopeId, &'a Scope);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let scope = self.tree.scope(id);
        self.next = scope.parent;
        Some((id, scope))
    }
}

impl fmt::Display for ScopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scope in &self.scopes {
            write!(f, "{}{}", "  ".repeat(scope.depth), scope.block)?;
            if let Some(label) = &scope.label {
                write!(f, " {}:", label)?;
            }
            if scope.iteration {
                write!(f, " (loop)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
