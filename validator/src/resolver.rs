use procsql::block::BlockId;
use procsql::{Identifier, NameMatcher};

use crate::scope::{ScopeId, ScopeTree};

/// Find the nearest block, starting at `start` and walking outward, whose
/// label matches `label` under `matcher`.
///
/// `start` is the scope of the block that directly contains the `LEAVE` or
/// `ITERATE`, so that block is itself a candidate. Unlabeled blocks are
/// passed through. The innermost match wins; an outer block reusing the
/// same label is shadowed. `None` means no enclosing block carries the
/// label.
///
/// # Panics
///
/// Panics if `start` was not produced by `tree`.
pub fn resolve(
    tree: &ScopeTree,
    start: ScopeId,
    label: &Identifier,
    matcher: NameMatcher,
) -> Option<BlockId> {
    let found = tree
        .ancestors(start)
        .find(|(_, scope)| {
            scope
                .label
                .as_ref()
                .is_some_and(|declared| matcher.matches(declared, label))
        })
        .map(|(_, scope)| scope.block);
    tracing::trace!(
        label = %label,
        start = start.index(),
        found = ?found.map(BlockId::index),
        "resolved label"
    );
    found
}

#[cfg(test)]
mod tests {
    use procsql::block::{Block, BlockKind};

    use super::*;

    fn ident(text: &str) -> Identifier {
        Identifier::parse(text)
    }

    fn innermost(tree: &ScopeTree) -> ScopeId {
        tree.iter()
            .max_by_key(|(_, scope)| scope.depth)
            .map(|(id, _)| id)
            .unwrap()
    }

    #[test]
    fn block_matches_its_own_label() {
        let tree = ScopeTree::build(&Block::begin_end().with_label("label1"));
        let found = resolve(&tree, tree.root(), &ident("label1"), NameMatcher::default());
        assert_eq!(found, Some(BlockId::ROOT));
    }

    #[test]
    fn walks_past_non_matching_labels() {
        let body = Block::begin_end()
            .with_label("label1")
            .with_statement(Block::begin_end().with_label("label2"));
        let tree = ScopeTree::build(&body);
        let inner = innermost(&tree);
        assert_eq!(
            resolve(&tree, inner, &ident("label1"), NameMatcher::default()),
            Some(BlockId::ROOT)
        );
        assert_eq!(
            resolve(&tree, inner, &ident("label2"), NameMatcher::default()),
            Some(BlockId::new(1))
        );
    }

    #[test]
    fn inner_label_shadows_outer() {
        let body = Block::begin_end()
            .with_label("label1")
            .with_statement(Block::begin_end().with_label("label1"));
        let tree = ScopeTree::build(&body);
        let found = resolve(&tree, innermost(&tree), &ident("label1"), NameMatcher::default());
        assert_eq!(found, Some(BlockId::new(1)));
    }

    #[test]
    fn unlabeled_blocks_are_transparent() {
        let body = Block::begin_end().with_label("outer").with_statement(
            Block::new(BlockKind::Loop).with_statement(Block::begin_end()),
        );
        let tree = ScopeTree::build(&body);
        let found = resolve(&tree, innermost(&tree), &ident("outer"), NameMatcher::default());
        assert_eq!(found, Some(BlockId::ROOT));
    }

    #[test]
    fn missing_label_is_none() {
        let tree = ScopeTree::build(&Block::begin_end());
        assert_eq!(
            resolve(&tree, tree.root(), &ident("label1"), NameMatcher::default()),
            None
        );
    }

    #[test]
    fn comparison_is_delegated_to_the_matcher() {
        let tree = ScopeTree::build(&Block::begin_end().with_label("Label1"));
        let reference = ident("LABEL1");
        assert_eq!(
            resolve(&tree, tree.root(), &reference, NameMatcher::CaseInsensitive),
            Some(BlockId::ROOT)
        );
        assert_eq!(
            resolve(&tree, tree.root(), &reference, NameMatcher::CaseSensitive),
            None
        );
    }

    #[test]
    #[should_panic(expected = "belongs to another scope tree")]
    fn start_from_another_tree_panics() {
        let big = ScopeTree::build(
            &Block::begin_end()
                .with_label("outer")
                .with_statement(Block::begin_end().with_label("inner")),
        );
        let small = ScopeTree::build(&Block::begin_end().with_label("inner"));
        resolve(&small, big.root(), &ident("inner"), NameMatcher::default());
    }

    #[test]
    fn repeated_lookups_agree() {
        let body = Block::begin_end()
            .with_label("a")
            .with_statement(Block::begin_end().with_label("b"));
        let tree = ScopeTree::build(&body);
        let start = innermost(&tree);
        for name in ["a", "b", "c"] {
            let first = resolve(&tree, start, &ident(name), NameMatcher::default());
            let second = resolve(&tree, start, &ident(name), NameMatcher::default());
            assert_eq!(first, second);
        }
    }
}
