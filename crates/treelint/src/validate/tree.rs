//! The basic dependency tree and the enhanced graph.
//!
//! A [`Tree`] is built from HEAD only, over words only. It is never assumed
//! to be a tree: cycles, self-loops and several roots are all representable,
//! and every traversal keeps a visited set so malformed input cannot make it
//! loop.

use super::BlockContext;
use crate::block::{Block, Column, Row};
use crate::grammar::{parse_deps, parse_head, universal_relation, Governor, EMPTY_FIELD};
use crate::incident::{Incident, TestClass};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

pub(super) const HEAD_SELF_LOOP: &str = "head-self-loop";
pub(super) const NON_TREE: &str = "non-tree";

/// Errors raised when a block cannot be turned into a [`Tree`].
///
/// The validator only builds trees from blocks whose references resolved, so
/// these indicate a broken invariant rather than bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A word's HEAD is not `0` or the index of another word.
    #[error("word {node} has unresolved HEAD '{head}'")]
    UnresolvedHead {
        /// The dependent word.
        node: usize,
        /// The raw HEAD field.
        head: String,
    },
}

/// Parent and children maps of the basic tree.
///
/// Node `0` is the virtual root; words are numbered from 1 in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    parents: Vec<usize>,
    children: Vec<Vec<usize>>,
    rows: Vec<usize>,
    self_loops: Vec<usize>,
}

impl Tree {
    /// Builds the tree from the HEAD column of every word in `block`.
    ///
    /// A word whose HEAD is its own index is recorded as a self-loop and left
    /// out of the children map.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnresolvedHead`] if a HEAD does not parse or names
    /// a word the block does not have.
    pub fn build(block: &Block) -> Result<Self, TreeError> {
        let rows: Vec<usize> = block
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.id().is_word())
            .map(|(index, _)| index)
            .collect();
        let count = rows.len();
        let mut parents = vec![0; count + 1];
        let mut children = vec![Vec::new(); count + 1];
        let mut self_loops = Vec::new();
        for (offset, &index) in rows.iter().enumerate() {
            let node = offset + 1;
            let raw = block.rows[index].field(Column::Head);
            let head = parse_head(raw)
                .filter(|head| *head <= count)
                .ok_or_else(|| TreeError::UnresolvedHead {
                    node,
                    head: raw.to_string(),
                })?;
            parents[node] = head;
            if head == node {
                self_loops.push(node);
            } else {
                children[head].push(node);
            }
        }
        Ok(Self {
            parents,
            children,
            rows,
            self_loops,
        })
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len() - 1
    }

    /// Whether the tree has no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The HEAD of word `node`; `None` for the root and unknown nodes.
    #[must_use]
    pub fn parent(&self, node: usize) -> Option<usize> {
        if node == 0 {
            return None;
        }
        self.parents.get(node).copied()
    }

    /// Direct dependents of `node` in ID order; `0` gives the root's.
    #[must_use]
    pub fn children(&self, node: usize) -> &[usize] {
        self.children.get(node).map_or(&[], Vec::as_slice)
    }

    /// Words attached directly to the virtual root.
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        self.children(0)
    }

    /// Words whose HEAD is themselves.
    #[must_use]
    pub fn self_loops(&self) -> &[usize] {
        &self.self_loops
    }

    /// The row of word `node` in the block the tree was built from.
    #[must_use]
    pub fn row<'b>(&self, block: &'b Block, node: usize) -> Option<&'b Row> {
        let index = self.rows.get(node.checked_sub(1)?)?;
        block.rows.get(*index)
    }

    /// Every node below `node`, not including `node` unless it lies on a
    /// cycle through it.
    #[must_use]
    pub fn descendants(&self, node: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.children(node).to_vec();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend_from_slice(self.children(next));
            }
        }
        seen
    }

    /// Words not reachable from the root, ascending.
    #[must_use]
    pub fn unreachable(&self) -> Vec<usize> {
        let reached = self.descendants(0);
        (1..=self.len()).filter(|node| !reached.contains(node)).collect()
    }

    /// Words strictly between `node` and its parent that the parent does not
    /// dominate. Empty for root attachments.
    #[must_use]
    pub fn gap(&self, node: usize) -> Vec<usize> {
        let Some((parent, lo, hi)) = self.arc(node) else {
            return Vec::new();
        };
        let dominated = self.descendants(parent);
        (lo + 1..hi).filter(|n| !dominated.contains(n)).collect()
    }

    /// The gap of every word, indexed by word; index 0 is always empty.
    ///
    /// Descendants are collected once per parent, so this is the way to ask
    /// about every word of a long sentence.
    #[must_use]
    pub fn gaps(&self) -> Vec<Vec<usize>> {
        let mut dominated: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        let mut gaps = vec![Vec::new(); self.len() + 1];
        for (node, gap) in gaps.iter_mut().enumerate().skip(1) {
            let Some((parent, lo, hi)) = self.arc(node) else {
                continue;
            };
            let below = dominated
                .entry(parent)
                .or_insert_with(|| self.descendants(parent));
            *gap = (lo + 1..hi).filter(|n| !below.contains(n)).collect();
        }
        gaps
    }

    /// Parent and the ordered ends of the edge above `node`, when a word lies
    /// strictly between them.
    fn arc(&self, node: usize) -> Option<(usize, usize, usize)> {
        let parent = self.parent(node).filter(|parent| *parent != 0)?;
        let (lo, hi) = if node < parent {
            (node, parent)
        } else {
            (parent, node)
        };
        (hi - lo >= 2).then_some((parent, lo, hi))
    }

    /// Whether the edge from `node` to its parent crosses a gap.
    #[must_use]
    pub fn is_nonprojective(&self, node: usize) -> bool {
        !self.gap(node).is_empty()
    }
}

fn join<T: ToString>(nodes: &[T]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Self-loops, root count and reachability of the basic tree.
pub(super) fn check_structure(ctx: &mut BlockContext<'_>, tree: &Tree) {
    let block = ctx.block;
    for &node in tree.self_loops() {
        let line = tree.row(block, node).map_or(0, Row::line);
        ctx.emit(
            Incident::error(
                TestClass::Syntax,
                HEAD_SELF_LOOP,
                format!("HEAD == ID for {node}."),
            )
            .at_line(line)
            .at_node(node),
        );
    }

    match tree.roots() {
        [] => ctx.emit(Incident::error(
            TestClass::Syntax,
            "missing-root",
            "Missing root: no word is attached to 0.",
        )),
        roots if roots.len() > 1 && ctx.config.single_root_required => {
            let line = tree.row(block, roots[1]).map_or(0, Row::line);
            ctx.emit(
                Incident::error(
                    TestClass::Syntax,
                    "multiple-roots",
                    format!("Multiple root words: {}.", join(roots)),
                )
                .at_line(line),
            );
        }
        _ => {}
    }

    let unreachable = tree.unreachable();
    if !unreachable.is_empty() {
        ctx.emit(Incident::error(
            TestClass::Syntax,
            NON_TREE,
            format!(
                "Non-tree structure. Words {} are not reachable from the root 0.",
                join(&unreachable)
            ),
        ));
    }
}

/// DEPS entries must be sorted by governor and must not point at their own
/// node.
pub(super) fn check_deps_order(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    for row in &block.rows {
        let Some(own) = row.id().node() else {
            continue;
        };
        let governors: Vec<Governor> = parse_deps(row.field(Column::Deps))
            .into_iter()
            .filter_map(Result::ok)
            .map(|edge| edge.governor)
            .collect();
        if governors.windows(2).any(|pair| pair[0] > pair[1]) {
            ctx.emit(
                Incident::error(
                    TestClass::Enhanced,
                    "unsorted-deps",
                    format!(
                        "DEPS not sorted by head index: '{}'.",
                        row.field(Column::Deps)
                    ),
                )
                .at_line(row.line())
                .at_node(row.id()),
            );
        }
        if governors.contains(&own) {
            ctx.emit(
                Incident::error(
                    TestClass::Enhanced,
                    "deps-self-loop",
                    format!("Self-loop in DEPS for {own}."),
                )
                .at_line(row.line())
                .at_node(row.id()),
            );
        }
    }
}

/// When the block has an enhanced graph, every word and empty node must be
/// reachable from the root through it.
pub(super) fn check_enhanced_connectivity(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let annotated = block.rows.iter().any(|row| {
        row.id().node().is_some() && row.field(Column::Deps) != EMPTY_FIELD
    });
    if !annotated {
        return;
    }
    let mut children: BTreeMap<Governor, Vec<Governor>> = BTreeMap::new();
    let mut nodes = Vec::new();
    for row in &block.rows {
        let Some(node) = row.id().node() else {
            continue;
        };
        nodes.push(node);
        for edge in parse_deps(row.field(Column::Deps)).into_iter().flatten() {
            children.entry(edge.governor).or_default().push(node);
        }
    }
    let mut reached = BTreeSet::new();
    let mut stack = vec![Governor::ROOT];
    while let Some(next) = stack.pop() {
        if let Some(deps) = children.get(&next) {
            for dep in deps {
                if reached.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }
    }
    let mut unreached: Vec<Governor> = nodes
        .into_iter()
        .filter(|node| !reached.contains(node))
        .collect();
    unreached.sort();
    if !unreached.is_empty() {
        ctx.emit(Incident::error(
            TestClass::Enhanced,
            "unconnected-egraph",
            format!(
                "Enhanced graph is not connected. Nodes {} are not reachable from 0.",
                join(&unreached)
            ),
        ));
    }
}

fn deprel(tree: &Tree, block: &Block, node: usize) -> Option<String> {
    tree.row(block, node)
        .map(|row| universal_relation(row.field(Column::Deprel)).to_string())
}

/// Punctuation must be attached projectively and must not make other
/// attachments non-projective.
pub(super) fn check_nonprojective_punct(ctx: &mut BlockContext<'_>, tree: &Tree) {
    let block = ctx.block;
    let gaps = tree.gaps();
    let mut caused_by: Vec<Vec<usize>> = vec![Vec::new(); gaps.len()];
    for (other, gap) in gaps.iter().enumerate() {
        for &inside in gap {
            caused_by[inside].push(other);
        }
    }
    for node in 1..=tree.len() {
        if deprel(tree, block, node).as_deref() != Some("punct") {
            continue;
        }
        let line = tree.row(block, node).map_or(0, Row::line);
        let gap = &gaps[node];
        if !gap.is_empty() {
            ctx.emit(
                Incident::error(
                    TestClass::Syntax,
                    "punct-is-nonproj",
                    format!(
                        "Punctuation must not be attached non-projectively over nodes {}.",
                        join(gap)
                    ),
                )
                .at_line(line)
                .at_node(node),
            );
        }
        let caused = &caused_by[node];
        if !caused.is_empty() {
            ctx.emit(
                Incident::error(
                    TestClass::Syntax,
                    "punct-causes-nonproj",
                    format!(
                        "Punctuation must not cause non-projectivity of nodes {}.",
                        join(caused)
                    ),
                )
                .at_line(line)
                .at_node(node),
            );
        }
    }
}

/// Coordinating conjunctions attached non-projectively are suspicious.
pub(super) fn check_nonprojective_cc(ctx: &mut BlockContext<'_>, tree: &Tree) {
    let block = ctx.block;
    let gaps = tree.gaps();
    for node in 1..=tree.len() {
        if deprel(tree, block, node).as_deref() != Some("cc") {
            continue;
        }
        let gap = &gaps[node];
        if !gap.is_empty() {
            let line = tree.row(block, node).map_or(0, Row::line);
            ctx.emit(
                Incident::warning(
                    TestClass::Syntax,
                    "cc-is-nonproj",
                    format!(
                        "Coordinating conjunction attached non-projectively over nodes {}.",
                        join(gap)
                    ),
                )
                .at_line(line)
                .at_node(node),
            );
        }
    }
}
