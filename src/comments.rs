//! Flat comment batches to nested reply threads.
//!
//! Reply chains can be arbitrarily deep, so every walk over the forest
//! (building, counting, comparing, dropping) uses an explicit stack.

use std::collections::HashMap;

use crate::models::{Comment, CommentId};

/// Comments at this depth or deeper no longer accept replies.
pub const MAX_DEPTH: usize = 4;

#[derive(Debug)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn id(&self) -> CommentId {
        self.comment.id
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &Self) -> bool {
        let ours = flatten(std::slice::from_ref(self));
        let theirs = flatten(std::slice::from_ref(other));
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|((da, a), (db, b))| da == db && a.comment == b.comment)
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Builds the reply forest for one batch.
///
/// Roots and children keep the encounter order of `comments`. A comment whose
/// parent is missing from the batch is placed at the root. Every input record
/// appears exactly once in the result; a reference cycle is broken at the
/// first member of the cycle in input order, which becomes a root.
pub fn build_tree(comments: &[Comment]) -> Vec<CommentNode> {
    let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(comments.len());
    for (i, comment) in comments.iter().enumerate() {
        index.entry(comment.id).or_insert(i);
    }

    let mut parent_of: Vec<Option<usize>> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| {
            c.parent_id
                .and_then(|pid| index.get(&pid).copied())
                .filter(|&p| p != i)
        })
        .collect();

    let mut children = child_lists(&parent_of);
    let mut reachable = vec![false; comments.len()];
    for root in (0..comments.len()).filter(|&i| parent_of[i].is_none()) {
        mark_reachable(root, &children, &mut reachable);
    }
    for i in 0..comments.len() {
        if reachable[i] {
            continue;
        }
        log::warn!("comment {} is part of a reply cycle, promoting to root", comments[i].id);
        if let Some(p) = parent_of[i].take() {
            children[p].retain(|&c| c != i);
        }
        mark_reachable(i, &children, &mut reachable);
    }

    let roots: Vec<usize> = (0..comments.len()).filter(|&i| parent_of[i].is_none()).collect();
    assemble(&roots, comments, &children)
}

/// Counts every node in the forest, replies included.
pub fn count_visible(nodes: &[CommentNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&CommentNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

pub fn can_reply(depth: usize, signed_in: bool) -> bool {
    signed_in && depth < MAX_DEPTH
}

/// Depth-first display order with each node's nesting level.
pub fn flatten(nodes: &[CommentNode]) -> Vec<(usize, &CommentNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &CommentNode)> = nodes.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push((depth, node));
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
    }
    out
}

fn child_lists(parent_of: &[Option<usize>]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::new(); parent_of.len()];
    for (i, parent) in parent_of.iter().enumerate() {
        if let Some(p) = parent {
            children[*p].push(i);
        }
    }
    children
}

fn mark_reachable(start: usize, children: &[Vec<usize>], reachable: &mut [bool]) {
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if reachable[i] {
            continue;
        }
        reachable[i] = true;
        stack.extend(children[i].iter().copied());
    }
}

/// Post-order assembly: a node is built once all of its children are.
fn assemble(roots: &[usize], comments: &[Comment], children: &[Vec<usize>]) -> Vec<CommentNode> {
    let mut built: Vec<Option<CommentNode>> = (0..comments.len()).map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            let kids = children[i].iter().filter_map(|&c| built[c].take()).collect();
            built[i] = Some(CommentNode {
                comment: comments[i].clone(),
                children: kids,
            });
        } else {
            stack.push((i, true));
            stack.extend(children[i].iter().rev().map(|&c| (c, false)));
        }
    }
    roots.iter().filter_map(|&r| built[r].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: CommentId, parent_id: Option<CommentId>) -> Comment {
        Comment {
            id,
            parent_id,
            user_id: Some(7),
            author_name: format!("user{id}"),
            body: format!("comment {id}"),
            created_at: None,
            like_count: 0,
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<CommentId> {
        nodes.iter().map(CommentNode::id).collect()
    }

    #[test]
    fn orphan_is_promoted_to_root() {
        let batch = vec![comment(1, None), comment(2, Some(1)), comment(3, Some(99))];
        let tree = build_tree(&batch);

        assert_eq!(ids(&tree), vec![1, 3]);
        assert_eq!(ids(&tree[0].children), vec![2]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn child_listed_before_parent_is_still_nested() {
        let batch = vec![comment(5, Some(4)), comment(4, None), comment(6, Some(4))];
        let tree = build_tree(&batch);

        assert_eq!(ids(&tree), vec![4]);
        assert_eq!(ids(&tree[0].children), vec![5, 6]);
    }

    #[test]
    fn empty_batch() {
        assert!(build_tree(&[]).is_empty());
        assert_eq!(count_visible(&[]), 0);
    }

    #[test]
    fn count_includes_every_level() {
        let batch = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, Some(3)),
            comment(5, None),
        ];
        let tree = build_tree(&batch);
        assert_eq!(count_visible(&tree), 5);
    }

    #[test]
    fn self_reference_becomes_root() {
        let batch = vec![comment(1, Some(1))];
        let tree = build_tree(&batch);
        assert_eq!(ids(&tree), vec![1]);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn cycle_is_broken_without_losing_comments() {
        let batch = vec![comment(1, Some(2)), comment(2, Some(1)), comment(3, None)];
        let tree = build_tree(&batch);

        assert_eq!(count_visible(&tree), 3);
        assert_eq!(ids(&tree), vec![1, 3]);
        assert_eq!(ids(&tree[0].children), vec![2]);
    }

    #[test]
    fn flatten_yields_depths_in_display_order() {
        let batch = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, None),
            comment(5, Some(1)),
        ];
        let tree = build_tree(&batch);
        let flat: Vec<(usize, CommentId)> =
            flatten(&tree).into_iter().map(|(d, n)| (d, n.id())).collect();

        assert_eq!(flat, vec![(0, 1), (1, 2), (2, 3), (1, 5), (0, 4)]);
    }

    #[test]
    fn reply_only_below_max_depth() {
        assert!(can_reply(0, true));
        assert!(can_reply(MAX_DEPTH - 1, true));
        assert!(!can_reply(MAX_DEPTH, true));
        assert!(!can_reply(0, false));
    }
}
