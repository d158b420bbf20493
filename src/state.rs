//! Immutable state snapshots handed to the screens that need them.
//!
//! Updates return a new value; nothing is patched in place.

use std::sync::Arc;

use crate::comments::{self, CommentNode};
use crate::models::{Comment, MangaId, User, UserId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthState {
    user: Option<User>,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(&self, user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out(&self) -> Self {
        Self::anonymous()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    /// True when the signed-in user wrote `comment`.
    pub fn owns(&self, comment: &Comment) -> bool {
        self.is_signed_in() && comment.user_id.is_some() && comment.user_id == self.user_id()
    }
}

/// Reply forest built from one fetched batch, shared cheaply with the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentThread {
    manga_id: MangaId,
    roots: Arc<[CommentNode]>,
    total: usize,
}

impl CommentThread {
    pub fn empty(manga_id: MangaId) -> Self {
        Self {
            manga_id,
            roots: Arc::from(Vec::new()),
            total: 0,
        }
    }

    pub fn from_batch(manga_id: MangaId, batch: &[Comment]) -> Self {
        let roots = comments::build_tree(batch);
        let total = comments::count_visible(&roots);
        Self {
            manga_id,
            roots: Arc::from(roots),
            total,
        }
    }

    pub fn manga_id(&self) -> MangaId {
        self.manga_id
    }

    pub fn roots(&self) -> &[CommentNode] {
        &self.roots
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn rows(&self) -> Vec<(usize, &CommentNode)> {
        comments::flatten(&self.roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: UserId) -> User {
        User { id, username: format!("u{id}"), email: None }
    }

    fn comment(id: u64, parent_id: Option<u64>, user_id: Option<UserId>) -> Comment {
        Comment {
            id,
            parent_id,
            user_id,
            author_name: String::new(),
            body: String::new(),
            created_at: None,
            like_count: 0,
        }
    }

    #[test]
    fn sign_in_returns_new_snapshot() {
        let anon = AuthState::anonymous();
        let signed = anon.signed_in(user(3));

        assert!(!anon.is_signed_in());
        assert!(signed.is_signed_in());
        assert_eq!(signed.user_id(), Some(3));
        assert!(!signed.signed_out().is_signed_in());
    }

    #[test]
    fn ownership_requires_matching_user() {
        let auth = AuthState::anonymous().signed_in(user(3));
        assert!(auth.owns(&comment(1, None, Some(3))));
        assert!(!auth.owns(&comment(1, None, Some(4))));
        assert!(!auth.owns(&comment(1, None, None)));
        assert!(!AuthState::anonymous().owns(&comment(1, None, Some(3))));
    }

    #[test]
    fn thread_counts_and_rows() {
        let batch = vec![
            comment(1, None, None),
            comment(2, Some(1), None),
            comment(3, Some(42), None),
        ];
        let thread = CommentThread::from_batch(9, &batch);

        assert_eq!(thread.manga_id(), 9);
        assert_eq!(thread.total(), 3);
        let rows: Vec<(usize, u64)> = thread.rows().into_iter().map(|(d, n)| (d, n.id())).collect();
        assert_eq!(rows, vec![(0, 1), (1, 2), (0, 3)]);
        assert_eq!(thread, CommentThread::from_batch(9, &batch));
    }
}
