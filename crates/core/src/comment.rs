//! Comments and the comment store collaborator
//!
//! Comments are owned by the backend. The engine only reads the top-level
//! collection for positioning and calls the store on user actions. Replies are
//! loaded lazily and never positioned on their own.

use crate::annotation::Annotation;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Backend identifier of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of a user
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentUser {
    pub id: UserId,
    pub username: String,
}

impl CommentUser {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub user: CommentUser,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub num_replies: u32,

    /// Loaded on demand; `None` until the replies have been fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<Comment>>,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Only top-level comments take part in clustering and positioning
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Data for a new comment
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub content: String,
    pub user: CommentUser,
    pub annotation: Option<Annotation>,
    pub parent_id: Option<CommentId>,
    pub visibility: Visibility,
}

impl NewComment {
    /// A top-level comment anchored to a highlight
    pub fn on_annotation(
        user: CommentUser,
        content: impl Into<String>,
        annotation: Annotation,
    ) -> Self {
        Self {
            content: content.into(),
            user,
            annotation: Some(annotation),
            parent_id: None,
            visibility: Visibility::Public,
        }
    }

    /// A reply to an existing top-level comment
    pub fn reply(user: CommentUser, content: impl Into<String>, parent_id: CommentId) -> Self {
        Self {
            content: content.into(),
            user,
            annotation: None,
            parent_id: Some(parent_id),
            visibility: Visibility::Public,
        }
    }
}

/// Partial update of a comment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPatch {
    pub content: Option<String>,
    pub visibility: Option<Visibility>,

    /// New highlight color; geometry is never patched
    pub annotation_color: Option<String>,
}

impl CommentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self {
            annotation_color: Some(color.into()),
            ..Self::default()
        }
    }
}

/// Opaque pagination cursor handed out by [`CommentStore::list_top_level`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

/// One page of top-level comments
#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_cursor: Option<PageCursor>,
}

/// Comment persistence collaborator
///
/// Failures are reported through `StoreError`; the engine does not retry.
pub trait CommentStore {
    fn create(&mut self, data: NewComment) -> Result<CommentId, StoreError>;

    fn update(&mut self, id: CommentId, patch: CommentPatch) -> Result<(), StoreError>;

    /// Delete a comment together with its replies
    fn delete(&mut self, id: CommentId) -> Result<(), StoreError>;

    fn load_replies(&self, parent_id: CommentId) -> Result<Vec<Comment>, StoreError>;

    /// Current top-level collection, ordered by id
    fn top_level_comments(&self) -> Vec<Comment>;

    fn list_top_level(
        &self,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> Result<CommentPage, StoreError>;
}

/// In-memory comment store
///
/// Stands in for the backend in tests and in the CLI. Ids are assigned
/// sequentially and `num_replies` is kept in step with the stored replies.
#[derive(Debug)]
pub struct InMemoryCommentStore {
    comments: BTreeMap<CommentId, Comment>,
    next_id: i64,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self {
            comments: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Seed the store with existing comments (ids are kept)
    pub fn with_comments(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut store = Self::new();
        for comment in comments {
            store.next_id = store.next_id.max(comment.id.0.saturating_add(1));
            store.comments.insert(comment.id, comment);
        }
        store
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(&id)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    fn allocate_id(&mut self) -> Result<CommentId, StoreError> {
        let id = CommentId(self.next_id);
        if self.comments.contains_key(&id) {
            return Err(StoreError::Rejected("comment ids exhausted".to_string()));
        }
        self.next_id = self.next_id.saturating_add(1);
        Ok(id)
    }

    fn encode_cursor(id: CommentId) -> PageCursor {
        PageCursor(format!("after:{}", id.0))
    }

    fn decode_cursor(cursor: &PageCursor) -> Result<CommentId, StoreError> {
        cursor
            .0
            .strip_prefix("after:")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(CommentId)
            .ok_or_else(|| StoreError::InvalidCursor(cursor.0.clone()))
    }
}

impl Default for InMemoryCommentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentStore for InMemoryCommentStore {
    fn create(&mut self, data: NewComment) -> Result<CommentId, StoreError> {
        if let Some(parent_id) = data.parent_id {
            let parent = self.comments.get(&parent_id).ok_or(StoreError::NotFound(parent_id))?;
            if !parent.is_top_level() {
                return Err(StoreError::InvalidParent(parent_id));
            }
        }

        let id = self.allocate_id()?;
        if let Some(parent) = data.parent_id.and_then(|parent_id| self.comments.get_mut(&parent_id)) {
            parent.num_replies += 1;
            parent.replies = None;
        }

        let now = Utc::now();
        self.comments.insert(
            id,
            Comment {
                id,
                content: data.content,
                user: data.user,
                annotation: data.annotation,
                parent_id: data.parent_id,
                num_replies: 0,
                replies: None,
                visibility: data.visibility,
                created_at: now,
                updated_at: now,
            },
        );

        tracing::debug!(%id, "comment created");
        Ok(id)
    }

    fn update(&mut self, id: CommentId, patch: CommentPatch) -> Result<(), StoreError> {
        let comment = self.comments.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if let Some(content) = patch.content {
            comment.content = content;
        }
        if let Some(visibility) = patch.visibility {
            comment.visibility = visibility;
        }
        if let Some(color) = patch.annotation_color {
            if let Some(annotation) = comment.annotation.as_mut() {
                annotation.color = color;
            }
        }
        comment.updated_at = Utc::now();

        Ok(())
    }

    fn delete(&mut self, id: CommentId) -> Result<(), StoreError> {
        let removed = self.comments.remove(&id).ok_or(StoreError::NotFound(id))?;

        match removed.parent_id {
            Some(parent_id) => {
                if let Some(parent) = self.comments.get_mut(&parent_id) {
                    parent.num_replies = parent.num_replies.saturating_sub(1);
                    parent.replies = None;
                }
            }
            None => self.comments.retain(|_, comment| comment.parent_id != Some(id)),
        }

        tracing::debug!(%id, "comment deleted");
        Ok(())
    }

    fn load_replies(&self, parent_id: CommentId) -> Result<Vec<Comment>, StoreError> {
        if !self.comments.contains_key(&parent_id) {
            return Err(StoreError::NotFound(parent_id));
        }
        Ok(self
            .comments
            .values()
            .filter(|comment| comment.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    fn top_level_comments(&self) -> Vec<Comment> {
        self.comments.values().filter(|comment| comment.is_top_level()).cloned().collect()
    }

    fn list_top_level(
        &self,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> Result<CommentPage, StoreError> {
        let after = cursor.map(Self::decode_cursor).transpose()?;

        let mut remaining = self
            .comments
            .values()
            .filter(|comment| comment.is_top_level())
            .filter(|comment| after.map_or(true, |after| comment.id > after));

        let comments: Vec<Comment> = remaining.by_ref().take(limit).cloned().collect();
        let next_cursor = match (remaining.next(), comments.last()) {
            (Some(_), Some(last)) => Some(Self::encode_cursor(last.id)),
            _ => None,
        };

        Ok(CommentPage {
            comments,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::DEFAULT_HIGHLIGHT_COLOR;
    use crate::geometry::BoundingBox;

    fn user() -> CommentUser {
        CommentUser::new(7, "ada")
    }

    fn annotation() -> Annotation {
        Annotation::new(
            "text",
            vec![BoundingBox::clamped(1, 0.1, 0.1, 0.2, 0.02)],
            DEFAULT_HIGHLIGHT_COLOR,
            0,
        )
    }

    #[test]
    fn test_create_and_reply() {
        let mut store = InMemoryCommentStore::new();
        let parent = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        let reply = store.create(NewComment::reply(user(), "reply", parent)).unwrap();

        assert_eq!(store.get(parent).unwrap().num_replies, 1);
        assert_eq!(store.top_level_comments().len(), 1);

        let replies = store.load_replies(parent).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, reply);
    }

    #[test]
    fn test_default_store_numbers_from_one() {
        let mut store = InMemoryCommentStore::default();
        let id = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        assert_eq!(id, CommentId(1));
    }

    #[test]
    fn test_seeded_store_at_max_id_rejects_new_comments() {
        let mut source = InMemoryCommentStore::new();
        let id = source.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        let mut seeded = source.get(id).unwrap().clone();
        seeded.id = CommentId(i64::MAX);

        let mut store = InMemoryCommentStore::with_comments([seeded]);
        let result = store.create(NewComment::reply(user(), "reply", CommentId(i64::MAX)));
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert_eq!(store.get(CommentId(i64::MAX)).unwrap().num_replies, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reply_to_reply_is_rejected() {
        let mut store = InMemoryCommentStore::new();
        let parent = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        let reply = store.create(NewComment::reply(user(), "reply", parent)).unwrap();

        let result = store.create(NewComment::reply(user(), "nested", reply));
        assert_eq!(result, Err(StoreError::InvalidParent(reply)));
    }

    #[test]
    fn test_delete_removes_replies() {
        let mut store = InMemoryCommentStore::new();
        let parent = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        store.create(NewComment::reply(user(), "reply", parent)).unwrap();

        store.delete(parent).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.delete(parent), Err(StoreError::NotFound(parent)));
    }

    #[test]
    fn test_delete_reply_updates_count() {
        let mut store = InMemoryCommentStore::new();
        let parent = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();
        let reply = store.create(NewComment::reply(user(), "reply", parent)).unwrap();

        store.delete(reply).unwrap();
        assert_eq!(store.get(parent).unwrap().num_replies, 0);
    }

    #[test]
    fn test_update_patches_content_and_color() {
        let mut store = InMemoryCommentStore::new();
        let id = store.create(NewComment::on_annotation(user(), "top", annotation())).unwrap();

        store.update(id, CommentPatch::content("edited")).unwrap();
        store.update(id, CommentPatch::color("#00ff0080")).unwrap();

        let comment = store.get(id).unwrap();
        assert_eq!(comment.content, "edited");
        let stored = comment.annotation.as_ref().unwrap();
        assert_eq!(stored.color, "#00ff0080");
        assert_eq!(stored.bounding_boxes, annotation().bounding_boxes);
    }

    #[test]
    fn test_pagination() {
        let mut store = InMemoryCommentStore::new();
        for index in 0..5 {
            store
                .create(NewComment::on_annotation(user(), format!("c{index}"), annotation()))
                .unwrap();
        }

        let first = store.list_top_level(None, 2).unwrap();
        assert_eq!(first.comments.len(), 2);
        let cursor = first.next_cursor.expect("more pages");

        let second = store.list_top_level(Some(&cursor), 2).unwrap();
        assert_eq!(second.comments[0].id, CommentId(3));

        let last = store.list_top_level(second.next_cursor.as_ref(), 2).unwrap();
        assert_eq!(last.comments.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_invalid_cursor() {
        let store = InMemoryCommentStore::new();
        let result = store.list_top_level(Some(&PageCursor("bogus".to_string())), 10);
        assert!(matches!(result, Err(StoreError::InvalidCursor(_))));
    }

    #[test]
    fn test_comment_deserializes_from_backend_shape() {
        let json = r#"{
            "id": 12,
            "content": "nice",
            "user": {"id": 3, "username": "lin"},
            "annotation": null,
            "parentId": null,
            "numReplies": 2,
            "visibility": "private",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z"
        }"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.id, CommentId(12));
        assert!(comment.is_top_level());
        assert!(comment.replies.is_none());
        assert_eq!(comment.visibility, Visibility::Private);
    }
}
