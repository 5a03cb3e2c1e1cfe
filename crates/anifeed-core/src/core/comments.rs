//! Comment service: add, list and delete comments on activities.

use crate::comments::{self as thread, table_for, Comment, CommentRef, CommentRow, REPLY_DEPTH};
use crate::domain::ActivityTarget;
use crate::engagement::resolve_branch;
use crate::events::{CommentAdded, CommentDeleted, Event};
use crate::store::next_id;

use super::engagement::{require_activity, require_engageable};
use super::{require_text, require_user, CoreError, CoreResult, FeedServices};

/// Service for comment operations.
pub struct CommentService<'a> {
    services: &'a FeedServices,
}

impl<'a> CommentService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Add a root comment, or a reply when `parent_comment_id` is given.
    ///
    /// The parent must be a root comment on the same activity; replying to a
    /// reply fails with `InvalidDepth`.
    #[tracing::instrument(skip(self, content))]
    pub fn add(
        &self,
        viewer: i64,
        target: ActivityTarget,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> CoreResult<CommentRow> {
        require_text("content", content)?;

        self.services.write(|tx| {
            require_user(tx, viewer)?;
            let activity = require_engageable(tx, target)?;
            let key = activity.key();
            let branch = resolve_branch(tx, activity.id, &key)?;

            if let Some(parent) = parent_comment_id {
                match thread::parent_depth(tx, branch, &key, parent)? {
                    None => return Err(CoreError::not_found("comment", parent)),
                    Some(depth) if depth >= REPLY_DEPTH => {
                        return Err(CoreError::InvalidDepth {
                            parent_comment_id: parent,
                        })
                    }
                    Some(_) => {}
                }
            }

            let source = branch.comment_source();
            let comment_id = next_id(tx, table_for(source))?;
            self.services.emit(
                tx,
                viewer,
                Event::CommentAdded(CommentAdded {
                    comment_id,
                    target: key,
                    branch,
                    parent_comment_id,
                    content: content.to_string(),
                }),
            )?;
            thread::get_comment(
                tx,
                CommentRef {
                    source,
                    id: comment_id,
                },
            )?
            .ok_or_else(|| CoreError::not_found("comment", comment_id))
        })
    }

    /// Comments on an activity from the table family it currently uses.
    pub fn list(&self, target: ActivityTarget, viewer: Option<i64>) -> CoreResult<Vec<Comment>> {
        let conn = self.services.db().conn();
        let activity = require_activity(conn, target)?;
        let key = activity.key();
        let branch = resolve_branch(conn, activity.id, &key)?;
        Ok(thread::list_thread(conn, branch, &key, viewer)?)
    }

    /// Delete a comment and its replies. Only the author may delete.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, viewer: i64, comment: CommentRef) -> CoreResult<()> {
        self.services.write(|tx| {
            let row = thread::get_comment(tx, comment)?
                .ok_or_else(|| CoreError::not_found("comment", comment.id))?;
            if row.user_id != viewer {
                return Err(CoreError::NotAuthorized {
                    actor: viewer,
                    entity: "comment",
                    id: comment.id.to_string(),
                });
            }
            self.services.emit(
                tx,
                viewer,
                Event::CommentDeleted(CommentDeleted {
                    source: comment.source,
                    comment_id: comment.id,
                }),
            )?;
            Ok(())
        })
    }
}
