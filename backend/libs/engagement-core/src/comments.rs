use std::sync::Arc;
use tracing::{info, instrument};

use crate::collaborators::EntityDirectory;
use crate::error::{EngagementError, Result};
use crate::model::{Comment, EntityId, EntityKind, NewComment};
use crate::refresh::{RefreshHandle, RefreshJob};
use crate::store::CounterStore;

pub const MAX_COMMENT_CHARS: usize = 1000;
pub const MAX_COMMENT_PAGE_SIZE: u32 = 100;

/// Comments are append-only edges: each post adds one to the video's
/// comment count and each retraction takes one away.
pub struct CommentLedger {
    store: Arc<dyn CounterStore>,
    directory: Arc<dyn EntityDirectory>,
    refresh: RefreshHandle,
}

impl CommentLedger {
    pub fn new(store: Arc<dyn CounterStore>, directory: Arc<dyn EntityDirectory>, refresh: RefreshHandle) -> Self {
        Self {
            store,
            directory,
            refresh,
        }
    }

    #[instrument(skip(self, content))]
    pub async fn post(
        &self,
        user_id: EntityId,
        video_id: EntityId,
        content: &str,
        parent_id: Option<EntityId>,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngagementError::Validation("comment content is empty".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(EngagementError::Validation(format!(
                "comment exceeds {} characters",
                MAX_COMMENT_CHARS
            )));
        }
        if !self.directory.exists(EntityKind::Video, video_id).await? {
            return Err(EngagementError::NotFound(format!("video {} does not exist", video_id)));
        }

        let comment = self
            .store
            .insert_comment(NewComment {
                video_id,
                user_id,
                parent_id: parent_id.filter(|id| *id > 0),
                content: content.to_string(),
            })
            .await?;

        self.refresh.schedule(RefreshJob::Comment { video_id, delta: 1 });

        info!(comment_id = comment.id, video_id, user_id, "Comment posted");
        Ok(comment)
    }

    /// Only the comment's author may retract it.
    #[instrument(skip(self))]
    pub async fn retract(&self, user_id: EntityId, comment_id: EntityId, video_id: EntityId) -> Result<()> {
        self.store
            .soft_delete_comment(comment_id, video_id, user_id)
            .await?;
        self.refresh.schedule(RefreshJob::Comment { video_id, delta: -1 });
        Ok(())
    }

    /// Live comments, newest first. `page` starts at 1.
    pub async fn list(&self, video_id: EntityId, page: u32, page_size: u32) -> Result<Vec<Comment>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_COMMENT_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(page_size);

        self.store
            .list_comments(video_id, i64::from(page_size), offset)
            .await
    }
}
