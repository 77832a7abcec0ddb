use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// comments 与 profiles 联表查询得到的扁平行
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// 评论树节点，回复按创建时间排列
///
/// 层级不设上限，序列化见 `comments::json`，释放时逐层展开而不递归。
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: CommentAuthor,
    pub replies: Vec<Arc<Comment>>,
}

impl Comment {
    pub fn from_row(row: &CommentRow, replies: Vec<Arc<Comment>>) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            parent_comment_id: row.parent_comment_id,
            content: row.content.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            author: CommentAuthor {
                id: row.author_id,
                username: row.author_username.clone(),
                display_name: row.author_display_name.clone(),
                avatar_url: row.author_avatar_url.clone(),
            },
            replies,
        }
    }

    /// 自身字段与数据库行一致（不含回复）
    pub fn matches_row(&self, row: &CommentRow) -> bool {
        self.id == row.id
            && self.post_id == row.post_id
            && self.parent_comment_id == row.parent_comment_id
            && self.content == row.content
            && self.updated_at == row.updated_at
            && self.author.username == row.author_username
            && self.author.display_name == row.author_display_name
            && self.author.avatar_url == row.author_avatar_url
    }

    /// 包括所有后代在内的评论数
    pub fn thread_size(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&Comment> = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter().map(Arc::as_ref));
        }
        count
    }
}

impl Drop for Comment {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(reply) = pending.pop() {
            // 仍被其他树或渲染缓存引用的节点只减少计数
            if let Some(mut owned) = Arc::into_inner(reply) {
                pending.append(&mut owned.replies);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub content: String,
}
