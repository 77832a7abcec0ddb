use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::StoreError;
use crate::database::models::comment::{CommentRow, NewComment};

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// 某帖子下的全部评论（扁平），按创建时间升序
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRow>, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError>;

    async fn create(&self, comment: &NewComment) -> Result<CommentRow, StoreError>;
}

#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRow>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.author_id, c.parent_comment_id, c.content,
                   c.created_at, c.updated_at,
                   p.username AS author_username,
                   p.display_name AS author_display_name,
                   p.avatar_url AS author_avatar_url
            FROM comments c
            JOIN profiles p ON p.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.author_id, c.parent_comment_id, c.content,
                   c.created_at, c.updated_at,
                   p.username AS author_username,
                   p.display_name AS author_display_name,
                   p.avatar_url AS author_avatar_url
            FROM comments c
            JOIN profiles p ON p.id = c.author_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn create(&self, comment: &NewComment) -> Result<CommentRow, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, parent_comment_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id, post_id, author_id, parent_comment_id, content, created_at, updated_at
            )
            SELECT i.id, i.post_id, i.author_id, i.parent_comment_id, i.content,
                   i.created_at, i.updated_at,
                   p.username AS author_username,
                   p.display_name AS author_display_name,
                   p.avatar_url AS author_avatar_url
            FROM inserted i
            JOIN profiles p ON p.id = i.author_id
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.parent_comment_id)
        .bind(&comment.content)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created comment {} on post {}", row.id, row.post_id);
        Ok(row)
    }
}
