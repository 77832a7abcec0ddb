use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{Comment, CommentAuthor};

/// 单条评论除回复外的字段
#[derive(Serialize)]
struct CommentFields<'a> {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    parent_comment_id: Option<Uuid>,
    content: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: &'a CommentAuthor,
}

impl<'a> From<&'a Comment> for CommentFields<'a> {
    fn from(comment: &'a Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            parent_comment_id: comment.parent_comment_id,
            content: &comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            author: &comment.author,
        }
    }
}

enum Step<'a> {
    Open { comment: &'a Comment, first: bool },
    Close,
}

fn siblings(nodes: &[Arc<Comment>]) -> impl Iterator<Item = Step<'_>> {
    nodes.iter().enumerate().rev().map(|(i, comment)| Step::Open {
        comment,
        first: i == 0,
    })
}

/// 评论树写成嵌套 JSON 数组，每个节点带 `replies` 字段
///
/// 用显式栈遍历，任意深度都不会耗尽调用栈。
pub fn write_thread(roots: &[Arc<Comment>]) -> Result<String, serde_json::Error> {
    let mut out = String::from("[");
    let mut stack: Vec<Step<'_>> = siblings(roots).collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Close => out.push_str("]}"),
            Step::Open { comment, first } => {
                if !first {
                    out.push(',');
                }
                let fields = serde_json::to_string(&CommentFields::from(comment))?;
                // 去掉结尾的 '}'，接上 replies
                out.push_str(&fields[..fields.len() - 1]);
                out.push_str(",\"replies\":[");
                stack.push(Step::Close);
                stack.extend(siblings(&comment.replies));
            }
        }
    }

    out.push(']');
    Ok(out)
}
