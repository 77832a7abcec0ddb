use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::database::{Comment, CommentRow};

/// 缓存的帖子数上限，超过后整体清空
const MAX_CACHED_POSTS: usize = 1024;

/// 由扁平行组装评论树
///
/// `previous` 是上一次组装结果的索引。某条评论自身字段和所有回复的指针都没变时，
/// 直接复用旧的 `Arc`，因此只有发生变化的节点及其祖先会得到新的引用。
/// 从根开始自上而下遍历，父节点不在结果中的行会被丢弃。
pub fn assemble(rows: &[CommentRow], previous: &HashMap<Uuid, Arc<Comment>>) -> Vec<Arc<Comment>> {
    let mut children: HashMap<Option<Uuid>, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        children.entry(row.parent_comment_id).or_default().push(index);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            (rows[*a].created_at, rows[*a].id).cmp(&(rows[*b].created_at, rows[*b].id))
        });
    }

    let roots = children.get(&None).cloned().unwrap_or_default();
    let mut built: HashMap<Uuid, Arc<Comment>> = HashMap::with_capacity(rows.len());

    // 后序遍历：子节点先于父节点构建
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|i| (*i, false)).collect();
    while let Some((index, expanded)) = stack.pop() {
        let row = &rows[index];
        let kids = children.get(&Some(row.id));

        if !expanded {
            stack.push((index, true));
            if let Some(kids) = kids {
                stack.extend(kids.iter().rev().map(|i| (*i, false)));
            }
            continue;
        }

        let replies: Vec<Arc<Comment>> = kids
            .map(|kids| {
                kids.iter()
                    .filter_map(|i| built.get(&rows[*i].id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let node = match previous.get(&row.id) {
            Some(old) if old.matches_row(row) && same_replies(&old.replies, &replies) => old.clone(),
            _ => Arc::new(Comment::from_row(row, replies)),
        };
        built.insert(row.id, node);
    }

    roots
        .iter()
        .filter_map(|i| built.get(&rows[*i].id).cloned())
        .collect()
}

fn same_replies(old: &[Arc<Comment>], new: &[Arc<Comment>]) -> bool {
    old.len() == new.len() && old.iter().zip(new).all(|(a, b)| Arc::ptr_eq(a, b))
}

/// 整棵树按评论ID建立索引
pub fn index(roots: &[Arc<Comment>]) -> HashMap<Uuid, Arc<Comment>> {
    let mut index = HashMap::new();
    let mut stack: Vec<&Arc<Comment>> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        index.insert(node.id, node.clone());
        stack.extend(node.replies.iter());
    }
    index
}

/// 每个帖子最近一次组装的评论树，用于在多次请求之间保持节点引用稳定
#[derive(Default)]
pub struct ThreadCache {
    threads: Mutex<HashMap<Uuid, Vec<Arc<Comment>>>>,
}

impl ThreadCache {
    pub fn refresh(&self, post_id: Uuid, rows: &[CommentRow]) -> Vec<Arc<Comment>> {
        let mut threads = match self.threads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let previous = threads.get(&post_id).map(|roots| index(roots)).unwrap_or_default();
        let roots = assemble(rows, &previous);

        if threads.len() >= MAX_CACHED_POSTS && !threads.contains_key(&post_id) {
            tracing::debug!("Thread cache full, clearing {} posts", threads.len());
            threads.clear();
        }
        threads.insert(post_id, roots.clone());
        roots
    }
}
