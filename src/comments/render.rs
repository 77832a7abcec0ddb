use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::{Comment, CommentAuthor};
use crate::views::Views;

/// 页面上评论树的交互状态
#[derive(Debug, Clone, Default)]
pub struct ThreadView {
    /// 正在展开回复框的评论
    pub replying_to: Option<Uuid>,
    /// 折叠了回复的评论
    pub collapsed: HashSet<Uuid>,
    /// 已登录时才能回复
    pub can_reply: bool,
}

impl ThreadView {
    fn node(&self, comment: &Comment) -> NodeView {
        NodeView {
            collapsed: self.collapsed.contains(&comment.id),
            replying: self.replying_to == Some(comment.id),
            can_reply: self.can_reply,
        }
    }
}

/// 单个节点片段依赖的全部输入（节点本身之外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeView {
    collapsed: bool,
    replying: bool,
    can_reply: bool,
}

struct Fragment {
    // 持有节点，保证指针在缓存期间不会被复用
    node: Arc<Comment>,
    html: Arc<str>,
}

#[derive(Serialize)]
struct CommentContext<'a> {
    id: Uuid,
    post_id: Uuid,
    author: &'a CommentAuthor,
    content: &'a str,
    created_at: String,
    edited: bool,
    reply_count: usize,
    hidden_count: usize,
}

#[derive(Serialize)]
struct FragmentContext<'a> {
    comment: CommentContext<'a>,
    collapsed: bool,
    replying: bool,
    can_reply: bool,
}

/// 评论树渲染器
///
/// 每个节点的片段以 (节点指针, 节点视图状态) 为键缓存。节点引用不变且自身状态不变时
/// 直接复用片段，因此切换某条回复的回复框只会重新渲染这一条。
#[derive(Default)]
pub struct ThreadRenderer {
    fragments: HashMap<(usize, NodeView), Fragment>,
    renders: u64,
}

enum Step {
    Open(Arc<Comment>),
    Close { nested: bool },
}

impl ThreadRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模板实际执行的次数
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn cached_fragments(&self) -> usize {
        self.fragments.len()
    }

    pub fn render_thread(
        &mut self,
        views: &Views,
        roots: &[Arc<Comment>],
        view: &ThreadView,
    ) -> Result<String, minijinja::Error> {
        let mut out = String::from("<ul class=\"comment-thread\">");
        let mut stack: Vec<Step> = roots.iter().rev().cloned().map(Step::Open).collect();

        while let Some(step) = stack.pop() {
            match step {
                Step::Open(node) => {
                    let node_view = view.node(&node);
                    let html = self.fragment(views, &node, node_view)?;
                    let _ = write!(out, "<li class=\"comment\" id=\"comment-{}\">", node.id);
                    out.push_str(&html);

                    let nested = !node_view.collapsed && !node.replies.is_empty();
                    stack.push(Step::Close { nested });
                    if nested {
                        out.push_str("<ul class=\"replies\">");
                        stack.extend(node.replies.iter().rev().cloned().map(Step::Open));
                    }
                }
                Step::Close { nested } => {
                    if nested {
                        out.push_str("</ul>");
                    }
                    out.push_str("</li>");
                }
            }
        }

        out.push_str("</ul>");
        self.prune();
        Ok(out)
    }

    fn fragment(
        &mut self,
        views: &Views,
        node: &Arc<Comment>,
        node_view: NodeView,
    ) -> Result<Arc<str>, minijinja::Error> {
        let key = (Arc::as_ptr(node) as usize, node_view);
        if let Some(fragment) = self.fragments.get(&key) {
            return Ok(fragment.html.clone());
        }

        let context = FragmentContext {
            comment: CommentContext {
                id: node.id,
                post_id: node.post_id,
                author: &node.author,
                content: &node.content,
                created_at: node.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                edited: node.updated_at > node.created_at,
                reply_count: node.replies.len(),
                hidden_count: node.thread_size() - 1,
            },
            collapsed: node_view.collapsed,
            replying: node_view.replying,
            can_reply: node_view.can_reply,
        };
        let html: Arc<str> = views.render("comment.html", context)?.into();
        self.renders += 1;

        self.fragments.insert(
            key,
            Fragment {
                node: node.clone(),
                html: html.clone(),
            },
        );
        Ok(html)
    }

    /// 丢弃只被缓存自己引用的节点，这些节点已经不在任何评论树里
    pub fn prune(&mut self) {
        self.fragments
            .retain(|_, fragment| Arc::strong_count(&fragment.node) > 1);
    }
}
