use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::comments::ThreadView;

/// 帖子页的界面状态，全部放在查询参数里
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ThreadQuery {
    pub reply_to: Option<String>,
    /// 逗号分隔的评论ID
    pub collapsed: Option<String>,
}

impl ThreadQuery {
    pub fn view(&self, can_reply: bool) -> ThreadView {
        let collapsed: HashSet<Uuid> = self
            .collapsed
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| Uuid::parse_str(id.trim()).ok())
            .collect();

        ThreadView {
            replying_to: self
                .reply_to
                .as_deref()
                .and_then(|id| Uuid::parse_str(id.trim()).ok()),
            collapsed,
            can_reply,
        }
    }
}
