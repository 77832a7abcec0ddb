use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use crate::error::AppError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("settings.html", include_str!("../templates/settings.html")),
    ("confirm_email.html", include_str!("../templates/confirm_email.html")),
    ("error.html", include_str!("../templates/error.html")),
    ("auth_code_error.html", include_str!("../templates/auth_code_error.html")),
    ("post.html", include_str!("../templates/post.html")),
    ("comment.html", include_str!("../templates/comment.html")),
];

/// 页面模板，`.html` 模板默认开启 HTML 转义
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context)
    }

    pub fn page<S: Serialize>(&self, name: &str, context: S) -> Result<Html<String>, AppError> {
        Ok(Html(self.render(name, context)?))
    }
}
