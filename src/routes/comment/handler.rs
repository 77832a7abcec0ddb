use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use minijinja::context;
use uuid::Uuid;

use crate::{
    AppState,
    comments::json::write_thread,
    database::{Comment, NewComment},
    error::AppError,
    middleware::CurrentSession,
    result::ActionResult,
    routes::{ActionForm, page_error},
    utils::raw_success_response,
    validation::{CreateCommentSchema, Schema},
};

use super::model::ThreadQuery;

/// 读取帖子的评论并更新缓存的评论树
async fn load_thread(state: &AppState, post_id: Uuid) -> Result<Vec<Arc<Comment>>, AppError> {
    let rows = state.comments.list_for_post(post_id).await?;
    Ok(state.threads.refresh(post_id, &rows))
}

async fn submit_comment(
    state: &AppState,
    session: CurrentSession,
    form: CreateCommentSchema,
) -> Result<ActionResult, AppError> {
    let session = session.require()?;

    let form = form.normalize();
    form.check()?;
    let post_id = form
        .post_id()
        .ok_or_else(|| AppError::Validation("Invalid identifier".into()))?;

    let parent_comment_id = match form.parent_comment_id() {
        Some(parent_id) => {
            let parent = state
                .comments
                .find(parent_id)
                .await?
                .ok_or(AppError::NotFound("Parent comment"))?;
            if parent.post_id != post_id {
                return Err(AppError::Validation(
                    "Reply must belong to the same post".into(),
                ));
            }
            Some(parent.id)
        }
        None => None,
    };

    let created = state
        .comments
        .create(&NewComment {
            post_id,
            author_id: session.user_id,
            parent_comment_id,
            content: form.content,
        })
        .await?;

    Ok(ActionResult::success().redirect(format!("/posts/{}#comment-{}", post_id, created.id)))
}

#[axum::debug_handler]
pub async fn create_comment(
    State(state): State<AppState>,
    session: CurrentSession,
    ActionForm(form): ActionForm<CreateCommentSchema>,
) -> ActionResult {
    submit_comment(&state, session, form)
        .await
        .unwrap_or_else(ActionResult::from)
}

#[axum::debug_handler]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let thread = load_thread(&state, post_id).await?;
    Ok(raw_success_response(&write_thread(&thread)?))
}

async fn render_post(
    state: &AppState,
    session: &CurrentSession,
    post_id: Uuid,
    query: &ThreadQuery,
) -> Result<Response, AppError> {
    let roots = load_thread(state, post_id).await?;
    let total: usize = roots.iter().map(|root| root.thread_size()).sum();
    let view = query.view(session.is_signed_in());

    let thread = {
        let mut renderer = match state.renderer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        renderer.render_thread(&state.views, &roots, &view)?
    };

    let page = state.views.page(
        "post.html",
        context! {
            viewer => session.is_signed_in(),
            post_id => post_id,
            total => total,
            thread => thread,
        },
    )?;
    Ok(page.into_response())
}

#[axum::debug_handler]
pub async fn post_page(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(post_id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Response {
    render_post(&state, &session, post_id, &query)
        .await
        .unwrap_or_else(page_error)
}
