//! Link API endpoints and the public click-through redirect.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AddLinkForm, Link, ReorderLinksRequest, ReorderResult};
use crate::store::MutationError;
use crate::AppState;

/// POST /api/profiles/{slug}/links - Append a link to a profile.
pub async fn add_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(form): Form<AddLinkForm>,
) -> ApiResult<Link> {
    let Some(new_link) = form.into_new_link() else {
        return Err(AppError::Validation(
            "Title, URL, and description are all required".to_string(),
        ));
    };

    let link = state.repo.create_link(&slug, &new_link).await?;
    tracing::info!("Added link {} '{}' to profile '{}'", link.id, link.title, slug);

    success(link)
}

/// POST /api/profiles/{slug}/links/{id}/delete - Remove a link.
pub async fn delete_link(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, u64)>,
) -> ApiResult<()> {
    if !state.repo.delete_link(&slug, id).await? {
        return Err(link_not_found(&slug, id));
    }

    success(())
}

/// POST /api/profiles/{slug}/order - Set new ordinals for several links.
///
/// Each link is updated in its own transaction; ids that no longer exist are
/// reported rather than failing the whole request.
pub async fn reorder_links(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<ReorderLinksRequest>,
) -> ApiResult<ReorderResult> {
    let mut result = ReorderResult::default();

    for item in request.orders {
        match state.repo.update_link_order(&slug, item.id, item.order).await {
            Ok(_) => result.updated.push(item.id),
            Err(MutationError::NotFound { .. }) => result.missing.push(item.id),
            Err(e) => return Err(e.into()),
        }
    }

    success(result)
}

/// GET /{slug}/link/{id} - Count a click and redirect to the link target.
///
/// Answers `302 Found` with the stored URL verbatim, so `mailto:` and other
/// schemes work too.
pub async fn link_redirect(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, u64)>,
) -> Result<Response, AppError> {
    let link = state
        .repo
        .get_link(&slug, id)
        .await?
        .filter(|link| link.is_active)
        .ok_or_else(|| link_not_found(&slug, id))?;

    if let Err(e) = state.repo.increment_link_clicks(&slug, id).await {
        tracing::warn!("Failed to record click on link {} of '{}': {}", id, slug, e);
    }

    let location = HeaderValue::from_str(&link.url)
        .map_err(|_| AppError::Internal(format!("Link {} has an unusable target URL", id)))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

fn link_not_found(slug: &str, id: u64) -> AppError {
    AppError::NotFound(format!("Link {} not found in profile {}", id, slug))
}
