use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use loandesk_core::errors::ApplicationError;
use loandesk_core::templates::{
    CustomerData, EmailTemplate, RenderedEmail, TemplateCatalog, TemplateSummary,
};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::lookup::{api_error, ApiError};

#[derive(Clone)]
pub struct TemplateState {
    catalog: Arc<TemplateCatalog>,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub success: bool,
    pub templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub success: bool,
    pub requested: String,
    pub matched: bool,
    pub template: EmailTemplate,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub success: bool,
    pub matched: bool,
    pub email: RenderedEmail,
}

pub fn router(catalog: Arc<TemplateCatalog>) -> Router {
    Router::new()
        .route("/api/v1/templates", get(list_templates))
        .route("/api/v1/templates/{stage}", get(show_template))
        .route("/api/v1/templates/{stage}/render", post(render_template))
        .with_state(TemplateState { catalog })
}

pub async fn list_templates(State(state): State<TemplateState>) -> Json<TemplateListResponse> {
    Json(TemplateListResponse { success: true, templates: state.catalog.summary() })
}

pub async fn show_template(
    State(state): State<TemplateState>,
    Path(stage): Path<String>,
) -> Json<TemplateResponse> {
    let template = state.catalog.lookup(&stage);
    Json(TemplateResponse {
        success: true,
        matched: !template.is_fallback(),
        requested: stage,
        template,
    })
}

pub async fn render_template(
    State(state): State<TemplateState>,
    Path(stage): Path<String>,
    payload: Result<Json<CustomerData>, JsonRejection>,
) -> Result<Json<RenderResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(customer) = payload.map_err(|rejection| {
        warn!(
            event_name = "http.templates.rejected_body",
            correlation_id = %correlation_id,
            error = %rejection,
            "render body was not valid customer data"
        );
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError { success: false, error: "Invalid customer data".to_string() }),
        )
    })?;

    let template = state.catalog.lookup(&stage);
    let email = state.catalog.render(&template, &customer).map_err(|render_error| {
        error!(
            event_name = "http.templates.render_failed",
            correlation_id = %correlation_id,
            stage = template.key,
            error = %render_error,
            "template rendering failed"
        );
        api_error(ApplicationError::Rendering(render_error.to_string()), &correlation_id)
    })?;

    Ok(Json(RenderResponse { success: true, matched: !template.is_fallback(), email }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        extract::{Path, State},
        Json,
    };
    use loandesk_core::errors::ApplicationError;
use loandesk_core::templates::{CustomerData, TemplateCatalog};

    use super::{list_templates, render_template, show_template, TemplateState};

    fn state() -> TemplateState {
        TemplateState { catalog: Arc::new(TemplateCatalog::new().expect("templates")) }
    }

    #[tokio::test]
    async fn lists_six_stages() {
        let Json(response) = list_templates(State(state())).await;
        assert_eq!(response.templates.len(), 6);
        assert_eq!(response.templates[0].stage, "application");
    }

    #[tokio::test]
    async fn stage_aliases_resolve_and_unknown_stages_fall_back() {
        let Json(matched) = show_template(State(state()), Path("stage 2".to_string())).await;
        assert!(matched.matched);
        assert_eq!(matched.template.key, "document_submission");

        let Json(fallback) = show_template(State(state()), Path("closing".to_string())).await;
        assert!(!fallback.matched);
        assert_eq!(fallback.template.subject, "Update from Global Trust Bank");
    }

    #[tokio::test]
    async fn render_uses_customer_fields() {
        let Json(response) = render_template(
            State(state()),
            Path("5".to_string()),
            Ok(Json(CustomerData {
                customer_id: Some("C100".to_string()),
                name: Some("Priya Gupta".to_string()),
                ..CustomerData::default()
            })),
        )
        .await
        .expect("render");

        assert!(response.matched);
        assert_eq!(response.email.stage, "approval");
        assert!(response.email.body.contains("Dear <strong>Priya Gupta</strong>"));
    }
}
