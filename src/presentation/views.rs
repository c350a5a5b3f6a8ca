use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::{ErrorReport, HttpError};
use crate::domain::products::PAGE_SIZE;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_fragment(template, "presentation::views::render_template")
        .map(Html)
        .map_err(HttpError::from)
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render a partial for embedding into a page or an SSE patch.
pub fn render_fragment<T: Template>(
    template: T,
    source: &'static str,
) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map_err(|err| TemplateRenderError::new(source, "Template rendering failed", err))
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(NotFoundTemplate, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate;

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate;

/// The products frame. Rendered without awaiting anything.
#[derive(Template)]
#[template(path = "products.html")]
pub struct ShellTemplate {
    /// Endpoint the slot requests once the frame is on screen.
    pub resolve_url: String,
    /// Initial slot content, always the pending placeholder.
    pub slot_html: String,
}

/// Fixed-size placeholder shown while a listing resolves.
#[derive(Template)]
#[template(path = "partials/products_loading.html")]
pub struct ProductsLoadingTemplate {
    pub placeholders: u32,
}

impl ProductsLoadingTemplate {
    pub fn new() -> Self {
        Self {
            placeholders: PAGE_SIZE,
        }
    }
}

impl Default for ProductsLoadingTemplate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Template)]
#[template(path = "partials/products_failed.html")]
pub struct ProductsFailedTemplate;

#[derive(Template)]
#[template(path = "partials/mutation_status.html")]
pub struct MutationStatusTemplate {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_placeholder_has_a_fixed_shape() {
        let html = render_fragment(ProductsLoadingTemplate::new(), "test").expect("render");
        assert_eq!(html.matches("product-card-placeholder").count(), PAGE_SIZE as usize);
        assert!(html.contains("id=\"products-grid\""));
    }

    #[test]
    fn shell_embeds_slot_and_resolve_request() {
        let html = render_fragment(
            ShellTemplate {
                resolve_url: "/products/resolve?q=lamp".to_string(),
                slot_html: "<p>pending</p>".to_string(),
            },
            "test",
        )
        .expect("render");

        assert!(html.contains("id=\"products-slot\""));
        assert!(html.contains("/products/resolve?q=lamp"));
        assert!(html.contains("<p>pending</p>"));
    }

    #[test]
    fn not_found_carries_report() {
        let response = render_not_found_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
