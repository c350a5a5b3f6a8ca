//! Products endpoints: the synchronous shell, its SSE resolve, search
//! refreshes and product creation.

use async_stream::stream;
use axum::{
    extract::{Form, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use datastar::prelude::ElementPatchMode;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        error::HttpError,
        mutations::{MutationFailed, MutationOutcome},
        params::RawParams,
        shell::{ResolveState, ShellStage},
        stream::{StreamBuilder, into_sse_response, patch_event},
    },
    domain::products::NewProduct,
    presentation::{
        products::{render_grid, render_pager},
        views::{MutationStatusTemplate, ShellTemplate, render_fragment, render_template_response},
    },
};

use super::{HttpState, MUTATION_STATUS, PRODUCTS_GRID, PRODUCTS_PAGER, PRODUCTS_SLOT};

const SOURCE: &str = "infra::http::products";
const WRITE_FAILED_MESSAGE: &str = "The product could not be saved. Please try again.";
const INVALID_PRICE_MESSAGE: &str = "Price must be a whole number greater than zero.";

fn raw_params(query: Option<String>) -> RawParams {
    RawParams::from_query(query.as_deref().unwrap_or(""))
}

fn with_query(path: &str, raw: &RawParams) -> String {
    if raw.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", raw.to_query_string())
    }
}

/// `GET /products`: the frame with the pending slot. Never awaits the catalog.
pub(super) async fn shell(RawQuery(query): RawQuery) -> Response {
    let raw = raw_params(query);
    let slot_html = match ResolveState::Pending.render() {
        Ok(html) => html,
        Err(err) => return HttpError::from(err).into_response(),
    };

    render_template_response(
        ShellTemplate {
            resolve_url: with_query("/products/resolve", &raw),
            slot_html,
        },
        StatusCode::OK,
    )
}

/// `GET /products/resolve`: patch the slot with the terminal state.
///
/// The shell lives inside the stream, so a dropped connection aborts the
/// resolve.
pub(super) async fn resolve(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let mut shell = ShellStage::mount(state.logic.clone(), raw_params(query));

    into_sse_response(stream! {
        let settled = shell.settled().await;
        match settled.render() {
            Ok(html) => yield patch_event(html, PRODUCTS_SLOT, ElementPatchMode::Inner),
            Err(err) => error!(source = SOURCE, error = %err, "failed to render products slot"),
        }
    })
}

/// `GET /products/refresh`: placeholder grid first, then the new page.
pub(super) async fn refresh(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let mut shell = ShellStage::mount(state.logic.clone(), raw_params(query));

    into_sse_response(stream! {
        match shell.render() {
            Ok(html) => yield patch_event(html, PRODUCTS_GRID, ElementPatchMode::Replace),
            Err(err) => error!(source = SOURCE, error = %err, "failed to render pending grid"),
        }

        let settled = shell.settled().await;
        for (html, selector) in settled_patches(&settled) {
            yield patch_event(html, selector, ElementPatchMode::Replace);
        }
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    description: String,
}

impl ProductForm {
    fn into_new_product(self) -> Option<NewProduct> {
        let price = self.price.trim().parse::<u32>().ok().filter(|p| *p > 0)?;
        Some(NewProduct {
            name: self.name,
            price,
            description: self.description,
        })
    }
}

/// `POST /products`: create a product, report the outcome and, on success,
/// re-resolve the current listing so the page reflects the write.
pub(super) async fn create(
    State(state): State<HttpState>,
    RawQuery(query): RawQuery,
    Form(form): Form<ProductForm>,
) -> Response {
    let mut stream = StreamBuilder::new();

    let Some(input) = form.into_new_product() else {
        push_status(&mut stream, false, INVALID_PRICE_MESSAGE.to_string());
        return stream.into_response();
    };

    match state.mutations.apply(input).await {
        MutationOutcome::Created(product) => {
            push_status(&mut stream, true, format!("Created \u{201c}{}\u{201d}.", product.name));

            let mut shell = ShellStage::mount(state.logic.clone(), raw_params(query));
            let settled = shell.settled().await;
            for (html, selector) in settled_patches(&settled) {
                stream.push_patch(html, selector, ElementPatchMode::Replace);
            }
        }
        MutationOutcome::Failed(MutationFailed::Rejected { message }) => {
            push_status(&mut stream, false, message);
        }
        MutationOutcome::Failed(MutationFailed::WriteFailed { .. }) => {
            push_status(&mut stream, false, WRITE_FAILED_MESSAGE.to_string());
        }
    }

    stream.into_response()
}

/// Grid and pager patches for a terminal state.
fn settled_patches(state: &ResolveState) -> Vec<(String, &'static str)> {
    let rendered = match state {
        ResolveState::Resolved(payload) => render_grid(&payload.records).and_then(|grid| {
            render_pager(payload).map(|pager| vec![(grid, PRODUCTS_GRID), (pager, PRODUCTS_PAGER)])
        }),
        other => other.render().map(|html| vec![(html, PRODUCTS_GRID)]),
    };

    rendered.unwrap_or_else(|err| {
        error!(source = SOURCE, error = %err, "failed to render listing patch");
        Vec::new()
    })
}

fn push_status(stream: &mut StreamBuilder, success: bool, message: String) {
    match render_fragment(MutationStatusTemplate { success, message }, SOURCE) {
        Ok(html) => {
            stream.push_patch(html, MUTATION_STATUS, ElementPatchMode::Replace);
        }
        Err(err) => error!(source = SOURCE, error = %err, "failed to render mutation status"),
    }
}
