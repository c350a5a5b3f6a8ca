//! Rendering of a resolved listing and the client-side search value.

use askama::Template;
use serde::Serialize;
use tracing::debug;

use crate::application::address::AddressBar;
use crate::application::logic::RenderPayload;
use crate::application::params::{self, ProductQuery, QUERY_PARAM};
use crate::domain::products::{PAGE_SIZE, ProductRecord};
use crate::presentation::views::{TemplateRenderError, render_fragment};

pub const EMPTY_STATE_MESSAGE: &str = "No products match this page.";

#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub id: u32,
    pub name: String,
    pub price_label: String,
    pub description: String,
}

impl From<&ProductRecord> for ProductCardView {
    fn from(record: &ProductRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            price_label: format!("${}", record.price),
            description: record.description.clone(),
        }
    }
}

#[derive(Serialize)]
struct ClientSignals<'a> {
    q: &'a str,
}

#[derive(Debug, Clone)]
pub struct ProductGridView {
    pub cards: Vec<ProductCardView>,
    pub empty_message: &'static str,
}

impl ProductGridView {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PagerView {
    pub page: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl PagerView {
    pub fn from_payload(payload: &RenderPayload) -> Self {
        let query = &payload.query;
        Self {
            page: query.page_number(),
            prev_href: query
                .page_number()
                .checked_sub(1)
                .and_then(|page| page_href(query, page)),
            // A short page is the last one.
            next_href: if payload.records.len() as u32 >= PAGE_SIZE {
                query
                    .page_number()
                    .checked_add(1)
                    .and_then(|page| page_href(query, page))
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductsView {
    pub q: String,
    /// Initial client signals, JSON encoded.
    pub signals: String,
    pub grid: ProductGridView,
    pub pager: PagerView,
}

impl ProductsView {
    pub fn from_payload(payload: &RenderPayload) -> Self {
        let signals = serde_json::to_string(&ClientSignals {
            q: &payload.query.q,
        })
        .unwrap_or_else(|_| "{}".to_string());

        Self {
            q: payload.query.q.clone(),
            signals,
            grid: grid_view(&payload.records),
            pager: PagerView::from_payload(payload),
        }
    }
}

fn grid_view(records: &[ProductRecord]) -> ProductGridView {
    ProductGridView {
        cards: records.iter().map(ProductCardView::from).collect(),
        empty_message: EMPTY_STATE_MESSAGE,
    }
}

fn page_href(query: &ProductQuery, page: u32) -> Option<String> {
    let page = std::num::NonZeroU32::new(page)?;
    let encoded = params::encode(&ProductQuery::new(query.q.clone(), page)).to_query_string();
    Some(if encoded.is_empty() {
        "/products".to_string()
    } else {
        format!("/products?{encoded}")
    })
}

#[derive(Template)]
#[template(path = "partials/products_view.html")]
pub struct ProductsTemplate {
    pub view: ProductsView,
}

#[derive(Template)]
#[template(path = "partials/products_grid.html")]
pub struct ProductGridTemplate {
    pub grid: ProductGridView,
}

#[derive(Template)]
#[template(path = "partials/products_pager.html")]
pub struct ProductPagerTemplate {
    pub pager: PagerView,
}

/// Full resolved view: search field, grid, pager and create form.
pub fn render_products(payload: &RenderPayload) -> Result<String, TemplateRenderError> {
    render_fragment(
        ProductsTemplate {
            view: ProductsView::from_payload(payload),
        },
        "presentation::products::render_products",
    )
}

/// Grid only, for patches issued after a search edit.
pub fn render_grid(records: &[ProductRecord]) -> Result<String, TemplateRenderError> {
    render_fragment(
        ProductGridTemplate {
            grid: grid_view(records),
        },
        "presentation::products::render_grid",
    )
}

pub fn render_pager(payload: &RenderPayload) -> Result<String, TemplateRenderError> {
    render_fragment(
        ProductPagerTemplate {
            pager: PagerView::from_payload(payload),
        },
        "presentation::products::render_pager",
    )
}

/// Client-side copy of `q`, derived from the address.
///
/// The address stays authoritative: edits are pushed to it at once and
/// external changes are pulled with `resync`.
pub struct ClientQueryState {
    value: String,
    address: AddressBar,
}

impl ClientQueryState {
    pub fn mount(address: AddressBar) -> Self {
        let value = params::decode(&address.current()).q;
        Self { value, address }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Update the displayed value and request the address change. Never waits
    /// on the resolve the address change triggers.
    pub fn edit(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.address.set_param(QUERY_PARAM, &self.value);
    }

    /// Pull the address value after an external navigation.
    ///
    /// Returns true when the local value changed.
    pub fn resync(&mut self) -> bool {
        let current = params::decode(&self.address.current()).q;
        if current == self.value {
            return false;
        }
        debug!(from = %self.value, to = %current, "client query resynced from address");
        self.value = current;
        true
    }
}
