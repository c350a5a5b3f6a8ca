//! Query parameters recognised by the products listing and their address encoding.
//!
//! Decoding is total: unknown keys are ignored, missing keys take their
//! default and malformed values fall back to the default instead of failing.
//! Encoding leaves out parameters that hold their default so the address
//! stays minimal; decoding an encoded set yields the same set again.

use std::fmt;
use std::num::NonZeroU32;

use serde::Serialize;
use tracing::debug;
use url::form_urlencoded;

pub const QUERY_PARAM: &str = "q";
pub const PAGE_PARAM: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    PositiveInteger,
}

/// Declaration of one recognised parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: &'static str,
}

pub const PRODUCT_PARAMS: [ParamSpec; 2] = [
    ParamSpec {
        name: QUERY_PARAM,
        kind: ParamKind::Text,
        default: "",
    },
    ParamSpec {
        name: PAGE_PARAM,
        kind: ParamKind::PositiveInteger,
        default: "1",
    },
];

/// Returns the encoded default of a recognised parameter.
pub fn default_for(name: &str) -> Option<&'static str> {
    PRODUCT_PARAMS
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.default)
}

/// Flat, possibly multi-valued key/value pairs as carried in an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    pub fn from_query(query: &str) -> Self {
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect()
    }

    /// First value supplied for `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replace every value of `key` with a single `value`, keeping its position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(name, _)| name == key) {
            Some(index) => {
                self.pairs[index].1 = value;
                let mut seen = false;
                self.pairs.retain(|(name, _)| {
                    if name != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(name, _)| name != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Serialise back into a query string (without the leading `?`).
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for RawParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Display for RawParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Resolved parameters of one products listing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProductQuery {
    pub q: String,
    pub page: NonZeroU32,
}

impl ProductQuery {
    pub fn new(q: impl Into<String>, page: NonZeroU32) -> Self {
        Self { q: q.into(), page }
    }

    pub fn page_number(&self) -> u32 {
        self.page.get()
    }

    pub fn has_search(&self) -> bool {
        !self.q.is_empty()
    }

    pub fn with_q(&self, q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            page: self.page,
        }
    }
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            page: NonZeroU32::MIN,
        }
    }
}

/// Decode raw address parameters. Never fails.
pub fn decode(raw: &RawParams) -> ProductQuery {
    let q = match raw.first(QUERY_PARAM) {
        Some(value) => value.to_string(),
        None => String::new(),
    };

    let page = match raw.first(PAGE_PARAM) {
        Some(value) => match parse_page(value) {
            Some(page) => page,
            None => {
                debug!(
                    param = PAGE_PARAM,
                    value,
                    default = NonZeroU32::MIN.get(),
                    "malformed parameter replaced by default"
                );
                NonZeroU32::MIN
            }
        },
        None => NonZeroU32::MIN,
    };

    ProductQuery { q, page }
}

/// Encode a parameter set for an address, omitting defaulted entries.
pub fn encode(query: &ProductQuery) -> RawParams {
    let mut raw = RawParams::new();
    if !query.q.is_empty() {
        raw.push(QUERY_PARAM, query.q.clone());
    }
    if query.page != NonZeroU32::MIN {
        raw.push(PAGE_PARAM, query.page.get().to_string());
    }
    raw
}

fn parse_page(value: &str) -> Option<NonZeroU32> {
    value.trim().parse::<u32>().ok().and_then(NonZeroU32::new)
}
