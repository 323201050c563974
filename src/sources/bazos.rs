// src/sources/bazos.rs
// Bazos classifieds RSS source. One implementation serves both markets; the
// registry carries it under `bazos_cz` and `bazos_sk`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use askama::Template;

use crate::error::{WatchError, WatchResult};
use crate::model::Item;
use crate::notify::{Payload, PayloadKind};
use crate::sources::{DataSource, Formatter};
use crate::store::JsonStore;

const CZ_CATEGORIES: &[&str] = &[
    "zvirata",
    "deti",
    "reality",
    "prace",
    "auto",
    "motorky",
    "stroje",
    "dum_a_zahrada",
    "pc",
    "mobily",
    "foto",
    "elektro",
    "sport",
    "hudba",
    "vstupenky",
    "knihy",
    "nabytek",
    "obleceni",
    "sluzby",
    "ostatni",
];

const SK_CATEGORIES: &[&str] = &[
    "zvierata",
    "deti",
    "reality",
    "praca",
    "auto",
    "motocykle",
    "stroje",
    "dom_a_zahrada",
    "pc",
    "mobily",
    "foto",
    "elektro",
    "sport",
    "hudba",
    "vstupenky",
    "knihy",
    "nabytok",
    "oblecenie",
    "sluzby",
    "ostatne",
];

/// Market-specific constants for the shared implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Cz,
    Sk,
}

impl Market {
    pub fn source_name(self) -> &'static str {
        match self {
            Market::Cz => "bazos_cz",
            Market::Sk => "bazos_sk",
        }
    }

    fn feed_url(self) -> &'static str {
        match self {
            Market::Cz => "https://www.bazos.cz/rss.php",
            Market::Sk => "https://www.bazos.sk/rss.php",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Market::Cz => "Bazos.cz",
            Market::Sk => "Bazos.sk",
        }
    }

    fn categories(self) -> &'static [&'static str] {
        match self {
            Market::Cz => CZ_CATEGORIES,
            Market::Sk => SK_CATEGORIES,
        }
    }
}

fn default_radius() -> u32 {
    25
}

/// Search parameters, stored per watcher in the config record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BazosParams {
    /// Listing category; the feed query carries its two-letter rubric code.
    #[serde(default)]
    pub category: String,
    /// 5-digit postal code of the search center.
    #[serde(default)]
    pub location: String,
    /// Free-text search.
    #[serde(default)]
    pub search: String,
    /// Lower price bound; 0 leaves the bound unset.
    #[serde(default)]
    pub min_price: u32,
    /// Upper price bound; 0 leaves the bound unset.
    #[serde(default)]
    pub max_price: u32,
    /// Distance from the location in km.
    #[serde(default = "default_radius")]
    pub radius: u32,
}

impl BazosParams {
    fn validate(&self, market: Market) -> WatchResult<()> {
        if !self.category.is_empty() && !market.categories().contains(&self.category.as_str()) {
            return Err(WatchError::Validation(format!(
                "unknown {} category '{}'",
                market.label(),
                self.category
            )));
        }
        if !self.location.is_empty()
            && (self.location.len() != 5 || !self.location.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(WatchError::Validation(format!(
                "location must be a 5 digit postal code, got '{}'",
                self.location
            )));
        }
        Ok(())
    }
}

/// Query pairs for the RSS endpoint; unset fields stay out of the URL.
fn query_pairs(params: &BazosParams) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if !params.category.is_empty() {
        // The feed addresses rubrics by the first two letters of the name.
        pairs.push(("rub", params.category.chars().take(2).collect()));
    }
    if !params.location.is_empty() {
        pairs.push(("hlokalita", params.location.clone()));
    }
    if !params.search.is_empty() {
        pairs.push(("hledat", params.search.clone()));
    }
    if params.min_price > 0 {
        pairs.push(("cenaod", params.min_price.to_string()));
    }
    if params.max_price > 0 {
        pairs.push(("cenado", params.max_price.to_string()));
    }
    if params.radius > 0 {
        pairs.push(("humkreis", params.radius.to_string()));
    }
    pairs
}

/// One parsed listing in its source-typed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BazosItem {
    pub title: String,
    #[serde(default)]
    pub price: String,
    pub url: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Strip the thumbnail the feed prepends to descriptions.
fn strip_leading_img(s: &str) -> &str {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| Regex::new(r"^\s*<img[^>]*>\s*").unwrap());
    match re.find(s) {
        Some(m) => &s[m.end()..],
        None => s,
    }
}

fn parse_feed(xml: &str) -> WatchResult<Vec<BazosItem>> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| WatchError::Fetch(format!("parsing feed xml: {e}")))?;

    let mut items = Vec::with_capacity(rss.channel.items.len());
    for entry in rss.channel.items {
        let raw_title = entry
            .title
            .ok_or_else(|| WatchError::Fetch("feed item missing <title>".into()))?;
        let url = entry
            .link
            .ok_or_else(|| WatchError::Fetch("feed item missing <link>".into()))?;
        let raw_date = entry
            .pub_date
            .ok_or_else(|| WatchError::Fetch("feed item missing <pubDate>".into()))?;

        // Titles come as "Listing title: 1 234 €"; the suffix is the price.
        let raw_title = html_escape::decode_html_entities(raw_title.trim()).to_string();
        let (title, price) = match raw_title.rsplit_once(':') {
            Some((title, price)) => (title.trim().to_string(), price.trim().to_string()),
            None => (raw_title, String::new()),
        };

        let description = entry.description.unwrap_or_default();
        let description = strip_leading_img(&description);
        let description = html_escape::decode_html_entities(description.trim()).to_string();

        let pub_date = DateTime::parse_from_rfc2822(raw_date.trim())
            .map_err(|e| WatchError::Fetch(format!("bad pubDate '{raw_date}': {e}")))?
            .with_timezone(&Utc);

        items.push(BazosItem {
            title,
            price,
            url,
            description,
            pub_date,
        });
    }
    Ok(items)
}

/// Data source for one Bazos market.
pub struct BazosSource {
    market: Market,
    store: Arc<JsonStore>,
    client: reqwest::Client,
    params: Option<BazosParams>,
}

impl BazosSource {
    pub fn new(market: Market, store: Arc<JsonStore>) -> Self {
        Self {
            market,
            store,
            client: reqwest::Client::new(),
            params: None,
        }
    }
}

#[async_trait]
impl DataSource for BazosSource {
    fn name(&self) -> &'static str {
        self.market.source_name()
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": self.market.categories(),
                    "description": "Listing category to search."
                },
                "location": {
                    "type": "string",
                    "description": "5 digit postal code to search around."
                },
                "search": {
                    "type": "string",
                    "description": "Free text to search for."
                },
                "min_price": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Lower price bound."
                },
                "max_price": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Upper price bound."
                },
                "radius": {
                    "type": "integer",
                    "minimum": 0,
                    "default": 25,
                    "description": "Distance from the location in km."
                }
            }
        })
    }

    fn set_params(&mut self, raw: &Value) -> WatchResult<()> {
        let params: BazosParams = serde_json::from_value(raw.clone())
            .map_err(|e| WatchError::Validation(format!("bad {} parameters: {e}", self.name())))?;
        params.validate(self.market)?;
        self.params = Some(params);
        Ok(())
    }

    async fn fetch_items(&self) -> WatchResult<Vec<Item>> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| WatchError::Validation("parameters not initialized".into()))?;

        let url = self.market.feed_url();
        let response = self
            .client
            .get(url)
            .query(&query_pairs(params))
            .send()
            .await
            .map_err(|e| WatchError::Fetch(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(WatchError::Fetch(format!(
                "{url} returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WatchError::Fetch(format!("{url} body: {e}")))?;

        parse_feed(&body)?
            .iter()
            .map(Item::from_record)
            .collect()
    }

    fn get_stored_items(&self, watcher_name: &str) -> WatchResult<Vec<Item>> {
        self.store.get_items(watcher_name)
    }

    fn get_formatter(&self, formatter_name: &str) -> WatchResult<Box<dyn Formatter>> {
        match formatter_name {
            "email" => Ok(Box::new(BazosEmailFormatter::new(self.market))),
            other => Err(WatchError::NotFound(format!(
                "formatter '{other}' is not known to {}",
                self.name()
            ))),
        }
    }
}

struct EmailRow {
    title: String,
    price: String,
    url: String,
    description: String,
    published: String,
}

#[derive(Template)]
#[template(path = "listing_email.html")]
struct ListingEmail<'a> {
    market: &'a str,
    items: &'a [EmailRow],
    year: i32,
}

/// Renders new listings into an HTML email body.
pub struct BazosEmailFormatter {
    market: Market,
}

impl BazosEmailFormatter {
    pub fn new(market: Market) -> Self {
        Self { market }
    }
}

impl Formatter for BazosEmailFormatter {
    fn format_items(&self, items: &[Item]) -> WatchResult<Payload> {
        let rows = items
            .iter()
            .map(|item| {
                let record: BazosItem = item.to_record()?;
                Ok(EmailRow {
                    title: record.title,
                    price: record.price,
                    url: record.url,
                    description: record.description,
                    published: record.pub_date.format("%d.%m.%Y %H:%M").to_string(),
                })
            })
            .collect::<WatchResult<Vec<_>>>()?;

        let body = ListingEmail {
            market: self.market.label(),
            items: &rows,
            year: Utc::now().year(),
        }
        .render()
        .map_err(|e| WatchError::Store(format!("rendering email template: {e}")))?;

        Ok(Payload {
            subject: format!("New listings on {}", self.market.label()),
            body,
            kind: PayloadKind::Html,
        })
    }
}
