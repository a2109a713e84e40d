use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::debug;

use crate::utils::error::{AppError, Result};

/// Pulls a decimal price out of page markup via a configured CSS selector.
///
/// This is brittle by design: it depends on the site keeping its markup
/// stable, and a changed page simply surfaces as a parse error for that
/// item on the next run.
pub struct PriceExtractor {
    price_regex: Regex,
    image_selector: Selector,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceExtractor {
    pub fn new() -> Self {
        PriceExtractor {
            price_regex: Regex::new(
                r"[\$£€¥₹]?\s*(\d{1,3}(?:,\d{3})*(?:\.\d{2})?|\d+(?:\.\d{2})?)",
            )
            .unwrap(),
            image_selector: Selector::parse(r#"meta[property="og:image"]"#).unwrap(),
        }
    }

    /// First selector match containing a parseable price wins.
    pub fn extract(&self, html: &str, selector: &str) -> Result<Decimal> {
        let css_selector = Selector::parse(selector)
            .map_err(|e| AppError::parse(format!("invalid CSS selector '{}': {:?}", selector, e)))?;

        let document = Html::parse_document(html);
        let mut matched_any = false;
        for element in document.select(&css_selector) {
            matched_any = true;
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if let Some(price) = self.parse_price(&text) {
                debug!(selector, %price, "extracted price");
                return Ok(price);
            }
        }

        if matched_any {
            Err(AppError::parse(format!(
                "selector '{}' matched but no numeric price found",
                selector
            )))
        } else {
            Err(AppError::parse(format!(
                "selector '{}' matched nothing on the page",
                selector
            )))
        }
    }

    /// Companion compare-at price, shown by some shops while an item is on
    /// sale. Absence is the normal case, so misses are not errors: an
    /// unparseable selector, no match, or an empty element all yield None.
    pub fn extract_compare(&self, html: &str, selector: &str) -> Option<Decimal> {
        let css_selector = Selector::parse(selector).ok()?;
        let document = Html::parse_document(html);
        for element in document.select(&css_selector) {
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if let Some(price) = self.parse_price(&text) {
                debug!(selector, %price, "extracted compare-at price");
                return Some(price);
            }
        }
        None
    }

    /// First og:image URL on the page, used for the summary's product
    /// image. Double-escaped ampersands are unescaped.
    pub fn extract_image(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document.select(&self.image_selector).find_map(|element| {
            element
                .value()
                .attr("content")
                .map(|content| content.replace("amp;", ""))
        })
    }

    /// Parse the first price-looking number in a text fragment, dropping
    /// currency symbols and thousands separators.
    pub fn parse_price(&self, text: &str) -> Option<Decimal> {
        let captures = self.price_regex.captures(text)?;
        let price_str = captures.get(1)?.as_str().replace(',', "");
        Decimal::from_str(&price_str).ok()
    }
}
