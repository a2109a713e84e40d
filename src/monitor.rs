use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::ItemConfig;
use crate::extractor::PriceExtractor;
use crate::fetcher::Fetcher;
use crate::notifier::ItemReport;
use crate::store::HistoryStore;
use crate::utils::error::Result;

/// One linear pass over the configured items: fetch, extract, record, and
/// collect a report per item that produced a price. Fetch and parse
/// failures are logged and skip only the item that caused them; store
/// failures abort the run.
pub struct Monitor {
    fetcher: Fetcher,
    extractor: PriceExtractor,
    store: HistoryStore,
}

impl Monitor {
    pub fn new(fetcher: Fetcher, store: HistoryStore) -> Self {
        Monitor {
            fetcher,
            extractor: PriceExtractor::new(),
            store,
        }
    }

    pub async fn check_items(&self, items: &[ItemConfig], date: NaiveDate) -> Result<Vec<ItemReport>> {
        let mut reports = Vec::new();

        for item in items {
            match self.check_item(item, date).await {
                Ok(report) => reports.push(report),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(item = %item.name, url = %item.url, error = %err, "skipping item");
                }
            }
        }

        info!(
            checked = items.len(),
            succeeded = reports.len(),
            "run complete"
        );
        Ok(reports)
    }

    async fn check_item(&self, item: &ItemConfig, date: NaiveDate) -> Result<ItemReport> {
        let body = self.fetcher.fetch(&item.url).await?;
        let price = self.extractor.extract(&body, &item.selector)?;
        let compare_price = item
            .compare_selector
            .as_deref()
            .and_then(|selector| self.extractor.extract_compare(&body, selector));
        let image_url = self.extractor.extract_image(&body);

        self.store.record(&item.url, date, price, compare_price).await?;
        let history = self.store.history(&item.url).await?;

        info!(item = %item.name, %price, on_sale = compare_price.is_some(), "recorded price");
        Ok(ItemReport {
            name: item.name.clone(),
            url: item.url.clone(),
            price,
            compare_price,
            image_url,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(name: &str, url: String) -> ItemConfig {
        ItemConfig {
            name: name.to_string(),
            url,
            selector: ".product__price".to_string(),
            compare_selector: None,
        }
    }

    fn priced_page(price: &str) -> String {
        format!(
            r#"<html><body><span class="product__price">{}</span></body></html>"#,
            price
        )
    }

    async fn monitor() -> Monitor {
        Monitor::new(Fetcher::new().unwrap(), HistoryStore::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_fetch_extract_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$20.00")))
            .mount(&server)
            .await;

        let monitor = monitor().await;
        let items = vec![item("Shirt", format!("{}/shirt", server.uri()))];
        let reports = monitor.check_items(&items, date("2026-08-27")).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].price, dec("20.00"));
        assert_eq!(reports[0].history.len(), 1);
    }

    #[tokio::test]
    async fn test_sale_page_records_compare_price_and_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html>
                    <head><meta property="og:image" content="https://cdn.example.com/shirt.jpg"></head>
                    <body>
                        <span class="product__price">$15.00</span>
                        <span class="product__compare-at-price">$20.00</span>
                    </body>
                </html>"#,
            ))
            .mount(&server)
            .await;

        let monitor = monitor().await;
        let url = format!("{}/shirt", server.uri());
        let items = vec![ItemConfig {
            compare_selector: Some(".product__compare-at-price".to_string()),
            ..item("Shirt", url.clone())
        }];
        let reports = monitor.check_items(&items, date("2026-08-27")).await.unwrap();

        assert_eq!(reports[0].price, dec("15.00"));
        assert_eq!(reports[0].compare_price, Some(dec("20.00")));
        assert_eq!(
            reports[0].image_url.as_deref(),
            Some("https://cdn.example.com/shirt.jpg")
        );

        let history = monitor.store.history(&url).await.unwrap();
        assert_eq!(history[0].compare_price, Some(dec("20.00")));
    }

    #[tokio::test]
    async fn test_failing_item_does_not_block_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/shoes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$99.00")))
            .mount(&server)
            .await;

        let monitor = monitor().await;
        let items = vec![
            item("Broken", format!("{}/broken", server.uri())),
            item("Shoes", format!("{}/shoes", server.uri())),
        ];
        let reports = monitor.check_items(&items, date("2026-08-27")).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "Shoes");
        assert_eq!(reports[0].price, dec("99.00"));
    }

    #[tokio::test]
    async fn test_malformed_page_records_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Page Not Found</html>"))
            .mount(&server)
            .await;

        let store = HistoryStore::in_memory().await.unwrap();
        let url = format!("{}/shirt", server.uri());
        let monitor = Monitor::new(Fetcher::new().unwrap(), store);
        let reports = monitor
            .check_items(&[item("Shirt", url.clone())], date("2026-08-27"))
            .await
            .unwrap();

        assert!(reports.is_empty());
        let history = monitor.store.history(&url).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_same_day_rerun_keeps_latest_price() {
        let server = MockServer::start().await;
        let day = date("2026-08-27");
        let url = format!("{}/shirt", server.uri());
        let monitor = monitor().await;

        let first = Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$20.00")))
            .up_to_n_times(1)
            .mount_as_scoped(&server)
            .await;
        monitor
            .check_items(&[item("Shirt", url.clone())], day)
            .await
            .unwrap();
        drop(first);

        Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$21.00")))
            .mount(&server)
            .await;
        let reports = monitor
            .check_items(&[item("Shirt", url.clone())], day)
            .await
            .unwrap();

        assert_eq!(reports[0].history.len(), 1);
        assert_eq!(reports[0].history[0].price, dec("21.00"));
    }

    #[tokio::test]
    async fn test_two_day_history_and_delta() {
        let server = MockServer::start().await;
        let url = format!("{}/shirt", server.uri());
        let monitor = monitor().await;

        let day_one = Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$20.00")))
            .up_to_n_times(1)
            .mount_as_scoped(&server)
            .await;
        monitor
            .check_items(&[item("Shirt", url.clone())], date("2026-08-26"))
            .await
            .unwrap();
        drop(day_one);

        Mock::given(method("GET"))
            .and(path("/shirt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(priced_page("$18.00")))
            .mount(&server)
            .await;
        let reports = monitor
            .check_items(&[item("Shirt", url.clone())], date("2026-08-27"))
            .await
            .unwrap();

        let report = &reports[0];
        assert_eq!(report.history.len(), 2);
        assert_eq!(report.history[0].price, dec("20.00"));
        assert_eq!(report.history[1].price, dec("18.00"));
        assert_eq!(report.delta(), Some(dec("-2.00")));
    }
}
