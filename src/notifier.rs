use chrono::NaiveDate;
use lettre::message::{header, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::{RecipientConfig, SenderConfig};
use crate::store::PriceRecord;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Decreased,
    Increased,
    Unchanged,
}

/// Everything the summary needs for one successfully priced item: its
/// display name, the price observed this run, the compare-at price and
/// product image when the page exposed them, and the full stored history
/// (which already includes today's record).
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub name: String,
    pub url: String,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub history: Vec<PriceRecord>,
}

impl ItemReport {
    /// A compare-at price on the page means the shop is discounting.
    pub fn on_sale(&self) -> bool {
        self.compare_price.is_some()
    }

    /// The most recent record before today's, if any.
    pub fn previous(&self) -> Option<&PriceRecord> {
        if self.history.len() >= 2 {
            self.history.get(self.history.len() - 2)
        } else {
            None
        }
    }

    /// Signed change against the previous record: negative means cheaper.
    pub fn delta(&self) -> Option<Decimal> {
        self.previous().map(|prev| self.price - prev.price)
    }

    pub fn trend(&self) -> Option<Trend> {
        self.delta().map(|delta| {
            if delta < Decimal::ZERO {
                Trend::Decreased
            } else if delta > Decimal::ZERO {
                Trend::Increased
            } else {
                Trend::Unchanged
            }
        })
    }

    pub fn mean_price(&self) -> Option<Decimal> {
        if self.history.is_empty() {
            return None;
        }
        let total: Decimal = self.history.iter().map(|r| r.price).sum();
        Some(total / Decimal::from(self.history.len() as u64))
    }

    pub fn lowest_price(&self) -> Option<Decimal> {
        self.history.iter().map(|r| r.price).min()
    }

    /// Observations that carried a compare-at price.
    pub fn on_sale_count(&self) -> usize {
        self.history
            .iter()
            .filter(|r| r.compare_price.is_some())
            .count()
    }

    pub fn last_sale(&self) -> Option<NaiveDate> {
        self.history
            .iter()
            .filter(|r| r.compare_price.is_some())
            .map(|r| r.date)
            .max()
    }
}

pub fn format_subject(date: NaiveDate) -> String {
    format!("Your Daily Price Update - {}", date.format("%Y-%m-%d"))
}

fn format_change_line(report: &ItemReport) -> String {
    match (report.trend(), report.delta(), report.previous()) {
        (Some(Trend::Decreased), Some(delta), Some(prev)) => format!(
            "down ${:.2} from ${:.2} (recorded {})",
            -delta,
            prev.price,
            prev.date.format("%Y-%m-%d")
        ),
        (Some(Trend::Increased), Some(delta), Some(prev)) => format!(
            "up ${:.2} from ${:.2} (recorded {})",
            delta,
            prev.price,
            prev.date.format("%Y-%m-%d")
        ),
        (Some(Trend::Unchanged), _, Some(prev)) => format!(
            "unchanged since {}",
            prev.date.format("%Y-%m-%d")
        ),
        _ => "no prior price (new item to tracker)".to_string(),
    }
}

fn format_history_lines(report: &ItemReport) -> String {
    match (report.mean_price(), report.lowest_price()) {
        (Some(mean), Some(lowest)) => {
            let mut line = format!(
                "Mean price: ${:.2} | Lowest seen: ${:.2} | Observations: {}",
                mean,
                lowest,
                report.history.len()
            );
            if let Some(last_sale) = report.last_sale() {
                line.push_str(&format!(
                    " | On sale {}/{} times, last on sale {}",
                    report.on_sale_count(),
                    report.history.len(),
                    last_sale.format("%Y-%m-%d")
                ));
            }
            line
        }
        _ => "No history available.".to_string(),
    }
}

pub fn format_text_body(person: &str, reports: &[ItemReport]) -> String {
    let mut text = String::new();

    text.push_str(&format!("Hello {},\n\n", person));
    text.push_str("Here are the price updates for the items being tracked:\n\n");

    for report in reports {
        text.push_str(&format!("{}\n", report.name));
        text.push_str(&format!("  {}\n", report.url));
        text.push_str(&format!("  Current price: ${:.2}\n", report.price));
        if let Some(compare) = report.compare_price {
            text.push_str(&format!("  On sale! Discounted from: ${:.2}\n", compare));
        }
        text.push_str(&format!("  Change: {}\n", format_change_line(report)));
        text.push_str(&format!("  {}\n\n", format_history_lines(report)));
    }

    text.push_str("Best,\nYour Price Tracker\n");
    text
}

pub fn format_html_body(person: &str, reports: &[ItemReport]) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; font-size: 16px; color: #333; line-height: 1.6;">
    <div style="max-width: 600px; margin: auto; border: 1px solid #ddd; padding: 20px; border-radius: 8px;">
      <p>Hello <strong>{}</strong>,</p>
      <p>Here are the price updates for the items being tracked:</p>
"#,
        person
    ));

    for report in reports {
        // Sale items get the highlighted box and the red badge.
        let box_style = if report.on_sale() {
            "background-color: #e6ffe6;"
        } else {
            ""
        };
        let sale_badge = if report.on_sale() {
            r#"<span style="background-color: #d32f2f; color: #fff; padding: 2px 6px; border-radius: 4px; font-size: 12px;">On Sale!</span> "#
        } else {
            ""
        };
        let discount_line = match report.compare_price {
            Some(compare) => format!(
                "<br>\n           <strong>Discounted from:</strong> <s>${:.2}</s>",
                compare
            ),
            None => String::new(),
        };
        let image_block = match &report.image_url {
            Some(image) => format!(
                r#"<img src="{}" alt="{}" style="max-width: 200px; border-radius: 4px; margin-top: 8px;"><br>
        "#,
                image, report.name
            ),
            None => String::new(),
        };
        html.push_str(&format!(
            r#"      <div style="margin-bottom: 20px; padding: 10px; border: 1px solid #eee; border-radius: 6px; {}">
        {}<strong>{}</strong><br>
        <a href="{}" style="color: #1a0dab; text-decoration: none;">{}</a><br>
        {}<p><strong>Current price:</strong> ${:.2}{}<br>
           <strong>Change:</strong> {}</p>
        <p style="font-size: 13px; color: #666;">{}</p>
      </div>
"#,
            box_style,
            sale_badge,
            report.name,
            report.url,
            report.url,
            image_block,
            report.price,
            discount_line,
            format_change_line(report),
            format_history_lines(report),
        ));
    }

    html.push_str(
        r#"      <p>Best,<br>Your Price Tracker</p>
      <hr style="margin-top: 30px; border: none; border-top: 1px solid #ccc;">
      <p style="font-size: 13px; color: #888;">Reply to this email with feedback or questions.</p>
    </div>
  </body>
</html>
"#,
    );

    html
}

/// Delivers the consolidated summary over authenticated SMTP-over-TLS.
/// Delivery failures never touch the history store; recording and
/// notification are independent steps.
pub struct EmailNotifier {
    smtp_host: String,
    smtp_port: u16,
    from_address: String,
    credentials: Credentials,
}

impl EmailNotifier {
    pub fn new(sender: &SenderConfig, password: String) -> Self {
        EmailNotifier {
            smtp_host: sender.smtp_host.clone(),
            smtp_port: sender.smtp_port,
            from_address: sender.address.clone(),
            credentials: Credentials::new(sender.address.clone(), password),
        }
    }

    pub fn send(
        &self,
        recipient: &RecipientConfig,
        reports: &[ItemReport],
        date: NaiveDate,
    ) -> Result<()> {
        let subject = format_subject(date);
        let text_body = format_text_body(&recipient.person, reports);
        let html_body = format_html_body(&recipient.person, reports);
        debug!(to = %recipient.email, %subject, "composing summary email");

        let email = Message::builder()
            .from(format!("Price Tracker <{}>", self.from_address).parse()?)
            .to(recipient.email.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        let mailer = SmtpTransport::relay(&self.smtp_host)?
            .port(self.smtp_port)
            .credentials(self.credentials.clone())
            .build();

        mailer.send(&email)?;
        info!(to = %recipient.email, items = reports.len(), "summary sent");
        Ok(())
    }
}
