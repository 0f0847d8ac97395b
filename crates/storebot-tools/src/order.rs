// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order placement by email.
//!
//! The order total is computed from the line items, priced from the catalog
//! when the model supplies an item id, and mailed to the store's address as
//! an HTML summary. Stock of inventory-tracked items is decremented once the
//! mail is accepted by the relay.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::{json, Value};
use storebot_config::model::EmailConfig;
use storebot_core::StorebotError;
use storebot_storage::queries::{catalog, stores};
use storebot_storage::Database;
use tracing::{info, warn};

use crate::policy::store_currency;

/// Delivers order summaries to merchants.
#[async_trait]
pub trait OrderMailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<(), StorebotError>;
}

/// SMTP delivery through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Builds a mailer, or `None` when no SMTP host is configured.
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, StorebotError> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };
        let from = config
            .from_address
            .clone()
            .or_else(|| config.username.clone())
            .ok_or_else(|| {
                StorebotError::Config("email.from_address is required when smtp_host is set".into())
            })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| StorebotError::Config(format!("invalid SMTP relay {host}: {e}")))?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host, port = config.smtp_port, "order mailer initialized");
        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl OrderMailer for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<(), StorebotError> {
        let from = self
            .from
            .parse()
            .map_err(|e| StorebotError::Tool {
                message: format!("invalid from address: {e}"),
            })?;
        let to = to.parse().map_err(|e| StorebotError::Tool {
            message: format!("invalid store email address: {e}"),
        })?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| StorebotError::Tool {
                message: format!("failed to build order email: {e}"),
            })?;

        self.transport
            .send(email)
            .await
            .map_err(|e| StorebotError::Tool {
                message: format!("SMTP send failed: {e}"),
            })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderLine {
    #[serde(default)]
    pub item_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderArgs {
    pub store_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// Formats an amount as `CUR 1,234.50`.
pub fn format_money(amount: f64, currency: &str) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{currency} {grouped}.{:02}", cents % 100)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Rejects lines no real order can have, once catalog prices are applied.
pub(crate) fn validate_lines(lines: &[OrderLine]) -> Result<(), StorebotError> {
    for line in lines {
        if line.quantity == 0 {
            return Err(StorebotError::validation(
                "items",
                format!("quantity of {} must be at least 1", line.name),
            ));
        }
        if !line.price.is_finite() || line.price < 0.0 {
            return Err(StorebotError::validation(
                "items",
                format!("price of {} must not be negative", line.name),
            ));
        }
    }
    Ok(())
}

pub(crate) fn order_total(lines: &[OrderLine]) -> f64 {
    lines.iter().map(|l| l.price * f64::from(l.quantity)).sum()
}

/// Subject and HTML body of the merchant notification.
pub(crate) fn render_order_email(order: &OrderArgs, total: f64, currency: &str) -> (String, String) {
    const CELL: &str = "padding: 8px; border: 1px solid #ddd;";

    let rows: String = order
        .items
        .iter()
        .map(|line| {
            format!(
                "<tr><td style=\"{CELL}\">{}</td><td style=\"{CELL}\">{}</td><td style=\"{CELL}\">{}</td></tr>",
                escape_html(&line.name),
                line.quantity,
                format_money(line.price, currency)
            )
        })
        .collect();
    let total_items: u32 = order.items.iter().map(|l| l.quantity).sum();

    let subject = format!(
        "New Order from {} - {} Item(s)",
        order.customer_name,
        order.items.len()
    );
    let body = format!(
        "<div style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: auto;\">\
         <h2 style=\"color: #4CAF50;\">New Order Received</h2>\
         <p><strong>Customer Name:</strong> {name}</p>\
         <p><strong>Phone Number:</strong> {phone}</p>\
         <p><strong>Delivery Address:</strong> {address}</p>\
         <h3 style=\"margin-top: 30px;\">Items Ordered</h3>\
         <table style=\"width: 100%; border-collapse: collapse; margin-top: 10px;\">\
         <thead><tr style=\"background-color: #f2f2f2;\">\
         <th style=\"{CELL}\">Item</th><th style=\"{CELL}\">Quantity</th><th style=\"{CELL}\">Price</th>\
         </tr></thead><tbody>{rows}</tbody></table>\
         <p style=\"margin-top: 20px;\"><strong>Total Items:</strong> {total_items}</p>\
         <p><strong>Total Price:</strong> {total}</p>\
         <p style=\"margin-top: 30px;\">Please prepare the order and arrange for delivery.</p>\
         </div>",
        name = escape_html(&order.customer_name),
        phone = escape_html(&order.customer_phone),
        address = escape_html(&order.delivery_address),
        total = format_money(total, currency),
    );
    (subject, body)
}

/// Replaces model-supplied names and prices with catalog values where known.
async fn price_from_catalog(
    db: &Database,
    store_id: &str,
    lines: &mut [OrderLine],
) -> Result<(), StorebotError> {
    for line in lines.iter_mut() {
        let Some(item_id) = line.item_id.as_deref() else {
            continue;
        };
        if let Some(item) = catalog::get_item(db, store_id, item_id).await? {
            line.name = item.name;
            line.price = item.price;
        }
    }
    Ok(())
}

pub(crate) async fn send_order_by_email(
    db: &Database,
    mailer: &dyn OrderMailer,
    decrement_stock: bool,
    mut order: OrderArgs,
) -> Result<Value, StorebotError> {
    let Some(store) = stores::get_store(db, &order.store_id).await? else {
        return Ok(json!({ "message": "no store found" }));
    };
    if order.items.is_empty() {
        return Err(StorebotError::Tool {
            message: "order has no items".into(),
        });
    }
    let Some(to) = store.email.as_deref().filter(|e| !e.is_empty()) else {
        return Err(StorebotError::Tool {
            message: "store has no email address for orders".into(),
        });
    };

    price_from_catalog(db, &store.id, &mut order.items).await?;
    validate_lines(&order.items)?;
    let currency = store_currency(&store);
    let total = order_total(&order.items);
    let (subject, body) = render_order_email(&order, total, currency);

    mailer.send_html(to, &subject, body).await?;
    info!(store_id = %store.id, lines = order.items.len(), total, "order email sent");

    if decrement_stock {
        for line in &order.items {
            let Some(item_id) = line.item_id.as_deref() else {
                continue;
            };
            if let Err(e) = catalog::decrement_stock(db, &store.id, item_id, line.quantity).await {
                warn!(store_id = %store.id, item_id, error = %e, "stock decrement failed");
            }
        }
    }

    Ok(json!({
        "message": format!(
            "Order is confirmed and the total price is {}",
            format_money(total, currency)
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, price: f64, quantity: u32) -> OrderLine {
        OrderLine {
            item_id: None,
            name: name.into(),
            price,
            quantity,
        }
    }

    #[test]
    fn money_is_grouped_with_two_decimals() {
        assert_eq!(format_money(0.0, "EGP"), "EGP 0.00");
        assert_eq!(format_money(1250.5, "EGP"), "EGP 1,250.50");
        assert_eq!(format_money(1_234_567.0, "USD"), "USD 1,234,567.00");
        assert_eq!(format_money(999.999, "USD"), "USD 1,000.00");
        assert_eq!(format_money(-5.0, "USD"), "-USD 5.00");
    }

    #[test]
    fn total_multiplies_price_by_quantity() {
        let lines = vec![line("Shirt", 100.0, 2), line("Hat", 49.5, 1)];
        assert!((order_total(&lines) - 249.5).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_price_and_zero_quantity_are_rejected() {
        assert!(validate_lines(&[line("Shirt", 100.0, 2), line("Gift wrap", 0.0, 1)]).is_ok());

        let err = validate_lines(&[line("Discount", -50.0, 1)]).unwrap_err();
        assert!(matches!(err, StorebotError::Validation { field: Some("items"), .. }));
        assert!(err.to_string().contains("Discount"));

        let err = validate_lines(&[line("Shirt", 100.0, 0)]).unwrap_err();
        assert!(matches!(err, StorebotError::Validation { field: Some("items"), .. }));
    }

    #[test]
    fn email_escapes_customer_input() {
        let order = OrderArgs {
            store_id: "s1".into(),
            customer_name: "Mona <script>".into(),
            customer_phone: "0100".into(),
            delivery_address: "Cairo & Giza".into(),
            items: vec![line("Shirt", 100.0, 2)],
        };
        let (subject, body) = render_order_email(&order, 200.0, "EGP");
        assert_eq!(subject, "New Order from Mona <script> - 1 Item(s)");
        assert!(body.contains("Mona &lt;script&gt;"));
        assert!(body.contains("Cairo &amp; Giza"));
        assert!(body.contains("<strong>Total Items:</strong> 2"));
        assert!(body.contains("EGP 200.00"));
    }
}
