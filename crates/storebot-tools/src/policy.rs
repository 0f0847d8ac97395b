// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of store policies for the policy lookup tools.

use storebot_storage::Store;

/// Currency used when a store has not configured one.
pub const DEFAULT_CURRENCY: &str = "EGP";

pub fn store_currency(store: &Store) -> &str {
    store
        .currency
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
}

fn join_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

fn amount_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

pub fn render_shipping_policy(store: &Store) -> String {
    let shipping = &store.shipping_policy;
    if !shipping.is_shipping {
        return "This store does not offer shipping services.".to_string();
    }
    let currency = store_currency(store);
    let days = shipping
        .shipping_days
        .filter(|d| *d > 0)
        .map_or_else(|| "N/A".to_string(), |d| d.to_string());

    [
        "Shipping Policy:".to_string(),
        format!(
            "- Ships to: {}",
            join_or(&shipping.shipping_countries, "Not specified")
        ),
        format!(
            "- Available cities: {}",
            join_or(&shipping.shipping_cities, "Not specified")
        ),
        format!("- Estimated delivery time: {days} days"),
        format!(
            "- Shipping cost: {} {currency}",
            amount_or_na(shipping.shipping_cost)
        ),
        format!(
            "- Free shipping for orders above: {} {currency}",
            amount_or_na(shipping.free_shipping_over)
        ),
        format!(
            "- Delivery provider: {}",
            shipping.delivery_provider.as_deref().unwrap_or("N/A")
        ),
    ]
    .join("\n")
}

pub fn render_return_policy(store: &Store) -> String {
    let policy = &store.return_policy;
    if !policy.is_returnable {
        return "This store does not accept returns.".to_string();
    }
    let days = policy
        .return_days
        .filter(|d| *d > 0)
        .map_or_else(|| "N/A".to_string(), |d| d.to_string());

    [
        "Return & Refund Policy:".to_string(),
        format!("- Return allowed within: {days} days"),
        format!(
            "- Return conditions: {}",
            join_or(&policy.return_conditions, "Not specified")
        ),
        format!(
            "- Return shipping paid by: {}",
            policy.return_shipping_payer.as_deref().unwrap_or("N/A")
        ),
        format!(
            "- Refund types: {}",
            join_or(&policy.refund_types, "Not specified")
        ),
    ]
    .join("\n")
}

pub fn render_payment_options(store: &Store) -> String {
    if store.payment_methods.is_empty() {
        return "This store does not offer payment options.".to_string();
    }
    format!(
        "Payment Methods Accepted: {}",
        store.payment_methods.join(", ").to_lowercase()
    )
}
