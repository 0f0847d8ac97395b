// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System instructions assembled from a store's assistant profile.

use storebot_storage::Store;
use storebot_tools::policy::store_currency;

const SALES_GUIDANCE: &str = "As a sales-focused assistant:
- Be friendly, engaging, and make the customer feel welcome.
- Actively recommend products that match their needs or related items.
- Mention current promotions, discounts, or bundles if relevant.
- Highlight product benefits and unique selling points.
- Offer upsells or complementary products where appropriate.
- Always confirm if the customer would like to proceed with a purchase.
- Keep responses concise but persuasive.
- Use positive language that builds excitement about the products.";

const IMAGE_GUIDANCE: &str = "Image Display Instructions:
- When a customer wants to see item images, use the sendImageToFacebookUser tool function to send images directly to the user.
- Do NOT show image links or URLs in your text responses.
- Always send the actual image using the tool instead of displaying links.
- If you have multiple images for a product, use the sendGalleryToFacebookUser tool function to send them as a gallery instead of sending them one by one.";

fn or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(fallback)
}

fn profile_section(store: &Store) -> String {
    let profile = &store.assistant_profile;
    let languages = if profile.languages.is_empty() {
        "English".to_string()
    } else {
        profile.languages.join(", ")
    };
    let mut section = format!(
        "You are {}, {}.\n\
         You can speak the following languages: {languages}.\n\
         Only respond in the language the customer uses.\n\
         If asked about store details, use the provided information.\n\n\
         {SALES_GUIDANCE}\n\n{IMAGE_GUIDANCE}",
        or(profile.name.as_deref(), "Assistant"),
        or(profile.persona.as_deref(), "a helpful and friendly assistant"),
    );
    if let Some(extra) = profile
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        section.push_str("\n\nAdditional Instructions:\n");
        section.push_str(extra);
    }
    section
}

fn basic_info_section(store: &Store, recipient_id: Option<&str>) -> String {
    format!(
        "Store ID: {}\n\
         Store Name: {}\n\
         Category: {}\n\
         Phone: {}\n\
         Email: {}\n\
         Description: {}\n\
         Notes: {}\n\
         Currency: {}\n\
         Facebook User Recipient ID: {}",
        store.id,
        store.name,
        or(store.category.as_deref(), "Not specified"),
        or(store.phone.as_deref(), "Not specified"),
        or(store.email.as_deref(), "Not specified"),
        or(store.description.as_deref(), "Not provided"),
        or(store.notes.as_deref(), "Not provided"),
        store_currency(store),
        or(recipient_id, "Not specified"),
    )
}

/// Instructions for one turn. `recipient_id` is the messenger sender, if any.
pub fn store_instructions(store: &Store, recipient_id: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        profile_section(store),
        basic_info_section(store, recipient_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebot_storage::AssistantProfile;

    fn store() -> Store {
        Store {
            id: "s1".into(),
            user_id: "owner".into(),
            name: "Nile Threads".into(),
            ..Store::default()
        }
    }

    #[test]
    fn defaults_fill_missing_profile_and_info() {
        let text = store_instructions(&store(), None);
        assert!(text.starts_with("You are Assistant, a helpful and friendly assistant.\n"));
        assert!(text.contains("You can speak the following languages: English."));
        assert!(text.contains("Store ID: s1\nStore Name: Nile Threads\nCategory: Not specified"));
        assert!(text.contains("Description: Not provided\nNotes: Not provided\nCurrency: EGP"));
        assert!(text.ends_with("Facebook User Recipient ID: Not specified"));
        assert!(!text.contains("Additional Instructions"));
    }

    #[test]
    fn profile_and_recipient_are_rendered() {
        let mut store = store();
        store.currency = Some("USD".into());
        store.email = Some("shop@example.com".into());
        store.assistant_profile = AssistantProfile {
            name: Some("Mona".into()),
            persona: Some("a stylish fashion advisor".into()),
            languages: vec!["Arabic".into(), "English".into()],
            instructions: Some("Never promise same-day delivery.".into()),
        };

        let text = store_instructions(&store, Some("psid-42"));
        assert!(text.starts_with("You are Mona, a stylish fashion advisor.\n"));
        assert!(text.contains("languages: Arabic, English."));
        assert!(text.contains(
            "one by one.\n\nAdditional Instructions:\nNever promise same-day delivery.\n\nStore ID: s1"
        ));
        assert!(text.contains("Email: shop@example.com"));
        assert!(text.contains("Currency: USD"));
        assert!(text.ends_with("Facebook User Recipient ID: psid-42"));
    }
}
