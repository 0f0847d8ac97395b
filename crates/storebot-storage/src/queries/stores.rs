// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store lookups.

use rusqlite::{params, OptionalExtension, Row};
use storebot_core::{Platform, StorebotError};

use crate::database::Database;
use crate::models::Store;
use crate::queries::{json_column, to_json};

const STORE_COLUMNS: &str = "id, user_id, name, category, phone, email, description, notes, \
     currency, facebook_page_id, instagram_page_id, assistant_profile, payment_methods, \
     shipping_policy, return_policy";

fn row_to_store(row: &Row<'_>) -> rusqlite::Result<Store> {
    Ok(Store {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        description: row.get(6)?,
        notes: row.get(7)?,
        currency: row.get(8)?,
        facebook_page_id: row.get(9)?,
        instagram_page_id: row.get(10)?,
        assistant_profile: json_column(row, 11)?,
        payment_methods: json_column(row, 12)?,
        shipping_policy: json_column(row, 13)?,
        return_policy: json_column(row, 14)?,
    })
}

/// Insert a store row.
pub async fn insert_store(db: &Database, store: &Store) -> Result<(), StorebotError> {
    let store = store.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO stores ({STORE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    store.id,
                    store.user_id,
                    store.name,
                    store.category,
                    store.phone,
                    store.email,
                    store.description,
                    store.notes,
                    store.currency,
                    store.facebook_page_id,
                    store.instagram_page_id,
                    to_json(&store.assistant_profile)?,
                    to_json(&store.payment_methods)?,
                    to_json(&store.shipping_policy)?,
                    to_json(&store.return_policy)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a store by id.
pub async fn get_store(db: &Database, id: &str) -> Result<Option<Store>, StorebotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Store>> {
            conn.query_row(
                &format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = ?1"),
                params![id],
                row_to_store,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the store a Facebook page or Instagram account is attached to.
///
/// WhatsApp numbers are not linked to stores and always resolve to `None`.
pub async fn find_store_by_page(
    db: &Database,
    platform: Platform,
    page_id: &str,
) -> Result<Option<Store>, StorebotError> {
    let column = match platform {
        Platform::Facebook => "facebook_page_id",
        Platform::Instagram => "instagram_page_id",
        Platform::Whatsapp | Platform::Web => return Ok(None),
    };
    let page_id = page_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Store>> {
            conn.query_row(
                &format!("SELECT {STORE_COLUMNS} FROM stores WHERE {column} = ?1 LIMIT 1"),
                params![page_id],
                row_to_store,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssistantProfile, ShippingPolicy};
    use crate::queries::test_support::open_db;

    #[tokio::test]
    async fn store_json_columns_round_trip() {
        let (db, _dir) = open_db().await;
        let store = Store {
            id: "s1".into(),
            user_id: "u1".into(),
            name: "Cairo Threads".into(),
            currency: Some("EGP".into()),
            facebook_page_id: Some("page-1".into()),
            assistant_profile: AssistantProfile {
                name: Some("Mona".into()),
                languages: vec!["Arabic".into(), "English".into()],
                ..AssistantProfile::default()
            },
            payment_methods: vec!["CASH".into(), "Card".into()],
            shipping_policy: ShippingPolicy {
                is_shipping: true,
                shipping_days: Some(3),
                ..ShippingPolicy::default()
            },
            ..Store::default()
        };
        insert_store(&db, &store).await.unwrap();

        let loaded = get_store(&db, "s1").await.unwrap().unwrap();
        assert_eq!(loaded, store);
        assert!(get_store(&db, "missing").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_page_uses_platform_column() {
        let (db, _dir) = open_db().await;
        crate::queries::test_support::seed_store(&db, "s1").await;

        let fb = find_store_by_page(&db, Platform::Facebook, "fb-s1").await.unwrap();
        assert_eq!(fb.map(|s| s.id), Some("s1".to_string()));

        let ig = find_store_by_page(&db, Platform::Instagram, "ig-s1").await.unwrap();
        assert!(ig.is_some());

        let crossed = find_store_by_page(&db, Platform::Instagram, "fb-s1").await.unwrap();
        assert!(crossed.is_none());

        let wa = find_store_by_page(&db, Platform::Whatsapp, "fb-s1").await.unwrap();
        assert!(wa.is_none());
        db.close().await.unwrap();
    }
}
