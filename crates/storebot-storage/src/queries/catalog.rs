// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog reads used by assistant tools, plus the stock decrement on order.

use rusqlite::{params, OptionalExtension, Row};
use storebot_core::StorebotError;

use crate::database::Database;
use crate::models::{blob_to_vec, vec_to_blob, Category, Item, ItemImage};
use crate::queries::like_pattern;

const ITEM_COLUMNS: &str =
    "i.id, i.store_id, i.category_id, i.name, i.description, i.image_url, i.price, i.stock, i.track_inventory";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        store_id: row.get(1)?,
        category_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        image_url: row.get(5)?,
        price: row.get(6)?,
        stock: row.get(7)?,
        track_inventory: row.get(8)?,
    })
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        store_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

/// Case-insensitive substring search over item names, optionally within one category.
pub async fn search_items(
    db: &Database,
    store_id: &str,
    name: Option<&str>,
    category_id: Option<&str>,
    limit: usize,
) -> Result<Vec<Item>, StorebotError> {
    let store_id = store_id.to_string();
    let pattern = like_pattern(name.unwrap_or_default());
    let category_id = category_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Item>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items i
                 WHERE i.store_id = ?1
                   AND i.name LIKE ?2 ESCAPE '\\'
                   AND (?3 IS NULL OR i.category_id = ?3)
                 ORDER BY i.rowid ASC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(
                params![store_id, pattern, category_id, limit as i64],
                row_to_item,
            )?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Categories of a store, optionally filtered by a name substring.
pub async fn search_categories(
    db: &Database,
    store_id: &str,
    name: Option<&str>,
    limit: usize,
) -> Result<Vec<Category>, StorebotError> {
    let store_id = store_id.to_string();
    let pattern = like_pattern(name.unwrap_or_default());
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Category>> {
            let mut stmt = conn.prepare(
                "SELECT id, store_id, name, description FROM categories
                 WHERE store_id = ?1 AND name LIKE ?2 ESCAPE '\\'
                 ORDER BY rowid ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![store_id, pattern, limit as i64], row_to_category)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every embedded image of a store paired with its item, in stable catalog order.
pub async fn list_embedded_images(
    db: &Database,
    store_id: &str,
) -> Result<Vec<(Item, ItemImage)>, StorebotError> {
    let store_id = store_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<(Item, ItemImage)>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS}, img.id, img.url, img.description, img.embedding
                 FROM item_images img
                 JOIN items i ON i.id = img.item_id
                 WHERE i.store_id = ?1 AND img.embedding IS NOT NULL
                 ORDER BY i.rowid ASC, img.rowid ASC"
            ))?;
            let rows = stmt.query_map(params![store_id], |row| {
                let item = row_to_item(row)?;
                let blob: Vec<u8> = row.get(12)?;
                let image = ItemImage {
                    id: row.get(9)?,
                    item_id: item.id.clone(),
                    url: row.get(10)?,
                    description: row.get(11)?,
                    embedding: Some(blob_to_vec(&blob)),
                };
                Ok((item, image))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get one item of a store.
pub async fn get_item(
    db: &Database,
    store_id: &str,
    item_id: &str,
) -> Result<Option<Item>, StorebotError> {
    let store_id = store_id.to_string();
    let item_id = item_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Item>> {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.store_id = ?1 AND i.id = ?2"),
                params![store_id, item_id],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Decrements stock of an inventory-tracked item, flooring at zero.
///
/// Returns `false` when the item does not exist or does not track inventory.
pub async fn decrement_stock(
    db: &Database,
    store_id: &str,
    item_id: &str,
    quantity: u32,
) -> Result<bool, StorebotError> {
    let store_id = store_id.to_string();
    let item_id = item_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute(
                "UPDATE items SET stock = MAX(stock - ?3, 0)
                 WHERE store_id = ?1 AND id = ?2 AND track_inventory = 1",
                params![store_id, item_id, quantity],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a category row.
pub async fn insert_category(db: &Database, category: &Category) -> Result<(), StorebotError> {
    let category = category.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO categories (id, store_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.id,
                    category.store_id,
                    category.name,
                    category.description
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert an item row.
pub async fn insert_item(db: &Database, item: &Item) -> Result<(), StorebotError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO items (id, store_id, category_id, name, description, image_url, price, stock, track_inventory)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    item.id,
                    item.store_id,
                    item.category_id,
                    item.name,
                    item.description,
                    item.image_url,
                    item.price,
                    item.stock,
                    item.track_inventory,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert an item image with its embedding.
pub async fn insert_item_image(db: &Database, image: &ItemImage) -> Result<(), StorebotError> {
    let image = image.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO item_images (id, item_id, url, description, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    image.id,
                    image.item_id,
                    image.url,
                    image.description,
                    image.embedding.as_deref().map(vec_to_blob),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{open_db, seed_store};

    fn item(id: &str, store: &str, category: Option<&str>, name: &str) -> Item {
        Item {
            id: id.into(),
            store_id: store.into(),
            category_id: category.map(Into::into),
            name: name.into(),
            description: format!("{name} description"),
            image_url: None,
            price: 100.0,
            stock: 5,
            track_inventory: true,
        }
    }

    async fn seed_catalog(db: &Database) {
        seed_store(db, "s1").await;
        seed_store(db, "s2").await;
        for (id, name) in [("c1", "Shirts"), ("c2", "Shoes")] {
            insert_category(
                db,
                &Category {
                    id: id.into(),
                    store_id: "s1".into(),
                    name: name.into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        }
        insert_item(db, &item("i1", "s1", Some("c1"), "Red Shirt")).await.unwrap();
        insert_item(db, &item("i2", "s1", Some("c1"), "Blue shirt")).await.unwrap();
        insert_item(db, &item("i3", "s1", Some("c2"), "Running Shoe")).await.unwrap();
        insert_item(db, &item("i4", "s2", None, "Red Shirt")).await.unwrap();
    }

    #[tokio::test]
    async fn search_items_is_case_insensitive_and_store_scoped() {
        let (db, _dir) = open_db().await;
        seed_catalog(&db).await;

        let shirts = search_items(&db, "s1", Some("SHIRT"), None, 10).await.unwrap();
        let ids: Vec<_> = shirts.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);

        let in_shoes = search_items(&db, "s1", Some("shirt"), Some("c2"), 10).await.unwrap();
        assert!(in_shoes.is_empty());

        let all = search_items(&db, "s1", None, None, 2).await.unwrap();
        assert_eq!(all.len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn search_categories_filters_by_name() {
        let (db, _dir) = open_db().await;
        seed_catalog(&db).await;

        let all = search_categories(&db, "s1", None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        let shoes = search_categories(&db, "s1", Some("sho"), 10).await.unwrap();
        assert_eq!(shoes.len(), 1);
        assert_eq!(shoes[0].name, "Shoes");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn embedded_images_keep_catalog_order() {
        let (db, _dir) = open_db().await;
        seed_catalog(&db).await;
        for (id, item_id, embedding) in [
            ("img1", "i1", Some(vec![1.0, 0.0])),
            ("img2", "i2", Some(vec![0.0, 1.0])),
            ("img3", "i3", None),
            ("img4", "i4", Some(vec![1.0, 1.0])),
        ] {
            insert_item_image(
                &db,
                &ItemImage {
                    id: id.into(),
                    item_id: item_id.into(),
                    url: format!("https://cdn.example.com/{id}.jpg"),
                    description: None,
                    embedding,
                },
            )
            .await
            .unwrap();
        }

        let images = list_embedded_images(&db, "s1").await.unwrap();
        let ids: Vec<_> = images.iter().map(|(_, img)| img.id.as_str()).collect();
        assert_eq!(ids, vec!["img1", "img2"]);
        assert_eq!(images[1].1.embedding.as_deref(), Some(&[0.0f32, 1.0][..]));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stock_decrement_floors_at_zero() {
        let (db, _dir) = open_db().await;
        seed_catalog(&db).await;

        assert!(decrement_stock(&db, "s1", "i1", 3).await.unwrap());
        assert_eq!(get_item(&db, "s1", "i1").await.unwrap().unwrap().stock, 2);

        assert!(decrement_stock(&db, "s1", "i1", 10).await.unwrap());
        assert_eq!(get_item(&db, "s1", "i1").await.unwrap().unwrap().stock, 0);

        assert!(!decrement_stock(&db, "s2", "i1", 1).await.unwrap());
        db.close().await.unwrap();
    }
}
