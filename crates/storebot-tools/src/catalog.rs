// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog search tools: by name, by category and by image similarity.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use storebot_core::{EmbeddingAdapter, StorebotError};
use storebot_storage::queries::catalog;
use storebot_storage::{Database, Item, ItemImage};
use tracing::debug;

/// Upper bound on records returned by any search tool.
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItemsArgs {
    pub store_id: String,
    #[serde(default)]
    pub name_query: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchCategoriesArgs {
    pub store_id: String,
    #[serde(default)]
    pub category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchByImageArgs {
    #[serde(rename = "storeId")]
    pub store_id: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

/// An item matched by image, carrying the matching image and its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: Item,
    pub score: f32,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) async fn search_items(db: &Database, args: &SearchItemsArgs) -> Result<Value, StorebotError> {
    let items = catalog::search_items(
        db,
        &args.store_id,
        non_empty(args.name_query.as_deref()),
        non_empty(args.category_id.as_deref()),
        SEARCH_LIMIT,
    )
    .await?;
    debug!(store_id = %args.store_id, count = items.len(), "item search");
    Ok(json!({ "items": items }))
}

pub(crate) async fn search_categories(
    db: &Database,
    args: &SearchCategoriesArgs,
) -> Result<Value, StorebotError> {
    let categories = catalog::search_categories(
        db,
        &args.store_id,
        non_empty(args.category_name.as_deref()),
        SEARCH_LIMIT,
    )
    .await?;
    Ok(json!({ "categories": categories }))
}

/// Describe the query image, embed the description and rank stored images.
pub(crate) async fn search_items_by_image(
    db: &Database,
    embedder: &dyn EmbeddingAdapter,
    args: &SearchByImageArgs,
) -> Result<Value, StorebotError> {
    let description = embedder.describe_image(&args.image_url).await?;
    let query = embedder.embed(&description).await?;
    let images = catalog::list_embedded_images(db, &args.store_id).await?;
    let ranked = rank_by_similarity(&query, images, SEARCH_LIMIT);
    debug!(
        store_id = %args.store_id,
        description = %description,
        matches = ranked.len(),
        "image search"
    );
    Ok(json!({ "items": ranked }))
}

/// Cosine similarity; zero when either vector has no magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Scores every image against `query` and keeps the best `limit`.
///
/// The sort is stable, so equal scores keep catalog order.
pub fn rank_by_similarity(
    query: &[f32],
    images: Vec<(Item, ItemImage)>,
    limit: usize,
) -> Vec<ScoredItem> {
    let mut scored: Vec<ScoredItem> = images
        .into_iter()
        .filter_map(|(mut item, image)| {
            let embedding = image.embedding.filter(|e| !e.is_empty())?;
            let score = cosine_similarity(query, &embedding);
            item.image_url = Some(image.url);
            Some(ScoredItem { item, score })
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
