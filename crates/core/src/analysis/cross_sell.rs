use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{percent_of, SalesAnalyzer};
use crate::domain::product::ProductId;
use crate::domain::purchase::{PurchaseId, PurchaseItem};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedProductStat {
    pub product_name: String,
    pub occurrences: u64,
    pub percentage: u64,
}

/// Co-purchase tally for one product, before name resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoPurchase {
    pub product_id: ProductId,
    /// Qualifying purchases this product appeared in.
    pub occurrences: u64,
    pub percentage: u64,
}

/// Ranks the products bought together with `product_id`.
///
/// Only purchases containing `product_id` qualify, and a co-product counts at most once per
/// qualifying purchase. Items are visited by (purchase id, item id); equal percentages keep that
/// first-seen order.
pub fn rank_co_purchases(
    product_id: ProductId,
    items: &[PurchaseItem],
    limit: usize,
) -> Vec<CoPurchase> {
    let mut ordered = items.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|item| (item.purchase_id, item.id));

    let qualifying = ordered
        .iter()
        .filter(|item| item.product_id == product_id)
        .map(|item| item.purchase_id)
        .collect::<BTreeSet<PurchaseId>>();
    if qualifying.is_empty() {
        return Vec::new();
    }

    let mut counted = HashSet::<(PurchaseId, ProductId)>::new();
    let mut slots = HashMap::<ProductId, usize>::new();
    let mut tallies = Vec::<CoPurchase>::new();

    for item in ordered {
        if item.product_id == product_id || !qualifying.contains(&item.purchase_id) {
            continue;
        }
        if !counted.insert((item.purchase_id, item.product_id)) {
            continue;
        }

        match slots.get(&item.product_id) {
            Some(&slot) => tallies[slot].occurrences += 1,
            None => {
                slots.insert(item.product_id, tallies.len());
                tallies.push(CoPurchase {
                    product_id: item.product_id,
                    occurrences: 1,
                    percentage: 0,
                });
            }
        }
    }

    let qualifying_total = qualifying.len() as u64;
    for tally in &mut tallies {
        tally.percentage = percent_of(tally.occurrences, qualifying_total);
    }

    // stable: ties stay in first-seen order
    tallies.sort_by(|left, right| right.percentage.cmp(&left.percentage));
    tallies.truncate(limit);
    tallies
}

impl SalesAnalyzer {
    /// Top co-purchased products for `product_id` among `purchase_ids`.
    pub async fn related_products(
        &self,
        product_id: ProductId,
        purchase_ids: &[PurchaseId],
    ) -> Result<Vec<RelatedProductStat>, ApplicationError> {
        if purchase_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.source.items_for_purchases(purchase_ids).await?;
        self.related_from_items(product_id, &items).await
    }

    pub(crate) async fn related_from_items(
        &self,
        product_id: ProductId,
        items: &[PurchaseItem],
    ) -> Result<Vec<RelatedProductStat>, ApplicationError> {
        let ranked = rank_co_purchases(product_id, items, self.settings.related_limit);
        debug!(
            event_name = "analysis.cross_sell.ranked",
            product_id = product_id.0,
            candidates = items.len(),
            ranked = ranked.len(),
            "co-purchases ranked"
        );

        let mut stats = Vec::with_capacity(ranked.len());
        for co_purchase in ranked {
            let product_name = self
                .source
                .product_by_id(co_purchase.product_id)
                .await?
                .map(|product| product.name)
                .unwrap_or_else(|| format!("Produto {}", co_purchase.product_id));
            stats.push(RelatedProductStat {
                product_name,
                occurrences: co_purchase.occurrences,
                percentage: co_purchase.percentage,
            });
        }
        Ok(stats)
    }
}
