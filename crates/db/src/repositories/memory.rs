use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use synergy_core::analysis::source::{DataSourceError, SalesDataSource, StockDataSource};
use synergy_core::domain::product::{Product, ProductId};
use synergy_core::domain::purchase::{Purchase, PurchaseId, PurchaseItem};
use synergy_core::domain::stock::{StockLot, StockMovement};

/// Sales ledger and stock held in process memory. Serves both data source traits.
#[derive(Default)]
pub struct InMemorySalesStore {
    products: RwLock<HashMap<ProductId, Product>>,
    purchases: RwLock<HashMap<PurchaseId, (Purchase, Vec<PurchaseItem>)>>,
    movements: RwLock<Vec<StockMovement>>,
    lots: RwLock<Vec<StockLot>>,
}

impl InMemorySalesStore {
    pub async fn insert_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Replaces any purchase already stored under the same id, items included.
    pub async fn insert_purchase(&self, purchase: Purchase, items: Vec<PurchaseItem>) {
        self.purchases.write().await.insert(purchase.id, (purchase, items));
    }

    pub async fn insert_movement(&self, movement: StockMovement) {
        self.movements.write().await.push(movement);
    }

    pub async fn insert_lot(&self, lot: StockLot) {
        let mut lots = self.lots.write().await;
        lots.retain(|existing| existing.id != lot.id);
        lots.push(lot);
    }
}

#[async_trait::async_trait]
impl SalesDataSource for InMemorySalesStore {
    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, DataSourceError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn product_by_name(&self, query: &str) -> Result<Option<Product>, DataSourceError> {
        let needle = query.trim().to_lowercase();
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|product| product.name.to_lowercase().contains(&needle))
            .min_by_key(|product| product.id)
            .cloned())
    }

    async fn purchases_in_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Purchase>, DataSourceError> {
        let purchases = self.purchases.read().await;
        let mut matching = purchases
            .values()
            .map(|(purchase, _)| purchase)
            .filter(|purchase| purchase.date >= start && purchase.date <= end)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by_key(|purchase| purchase.id);
        Ok(matching)
    }

    async fn items_for_purchases(
        &self,
        purchase_ids: &[PurchaseId],
    ) -> Result<Vec<PurchaseItem>, DataSourceError> {
        let purchases = self.purchases.read().await;
        let mut items = purchase_ids
            .iter()
            .filter_map(|id| purchases.get(id))
            .flat_map(|(_, items)| items.iter().cloned())
            .collect::<Vec<_>>();
        items.sort_by_key(|item| (item.purchase_id, item.id));
        items.dedup_by_key(|item| (item.purchase_id, item.id));
        Ok(items)
    }
}

#[async_trait::async_trait]
impl StockDataSource for InMemorySalesStore {
    async fn movements_for_product(
        &self,
        product_id: ProductId,
        until: NaiveDate,
    ) -> Result<Vec<StockMovement>, DataSourceError> {
        let mut movements = self
            .movements
            .read()
            .await
            .iter()
            .filter(|movement| movement.product_id == product_id && movement.date <= until)
            .cloned()
            .collect::<Vec<_>>();
        // stable sort keeps insertion order within a day
        movements.sort_by_key(|movement| movement.date);
        Ok(movements)
    }

    async fn lots_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLot>, DataSourceError> {
        let mut lots = self
            .lots
            .read()
            .await
            .iter()
            .filter(|lot| lot.product_id == product_id)
            .cloned()
            .collect::<Vec<_>>();
        lots.sort_by_key(|lot| lot.id);
        Ok(lots)
    }

    async fn products_with_stock(&self) -> Result<Vec<ProductId>, DataSourceError> {
        let mut ids =
            self.movements.read().await.iter().map(|movement| movement.product_id).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use synergy_core::analysis::source::{SalesDataSource, StockDataSource};
    use synergy_core::domain::product::{Product, ProductId};
    use synergy_core::domain::purchase::{Purchase, PurchaseId, PurchaseItem};
    use synergy_core::domain::stock::{StockLot, StockMovement};

    use super::InMemorySalesStore;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("date")
    }

    fn product(id: i64, name: &str) -> Product {
        Product { id: ProductId(id), name: name.to_string(), unit_price: Decimal::new(499, 2) }
    }

    fn item(id: i64, purchase_id: i64, product_id: i64) -> PurchaseItem {
        PurchaseItem {
            id,
            purchase_id: PurchaseId(purchase_id),
            product_id: ProductId(product_id),
            unit_value: Decimal::new(499, 2),
            flyer_flag: None,
        }
    }

    #[tokio::test]
    async fn name_search_is_case_insensitive_and_prefers_lowest_id() {
        let store = InMemorySalesStore::default();
        store.insert_product(product(9, "Coca-cola 2L")).await;
        store.insert_product(product(3, "Coca-cola 600ml")).await;
        store.insert_product(product(1, "Pipoca Yoki")).await;

        let found = store.product_by_name("coca").await.expect("search").expect("product");

        assert_eq!(found.id, ProductId(3));
        assert!(store.product_by_name("heineken").await.expect("search").is_none());
    }

    #[tokio::test]
    async fn purchases_and_items_respect_window_and_ids() {
        let store = InMemorySalesStore::default();
        store
            .insert_purchase(
                Purchase { id: PurchaseId(2), date: day("2023-10-05"), customer_ref: "b".into() },
                vec![item(3, 2, 1)],
            )
            .await;
        store
            .insert_purchase(
                Purchase { id: PurchaseId(1), date: day("2023-10-01"), customer_ref: "a".into() },
                vec![item(1, 1, 1), item(2, 1, 3)],
            )
            .await;

        let purchases =
            store.purchases_in_window(day("2023-10-02"), day("2023-10-05")).await.expect("window");
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].id, PurchaseId(2));

        let items = store
            .items_for_purchases(&[PurchaseId(1), PurchaseId(1), PurchaseId(7)])
            .await
            .expect("items");
        assert_eq!(items.iter().map(|item| item.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn stock_reads_are_bounded_and_ordered() {
        let store = InMemorySalesStore::default();
        for (date, entries) in [("2023-10-03", 5), ("2023-09-01", 20), ("2023-10-20", 10)] {
            store
                .insert_movement(StockMovement {
                    product_id: ProductId(1),
                    date: day(date),
                    entries,
                    outputs: 0,
                    unit_cost: Decimal::new(250, 2),
                })
                .await;
        }
        store
            .insert_lot(StockLot { id: 1, product_id: ProductId(1), quantity: 10, expires_on: None })
            .await;
        store
            .insert_lot(StockLot { id: 1, product_id: ProductId(1), quantity: 12, expires_on: None })
            .await;

        let movements =
            store.movements_for_product(ProductId(1), day("2023-10-10")).await.expect("movements");
        assert_eq!(movements.iter().map(|movement| movement.entries).collect::<Vec<_>>(), vec![20, 5]);

        let lots = store.lots_for_product(ProductId(1)).await.expect("lots");
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 12);

        assert_eq!(store.products_with_stock().await.expect("products"), vec![ProductId(1)]);
    }
}
