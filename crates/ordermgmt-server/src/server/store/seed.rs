use super::OrderStore;
use ordermgmt_core::proto::Order;

impl OrderStore {
    /// Loads the sample orders served by a fresh deployment.
    ///
    /// Existing orders with the same ids are replaced.
    pub fn seed_sample_orders(&self) {
        for (id, items, destination, price) in [
            ("102", &["Google X1", "Mac X1"][..], "shenzhen", 1800.01),
            ("103", &["Apple X1"][..], "changsha", 400.99),
            ("104", &["Google X2", "XXXXX555"][..], "shenzhen", 400.71),
            ("105", &["Amazon X1"][..], "shenzhen", 30.12),
            ("106", &["Amazon X2", "Apple X5"][..], "shenzhen", 300.88),
        ] {
            self.put(Order {
                id: id.to_string(),
                items: items.iter().map(ToString::to_string).collect(),
                destination: destination.to_string(),
                price,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_five_orders() {
        let store = OrderStore::new();
        store.seed_sample_orders();
        store.seed_sample_orders();

        assert_eq!(store.len(), 5);
        assert_eq!(store.get("103").unwrap().destination, "changsha");
        assert_eq!(store.search_items("Google").len(), 2);
    }
}
