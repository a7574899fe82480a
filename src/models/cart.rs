use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ServiceError;

pub const INVALID_CART_UPDATE: &str = "Item not found in cart or invalid quantity";

/// A user's cart: item id -> size -> quantity.
///
/// Stored as a JSON column on the user row. Only positive quantities are ever
/// kept; a size at zero is dropped and an item left with no sizes is dropped.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
#[serde(transparent)]
pub struct CartData(BTreeMap<String, BTreeMap<String, i64>>);

impl CartData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `[item_id][size]` by one and returns the new quantity.
    pub fn add_one(&mut self, item_id: &str, size: &str) -> i64 {
        let qty = self
            .0
            .entry(item_id.to_string())
            .or_default()
            .entry(size.to_string())
            .or_insert(0);
        *qty += 1;
        *qty
    }

    /// Overwrites the quantity for `(item_id, size)`.
    ///
    /// Zero removes the entry (pruning the item when it has no sizes left).
    /// Negative quantities, and zero for a pair that is not in the cart, are
    /// rejected.
    pub fn set_quantity(
        &mut self,
        item_id: &str,
        size: &str,
        quantity: i64,
    ) -> Result<(), ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::InvalidArgument(INVALID_CART_UPDATE.into()));
        }

        if quantity == 0 {
            let sizes = self
                .0
                .get_mut(item_id)
                .ok_or_else(|| ServiceError::InvalidArgument(INVALID_CART_UPDATE.into()))?;
            if sizes.remove(size).is_none() {
                return Err(ServiceError::InvalidArgument(INVALID_CART_UPDATE.into()));
            }
            if sizes.is_empty() {
                self.0.remove(item_id);
            }
            return Ok(());
        }

        self.0
            .entry(item_id.to_string())
            .or_default()
            .insert(size.to_string(), quantity);
        Ok(())
    }

    pub fn quantity(&self, item_id: &str, size: &str) -> Option<i64> {
        self.0.get(item_id).and_then(|sizes| sizes.get(size)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of every quantity in the cart
    pub fn total_quantity(&self) -> i64 {
        self.0.values().flat_map(|sizes| sizes.values()).sum()
    }

    pub fn items(&self) -> &BTreeMap<String, BTreeMap<String, i64>> {
        &self.0
    }

    /// Every stored quantity is positive and no item map is empty.
    pub fn is_well_formed(&self) -> bool {
        self.0
            .values()
            .all(|sizes| !sizes.is_empty() && sizes.values().all(|q| *q > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn add_one_creates_nested_entries() {
        let mut cart = CartData::new();
        assert_eq!(cart.add_one("p1", "M"), 1);
        assert_eq!(cart.add_one("p1", "M"), 2);
        assert_eq!(cart.add_one("p1", "L"), 1);
        assert_eq!(cart.quantity("p1", "M"), Some(2));
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn zero_quantity_removes_size_and_prunes_item() {
        let mut cart = CartData::new();
        cart.add_one("p1", "M");
        cart.set_quantity("p1", "M", 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(serde_json::to_string(&cart).unwrap(), "{}");
    }

    #[test]
    fn zero_quantity_keeps_other_sizes() {
        let mut cart = CartData::new();
        cart.add_one("p1", "M");
        cart.add_one("p1", "L");
        cart.set_quantity("p1", "M", 0).unwrap();
        assert_eq!(cart.quantity("p1", "L"), Some(1));
        assert_eq!(cart.quantity("p1", "M"), None);
    }

    #[test]
    fn zero_for_missing_pair_is_rejected() {
        let mut cart = CartData::new();
        assert_matches!(
            cart.set_quantity("ghost", "M", 0),
            Err(ServiceError::InvalidArgument(msg)) if msg == INVALID_CART_UPDATE
        );
    }

    #[test]
    fn negative_quantity_is_rejected_even_for_existing_pair() {
        let mut cart = CartData::new();
        cart.add_one("p1", "M");
        assert_matches!(
            cart.set_quantity("p1", "M", -2),
            Err(ServiceError::InvalidArgument(_))
        );
        assert_eq!(cart.quantity("p1", "M"), Some(1));
    }

    #[test]
    fn positive_quantity_creates_or_overwrites() {
        let mut cart = CartData::new();
        cart.set_quantity("p2", "S", 4).unwrap();
        cart.set_quantity("p2", "S", 7).unwrap();
        assert_eq!(cart.quantity("p2", "S"), Some(7));
    }

    #[test]
    fn serializes_as_nested_map() {
        let mut cart = CartData::new();
        cart.add_one("p1", "M");
        cart.add_one("p1", "M");
        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(value, serde_json::json!({ "p1": { "M": 2 } }));
    }
}
