//! Cart rules shared by the persisted per-user cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::catalog::Product;

/// The product fields a cart line keeps so totals do not need the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductSnapshot {
    pub id: i64,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub thumbnail: String,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
            thumbnail: product.thumbnail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product: ProductSnapshot,
    pub quantity: i32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be greater than 0, got {0}")]
    InvalidQuantity(i32),
    #[error("quantity for product {0} exceeds the allowed maximum")]
    QuantityOverflow(i64),
}

/// What `Cart::remove_one` did to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Decremented(i32),
    Deleted,
    Missing,
}

/// Ordered list of lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if let Err(err) = cart.add(line) {
                tracing::warn!(error = %err, "skipping invalid cart line");
            }
        }
        cart
    }

    /// Merge a line into the cart, returning the resulting quantity.
    pub fn add(&mut self, line: CartLine) -> Result<i32, CartError> {
        if line.quantity < 1 {
            return Err(CartError::InvalidQuantity(line.quantity));
        }
        match self.find_mut(line.product.id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(CartError::QuantityOverflow(line.product.id))?;
                Ok(existing.quantity)
            }
            None => {
                let quantity = line.quantity;
                self.lines.push(line);
                Ok(quantity)
            }
        }
    }

    /// Take one unit away, dropping the line when it was the last one.
    pub fn remove_one(&mut self, product_id: i64) -> Removal {
        let Some(index) = self.lines.iter().position(|l| l.product.id == product_id) else {
            return Removal::Missing;
        };
        let line = &mut self.lines[index];
        if line.quantity > 1 {
            line.quantity -= 1;
            Removal::Decremented(line.quantity)
        } else {
            self.lines.remove(index);
            Removal::Deleted
        }
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn get(&self, product_id: i64) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product.id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn find_mut(&mut self, product_id: i64) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product.id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            product: ProductSnapshot {
                id,
                title: format!("Product {id}"),
                price,
                thumbnail: String::new(),
            },
            quantity,
        }
    }

    #[test]
    fn add_appends_new_product() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, Decimal::from(100), 2)), Ok(2));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn add_merges_quantity_for_same_product() {
        let mut cart = Cart::new();
        cart.add(line(1, Decimal::from(100), 2)).unwrap();
        assert_eq!(cart.add(line(1, Decimal::from(100), 2)), Ok(4));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.get(1).map(|l| l.quantity), Some(4));
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add(line(1, Decimal::from(100), 0)),
            Err(CartError::InvalidQuantity(0))
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn add_rejects_merge_past_i32_max() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, Decimal::ONE, i32::MAX)), Ok(i32::MAX));
        assert_eq!(
            cart.add(line(1, Decimal::ONE, 1)),
            Err(CartError::QuantityOverflow(1))
        );
        assert_eq!(cart.get(1).map(|l| l.quantity), Some(i32::MAX));
    }

    #[test]
    fn remove_one_decrements_then_deletes() {
        let mut cart = Cart::new();
        cart.add(line(1, Decimal::from(100), 2)).unwrap();

        assert_eq!(cart.remove_one(1), Removal::Decremented(1));
        assert_eq!(cart.get(1).map(|l| l.quantity), Some(1));

        assert_eq!(cart.remove_one(1), Removal::Deleted);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_one_of_unknown_product_is_noop() {
        let mut cart = Cart::new();
        cart.add(line(1, Decimal::from(100), 1)).unwrap();
        assert_eq!(cart.remove_one(7), Removal::Missing);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let mut cart = Cart::new();
        cart.add(line(1, Decimal::from(100), 2)).unwrap();
        cart.add(line(2, Decimal::new(1999, 2), 3)).unwrap();
        assert_eq!(cart.total(), Decimal::new(25997, 2));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(Cart::new().total(), Decimal::ZERO);
    }

    #[test]
    fn clear_drops_every_line() {
        let mut cart = Cart::from_lines(vec![line(1, Decimal::ONE, 1), line(2, Decimal::ONE, 5)]);
        assert_eq!(cart.lines().len(), 2);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn from_lines_skips_invalid_rows() {
        let cart = Cart::from_lines(vec![line(1, Decimal::ONE, 0), line(2, Decimal::ONE, 1)]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].product.id, 2);
    }
}
