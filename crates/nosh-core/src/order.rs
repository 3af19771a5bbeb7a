//! Cart snapshots and per-seller orders.
//!
//! All monetary amounts are integer minor units (pence).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of a checkout cart, captured at checkout-intent time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub dish_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

/// Checkout snapshot keyed by the external payment reference.
///
/// Created before the payment processor confirms success, and the sole source
/// of truth for "what was in the cart": the live cart may have changed or been
/// cleared by the time payment confirms. Consumed exactly once by the
/// reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub payment_reference: String,
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub delivery_address: Option<String>,
    pub special_instructions: Option<String>,
    pub nosh_points_applied: Option<i64>,
    pub game_debt_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingOrder {
    pub fn cart_total(&self) -> i64 {
        self.items.iter().map(CartLine::line_total).sum()
    }
}

/// A finalized per-seller order, created only by the reconciler.
///
/// One snapshot fans out into one order per distinct seller, linked by the
/// shared payment reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: String,
    pub chef_id: String,
    pub items: Vec<CartLine>,
    pub total_amount: i64,
    pub payment_reference: String,
    pub payment_method: String,
    pub nosh_points_applied: i64,
    pub game_debt_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A snapshot's lines grouped under one seller, with that seller's share of
/// any applied loyalty points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerGroup {
    pub chef_id: String,
    pub items: Vec<CartLine>,
    pub subtotal: i64,
    pub points_share: i64,
}

/// Partition resolved cart lines by owning seller and split applied loyalty
/// points proportionally by subtotal, rounding down.
///
/// Groups appear in first-seller-appearance order. Floor division can
/// under-allocate up to (sellers - 1) points in total versus the original
/// pool; the remainder is deliberately not redistributed.
pub fn partition_by_seller(lines: &[(String, CartLine)], points_applied: i64) -> Vec<SellerGroup> {
    let mut groups: Vec<SellerGroup> = Vec::new();
    for (chef_id, line) in lines {
        match groups.iter_mut().find(|g| g.chef_id == *chef_id) {
            Some(group) => {
                group.subtotal += line.line_total();
                group.items.push(line.clone());
            }
            None => groups.push(SellerGroup {
                chef_id: chef_id.clone(),
                items: vec![line.clone()],
                subtotal: line.line_total(),
                points_share: 0,
            }),
        }
    }

    let cart_total: i64 = groups.iter().map(|g| g.subtotal).sum();
    if points_applied > 0 && cart_total > 0 {
        for group in &mut groups {
            group.points_share = points_applied * group.subtotal / cart_total;
        }
    }

    groups
}
