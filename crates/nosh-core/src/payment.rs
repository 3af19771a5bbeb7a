//! Payment processor event types.
//!
//! The processor delivers Stripe-shaped JSON envelopes: a `type` string and a
//! `data.object` carrying the payment intent or charge. Parsing reduces the
//! envelope to the cases the reconciler acts on; everything else becomes
//! [`PaymentEvent::Ignored`] so delivery still gets a 2xx.

use crate::{Error, Result};
use serde_json::Value;

/// What a succeeded payment was for, taken from the intent metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPurpose {
    /// A cart checkout: reconciles into per-seller orders.
    Checkout,
    /// A wallet top-up: credits the user's balance ledger, no orders.
    BalanceTopUp,
}

/// A payment processor event, reduced to the cases this subsystem handles.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    PaymentSucceeded {
        payment_reference: String,
        user_id: Option<String>,
        amount: i64,
        currency: String,
        purpose: PaymentPurpose,
    },
    PaymentFailed {
        payment_reference: String,
        user_id: Option<String>,
    },
    ChargeRefunded {
        payment_reference: String,
    },
    SubscriptionCreated {
        user_id: String,
    },
    SubscriptionDeleted {
        user_id: String,
    },
    DisputeCreated {
        payment_reference: String,
    },
    /// An event kind this subsystem does not act on.
    Ignored {
        kind: String,
    },
}

impl PaymentEvent {
    /// Parse a verified webhook body. Fails with [`Error::Validation`] when
    /// the envelope is malformed for a kind we do act on.
    pub fn from_json(body: &Value) -> Result<Self> {
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("event is missing a type".into()))?;
        let object = body
            .get("data")
            .and_then(|d| d.get("object"))
            .ok_or_else(|| Error::Validation("event is missing data.object".into()))?;

        match kind {
            "payment_intent.succeeded" => {
                let purpose = match metadata_str(object, "type") {
                    Some("balance_topup") => PaymentPurpose::BalanceTopUp,
                    _ => PaymentPurpose::Checkout,
                };
                Ok(PaymentEvent::PaymentSucceeded {
                    payment_reference: object_id(object, kind)?,
                    user_id: metadata_str(object, "userId").map(String::from),
                    amount: object.get("amount").and_then(Value::as_i64).unwrap_or(0),
                    currency: object
                        .get("currency")
                        .and_then(Value::as_str)
                        .unwrap_or("gbp")
                        .to_string(),
                    purpose,
                })
            }
            "payment_intent.payment_failed" | "payment_intent.canceled" => {
                Ok(PaymentEvent::PaymentFailed {
                    payment_reference: object_id(object, kind)?,
                    user_id: metadata_str(object, "userId").map(String::from),
                })
            }
            "charge.refunded" => Ok(PaymentEvent::ChargeRefunded {
                payment_reference: charge_payment_reference(object, kind)?,
            }),
            "customer.subscription.created" => Ok(PaymentEvent::SubscriptionCreated {
                user_id: subscription_user(object, kind)?,
            }),
            "customer.subscription.deleted" => Ok(PaymentEvent::SubscriptionDeleted {
                user_id: subscription_user(object, kind)?,
            }),
            "charge.dispute.created" => Ok(PaymentEvent::DisputeCreated {
                payment_reference: charge_payment_reference(object, kind)?,
            }),
            other => Ok(PaymentEvent::Ignored {
                kind: other.to_string(),
            }),
        }
    }
}

fn object_id(object: &Value, kind: &str) -> Result<String> {
    object
        .get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::Validation(format!("{kind} event is missing object id")))
}

/// Charges and disputes reference their parent payment intent; fall back to
/// the object id for processors that deliver flat charge events.
fn charge_payment_reference(object: &Value, kind: &str) -> Result<String> {
    if let Some(intent) = object.get("payment_intent").and_then(Value::as_str) {
        return Ok(intent.to_string());
    }
    object_id(object, kind)
}

fn subscription_user(object: &Value, kind: &str) -> Result<String> {
    metadata_str(object, "userId")
        .or_else(|| object.get("customer").and_then(Value::as_str))
        .map(String::from)
        .ok_or_else(|| Error::Validation(format!("{kind} event has no user reference")))
}

fn metadata_str<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object
        .get("metadata")
        .and_then(|m| m.get(key))
        .and_then(Value::as_str)
}
