use serde::{Serialize, Serializer};
use time::{macros::format_description, OffsetDateTime};

use super::repo_types::{Order, OrderStatus};

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    #[serde(serialize_with = "serialize_uploaded_at")]
    pub uploaded_at: OffsetDateTime,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            number: o.number,
            status: o.status,
            // zero and unset look the same to clients
            accrual: o.accrual.filter(|a| *a > 0.0),
            uploaded_at: o.uploaded_at,
        }
    }
}

/// RFC 3339 with an explicit numeric offset (`+00:00`, never `Z`).
fn serialize_uploaded_at<S: Serializer>(ts: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    let formatted = ts
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ))
        .map_err(serde::ser::Error::custom)?;
    s.serialize_str(&formatted)
}
