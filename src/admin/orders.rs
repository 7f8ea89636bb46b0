//! Order lifecycle

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, ListController, Searchable};
use crate::http::ApiClient;
use crate::AdminError;

pub const LIST_PATH: &str = "/orders/admin-fetch-orders";
pub const PICKUP_LOCATION_REQUIRED: &str = "Pick-up location is required for pickup orders";

/// Where an order is handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryLocationType {
    Pickup,
    Door,
}

impl fmt::Display for DeliveryLocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pickup => f.write_str("PICKUP"),
            Self::Door => f.write_str("DOOR"),
        }
    }
}

impl FromStr for DeliveryLocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PICKUP" => Ok(Self::Pickup),
            "DOOR" => Ok(Self::Door),
            other => Err(format!("unknown delivery location type: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for DeliveryLocationType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<String>,
    /// `None` when absent or not a known type
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub delivery_location_type: Option<DeliveryLocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_up_location: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Searchable for Order {
    fn search_fields(&self) -> Vec<&str> {
        [
            Some(self.id.as_str()),
            self.email.as_deref(),
            self.delivery_status.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Body of `PUT /orders/admin-update-order`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub order_id: String,
    pub user_id: String,
    pub delivery_status: String,
    #[serde(skip)]
    pub location_type: DeliveryLocationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pick_up_location: Option<String>,
}

impl OrderUpdate {
    /// Build an update; `pick_up_location` is required for pickup orders
    /// and dropped for door delivery.
    pub fn new(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        delivery_status: impl Into<String>,
        location_type: DeliveryLocationType,
        pick_up_location: Option<String>,
    ) -> crate::Result<Self> {
        let pick_up_location = pick_up_location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        let pick_up_location = match location_type {
            DeliveryLocationType::Pickup => Some(pick_up_location.ok_or_else(|| {
                AdminError::Validation(PICKUP_LOCATION_REQUIRED.to_string())
            })?),
            DeliveryLocationType::Door => None,
        };

        Ok(Self {
            order_id: order_id.into(),
            user_id: user_id.into(),
            delivery_status: delivery_status.into(),
            location_type,
            pick_up_location,
        })
    }
}

pub struct OrderController {
    list: ListController<Order>,
}

impl OrderController {
    pub fn new(client: Arc<ApiClient>, limit: u32) -> Self {
        Self {
            list: ListController::new(client, LIST_PATH, "orders", limit),
        }
    }

    pub fn list(&self) -> &ListController<Order> {
        &self.list
    }

    pub async fn update(&self, update: &OrderUpdate) -> crate::Result<Option<Value>> {
        tracing::debug!(
            order_id = %update.order_id,
            status = %update.delivery_status,
            location_type = %update.location_type,
            "updating order"
        );
        self.list.begin();
        let result = self
            .list
            .client()
            .put::<Value, _>("/orders/admin-update-order", &[], update)
            .await;
        self.list.settle(result, "Failed to update order").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::Harness;
    use crate::http::RequestBody;
    use serde_json::json;

    #[test]
    fn test_pickup_requires_location() {
        let err = OrderUpdate::new("o1", "u1", "shipped", DeliveryLocationType::Pickup, None)
            .unwrap_err();
        assert_eq!(err.to_string(), PICKUP_LOCATION_REQUIRED);

        let err = OrderUpdate::new(
            "o1",
            "u1",
            "shipped",
            DeliveryLocationType::Pickup,
            Some("   ".into()),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_payload_shape() {
        let pickup = OrderUpdate::new(
            "o1",
            "u1",
            "ready",
            DeliveryLocationType::Pickup,
            Some(" Lekki store ".into()),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&pickup).unwrap(),
            json!({
                "orderId": "o1",
                "userId": "u1",
                "deliveryStatus": "ready",
                "pickUpLocation": "Lekki store"
            })
        );

        let door = OrderUpdate::new(
            "o2",
            "u2",
            "shipped",
            DeliveryLocationType::Door,
            Some("ignored".into()),
        )
        .unwrap();
        let body = serde_json::to_value(&door).unwrap();
        assert!(body.get("pickUpLocation").is_none());
    }

    #[test]
    fn test_location_type_parsing() {
        assert_eq!("pickup".parse::<DeliveryLocationType>(), Ok(DeliveryLocationType::Pickup));
        assert_eq!("DOOR".parse::<DeliveryLocationType>(), Ok(DeliveryLocationType::Door));
        assert!("drone".parse::<DeliveryLocationType>().is_err());
        assert_eq!(
            serde_json::from_value::<DeliveryLocationType>(json!("Door")).unwrap(),
            DeliveryLocationType::Door
        );
        assert!(serde_json::from_value::<DeliveryLocationType>(json!("drone")).is_err());

        let order: Order = serde_json::from_value(json!({
            "_id": "o1", "deliveryLocationType": "PICKUP", "pickUpLocation": "HQ"
        }))
        .unwrap();
        assert_eq!(order.delivery_location_type, Some(DeliveryLocationType::Pickup));
    }

    #[tokio::test]
    async fn test_odd_location_types_keep_the_page() {
        let h = Harness::new();
        h.transport.push_json(
            200,
            json!({"success": true, "data": {"results": [
                {"_id": "o1", "deliveryLocationType": "DOOR"},
                {"_id": "o2", "deliveryLocationType": "pickup", "totalAmount": "42.5"},
                {"_id": "o3", "deliveryLocationType": ""},
                {"_id": "o4", "deliveryLocationType": "DRONE", "totalAmount": 9}
            ], "pages": 1}}),
        );

        let orders = OrderController::new(h.client.clone(), 20);
        orders.list().on_attach().await;

        let view = orders.list().view();
        assert!(view.error.is_none());
        let types: Vec<_> = view.items.iter().map(|o| o.delivery_location_type).collect();
        assert_eq!(
            types,
            vec![
                Some(DeliveryLocationType::Door),
                Some(DeliveryLocationType::Pickup),
                None,
                None
            ]
        );
        assert_eq!(view.items[1].total_amount, Some(42.5));
        assert_eq!(view.items[3].total_amount, Some(9.0));
    }

    #[tokio::test]
    async fn test_update_then_refetch() {
        let h = Harness::new();
        h.transport.push_json(200, json!({"success": true}));
        h.transport.push_json(
            200,
            json!({"success": true, "data": {
                "results": [{"_id": "o1", "deliveryStatus": "shipped"}],
                "pages": 1
            }}),
        );

        let orders = OrderController::new(h.client.clone(), 20);
        let update =
            OrderUpdate::new("o1", "u1", "shipped", DeliveryLocationType::Door, None).unwrap();
        orders.update(&update).await.unwrap();

        let requests = h.transport.requests();
        assert!(requests[0].url.ends_with("/orders/admin-update-order"));
        assert!(requests[0].query.is_empty());
        match &requests[0].body {
            RequestBody::Json(body) => assert_eq!(body["deliveryStatus"], "shipped"),
            other => panic!("unexpected body: {other:?}"),
        }
        assert_eq!(orders.list().view().visible("shipped").len(), 1);
    }
}
