// src/scheduling/operations.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::PackageContext;
use super::entry::{GroupKey, SessionEntry, TempPackageId};
use super::error::{SessionError, SessionResult};

/* ============================================================
   Wire shapes
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub service_id: Uuid,
    pub session_number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_package_id: Option<TempPackageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub service_id: Uuid,
    pub total_sessions: i32,
    pub temp_package_id: TempPackageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_price: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPriceUpdate {
    pub order_id: Uuid,
    pub final_price: i32,
}

/// Everything the server needs to replay a draft in one transaction:
/// deletes, then new orders, then sessions (temp ids correlate with
/// `new_orders`), then price overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOperations {
    #[serde(default)]
    pub to_delete: Vec<Uuid>,
    #[serde(default)]
    pub to_create: Vec<SessionCreate>,
    #[serde(default)]
    pub new_orders: Vec<NewOrder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_price_updates: Vec<OrderPriceUpdate>,
}

impl SessionOperations {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
            && self.to_create.is_empty()
            && self.new_orders.is_empty()
            && self.order_price_updates.is_empty()
    }

    /// Structural checks for a diff that arrived from a client.
    pub fn validate(&self) -> SessionResult<()> {
        let invalid = |msg: String| Err(SessionError::InvalidOperations(msg));

        let mut deletes = HashSet::new();
        for id in &self.to_delete {
            if !deletes.insert(*id) {
                return invalid(format!("appointment service {id} deleted twice"));
            }
        }

        let mut new_orders: HashMap<&TempPackageId, &NewOrder> = HashMap::new();
        for order in &self.new_orders {
            if order.total_sessions < 1 {
                return invalid(format!(
                    "new order {} must have at least one session",
                    order.temp_package_id
                ));
            }
            if let Some(price) = order.final_price {
                if price < 0 {
                    return Err(SessionError::InvalidPrice(price));
                }
            }
            if new_orders.insert(&order.temp_package_id, order).is_some() {
                return invalid(format!("new order {} listed twice", order.temp_package_id));
            }
        }

        let mut taken: HashSet<(GroupKey, i32)> = HashSet::new();
        for create in &self.to_create {
            if create.session_number < 1 {
                return invalid(format!("session number {} must be >= 1", create.session_number));
            }
            let key = match (&create.order_id, &create.temp_package_id) {
                (Some(order_id), None) => GroupKey::Order(*order_id),
                (None, Some(temp)) => {
                    let Some(order) = new_orders.get(temp) else {
                        return invalid(format!("session refers to unknown new order {temp}"));
                    };
                    if order.service_id != create.service_id {
                        return invalid(format!("session service differs from new order {temp}"));
                    }
                    if create.session_number > order.total_sessions {
                        return invalid(format!(
                            "session {} exceeds new order {temp} ({} sessions)",
                            create.session_number, order.total_sessions
                        ));
                    }
                    GroupKey::Temp(temp.clone())
                }
                _ => {
                    return invalid(
                        "each session needs exactly one of orderId or tempPackageId".to_string(),
                    );
                }
            };
            if !taken.insert((key.clone(), create.session_number)) {
                return invalid(format!(
                    "session {} of {key} created twice",
                    create.session_number
                ));
            }
        }

        for update in &self.order_price_updates {
            if update.final_price < 0 {
                return Err(SessionError::InvalidPrice(update.final_price));
            }
        }
        Ok(())
    }
}

/* ============================================================
   Diff builder
   ============================================================ */

pub fn build_operations(
    entries: &[SessionEntry],
    ctx: &PackageContext,
    price_overrides: &BTreeMap<GroupKey, i32>,
) -> SessionResult<SessionOperations> {
    let mut ops = SessionOperations::default();
    let mut seen_temp: HashSet<&TempPackageId> = HashSet::new();
    let mut seen_orders: HashSet<Uuid> = HashSet::new();

    for entry in entries {
        if let Some(order_id) = entry.order_id() {
            if seen_orders.insert(order_id) {
                if let Some(&final_price) = price_overrides.get(&GroupKey::Order(order_id)) {
                    ops.order_price_updates.push(OrderPriceUpdate {
                        order_id,
                        final_price,
                    });
                }
            }
        }

        if entry.is_marked_for_deletion() {
            if let Some(id) = entry.appointment_service_id() {
                ops.to_delete.push(id);
            }
            continue;
        }
        if !entry.is_new() {
            continue;
        }

        if let Some(temp) = entry.temp_package_id() {
            if seen_temp.insert(temp) {
                let service = ctx.service(entry.service_id)?;
                ops.new_orders.push(NewOrder {
                    service_id: entry.service_id,
                    total_sessions: service.default_sessions,
                    temp_package_id: temp.clone(),
                    final_price: price_overrides.get(&GroupKey::Temp(temp.clone())).copied(),
                });
            }
            ops.to_create.push(SessionCreate {
                order_id: None,
                service_id: entry.service_id,
                session_number: entry.session_number,
                temp_package_id: Some(temp.clone()),
            });
        } else {
            ops.to_create.push(SessionCreate {
                order_id: entry.order_id(),
                service_id: entry.service_id,
                session_number: entry.session_number,
                temp_package_id: None,
            });
        }
    }

    Ok(ops)
}
