use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::courier::{Courier, CourierStatus, GeoPoint};
use crate::models::dispatch::{Delivery, DeliveryStatus, DispatchRequest, DispatchStatus};
use crate::models::order::{Order, OrderStatus, Payment, PaymentMethod, PaymentStatus};

use super::{DispatchStore, StoreError};

/// DashMap-backed store. Each conditional update runs under the row's shard
/// guard, which gives the per-row atomicity the accept check-and-set relies on.
#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    couriers: DashMap<Uuid, Courier>,
    requests: DashMap<Uuid, DispatchRequest>,
    deliveries: DashMap<Uuid, Delivery>,
    payments: DashMap<Uuid, Payment>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn mark_order_ready(
        &self,
        id: Uuid,
        customer_location: Option<GeoPoint>,
    ) -> Result<bool, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        if !order.status.can_mark_ready() {
            return Ok(false);
        }
        order.status = OrderStatus::Ready;
        if customer_location.is_some() {
            order.customer_location = customer_location;
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn advance_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != from || !from.can_advance_to(to) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_courier(&self, courier: Courier) -> Result<(), StoreError> {
        self.couriers.insert(courier.id, courier);
        Ok(())
    }

    async fn courier(&self, id: Uuid) -> Result<Option<Courier>, StoreError> {
        Ok(self.couriers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn courier_by_actor(&self, actor_id: Uuid) -> Result<Option<Courier>, StoreError> {
        Ok(self
            .couriers
            .iter()
            .find(|entry| entry.value().actor_id == actor_id)
            .map(|entry| entry.value().clone()))
    }

    async fn available_couriers(&self, city: Option<&str>) -> Result<Vec<Courier>, StoreError> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| {
                let courier = entry.value();
                courier.status == CourierStatus::Available
                    && city.is_none_or(|c| courier.city.as_deref() == Some(c))
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_courier_status(
        &self,
        id: Uuid,
        status: CourierStatus,
    ) -> Result<bool, StoreError> {
        let Some(mut courier) = self.couriers.get_mut(&id) else {
            return Ok(false);
        };
        courier.status = status;
        courier.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_courier_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> Result<bool, StoreError> {
        let Some(mut courier) = self.couriers.get_mut(&id) else {
            return Ok(false);
        };
        courier.location = Some(location);
        courier.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_request(&self, request: DispatchRequest) -> Result<(), StoreError> {
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn request(&self, id: Uuid) -> Result<Option<DispatchRequest>, StoreError> {
        Ok(self.requests.get(&id).map(|entry| entry.value().clone()))
    }

    async fn resolve_request_if_pending(
        &self,
        id: Uuid,
        status: DispatchStatus,
    ) -> Result<bool, StoreError> {
        let Some(mut request) = self.requests.get_mut(&id) else {
            return Ok(false);
        };
        if request.status != DispatchStatus::Pending {
            return Ok(false);
        }
        request.status = status;
        Ok(true)
    }

    async fn set_request_status(
        &self,
        id: Uuid,
        status: DispatchStatus,
    ) -> Result<bool, StoreError> {
        let Some(mut request) = self.requests.get_mut(&id) else {
            return Ok(false);
        };
        request.status = status;
        Ok(true)
    }

    async fn attempted_courier_ids(&self, order_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .requests
            .iter()
            .filter(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().courier_id)
            .collect())
    }

    async fn pending_requests_for_courier(
        &self,
        courier_id: Uuid,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        Ok(self
            .requests
            .iter()
            .filter(|entry| {
                let request = entry.value();
                request.courier_id == courier_id && request.status == DispatchStatus::Pending
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn expire_other_pending(
        &self,
        order_id: Uuid,
        winner: Uuid,
    ) -> Result<u64, StoreError> {
        let mut expired = 0;
        for mut entry in self.requests.iter_mut() {
            let request = entry.value_mut();
            if request.order_id == order_id
                && request.id != winner
                && request.status == DispatchStatus::Pending
            {
                request.status = DispatchStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn insert_delivery(&self, delivery: Delivery) -> Result<(), StoreError> {
        self.deliveries.insert(delivery.id, delivery);
        Ok(())
    }

    async fn delivery(&self, id: Uuid) -> Result<Option<Delivery>, StoreError> {
        Ok(self.deliveries.get(&id).map(|entry| entry.value().clone()))
    }

    async fn delivery_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>, StoreError> {
        Ok(self
            .deliveries
            .iter()
            .find(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().clone()))
    }

    async fn advance_delivery(
        &self,
        id: Uuid,
        courier_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(mut delivery) = self.deliveries.get_mut(&id) else {
            return Ok(false);
        };
        if delivery.courier_id != courier_id || delivery.status != from {
            return Ok(false);
        }
        delivery.status = to;
        match to {
            DeliveryStatus::PickedUp => delivery.picked_up_at = Some(at),
            DeliveryStatus::Delivered => delivery.delivered_at = Some(at),
            DeliveryStatus::Assigned => {}
        }
        Ok(true)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.payments.insert(payment.order_id, payment);
        Ok(())
    }

    async fn payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.get(&order_id).map(|entry| entry.value().clone()))
    }

    async fn settle_cash_payment(&self, order_id: Uuid) -> Result<bool, StoreError> {
        let Some(mut payment) = self.payments.get_mut(&order_id) else {
            return Ok(false);
        };
        if payment.method != PaymentMethod::Cash || payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        payment.status = PaymentStatus::Paid;
        Ok(true)
    }
}
