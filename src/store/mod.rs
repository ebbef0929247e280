pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::courier::{Courier, CourierStatus, GeoPoint};
use crate::models::dispatch::{Delivery, DeliveryStatus, DispatchRequest, DispatchStatus};
use crate::models::order::{Order, OrderStatus, Payment};

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed read/write access to dispatch state. No policy lives here beyond the
/// conditional updates themselves: the boolean-returning methods are per-row
/// check-and-set primitives, and their result is the single source of truth
/// for "already resolved".
#[async_trait]
pub trait DispatchStore: Send + Sync {
    // Orders. Owned externally; dispatch reads coordinates/items and writes
    // the ready → rider_assigned → picked_up → delivered edges.
    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    /// Flip a pre-ready order to ready, recording customer coordinates when
    /// the trigger supplies them. Ok(false) if the order is past ready.
    async fn mark_order_ready(
        &self,
        id: Uuid,
        customer_location: Option<GeoPoint>,
    ) -> Result<bool, StoreError>;
    /// Conditional status write: succeeds only if the order still is `from`
    /// and the edge is legal.
    async fn advance_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError>;

    // Couriers.
    async fn insert_courier(&self, courier: Courier) -> Result<(), StoreError>;
    async fn courier(&self, id: Uuid) -> Result<Option<Courier>, StoreError>;
    async fn courier_by_actor(&self, actor_id: Uuid) -> Result<Option<Courier>, StoreError>;
    async fn available_couriers(&self, city: Option<&str>) -> Result<Vec<Courier>, StoreError>;
    async fn set_courier_status(
        &self,
        id: Uuid,
        status: CourierStatus,
    ) -> Result<bool, StoreError>;
    async fn set_courier_location(&self, id: Uuid, location: GeoPoint)
        -> Result<bool, StoreError>;

    // Dispatch requests.
    async fn insert_request(&self, request: DispatchRequest) -> Result<(), StoreError>;
    async fn request(&self, id: Uuid) -> Result<Option<DispatchRequest>, StoreError>;
    /// The accept/expiry arbiter: writes `status` only if the row is still
    /// pending at write time.
    async fn resolve_request_if_pending(
        &self,
        id: Uuid,
        status: DispatchStatus,
    ) -> Result<bool, StoreError>;
    /// Unconditional status write; only used to back out a lost accept race.
    async fn set_request_status(
        &self,
        id: Uuid,
        status: DispatchStatus,
    ) -> Result<bool, StoreError>;
    /// Every courier that ever had a request for this order, resolved or not.
    async fn attempted_courier_ids(&self, order_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    async fn pending_requests_for_courier(
        &self,
        courier_id: Uuid,
    ) -> Result<Vec<DispatchRequest>, StoreError>;
    /// Force every pending sibling of the winning request to expired.
    async fn expire_other_pending(&self, order_id: Uuid, winner: Uuid)
        -> Result<u64, StoreError>;

    // Deliveries.
    async fn insert_delivery(&self, delivery: Delivery) -> Result<(), StoreError>;
    async fn delivery(&self, id: Uuid) -> Result<Option<Delivery>, StoreError>;
    async fn delivery_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>, StoreError>;
    /// Conditional progress write scoped to the owning courier; stamps
    /// picked_up_at / delivered_at according to `to`.
    async fn advance_delivery(
        &self,
        id: Uuid,
        courier_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Payments.
    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError>;
    async fn payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, StoreError>;
    /// Cash-on-delivery settlement: flips a pending cash payment to paid.
    /// Ok(false) when there is nothing to settle (card, already paid, absent).
    async fn settle_cash_payment(&self, order_id: Uuid) -> Result<bool, StoreError>;
}
