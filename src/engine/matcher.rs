use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::courier::{Courier, GeoPoint};

/// Pickup leg weighted higher than the dropoff leg.
const PICKUP_WEIGHT: f64 = 0.6;
const DROPOFF_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub courier: Courier,
    pub distance_to_restaurant_km: f64,
    pub distance_to_customer_km: Option<f64>,
    pub score: f64,
}

/// Weighted-distance match score for one courier. A courier without a live
/// position is scored from the fallback coordinate rather than skipped.
pub fn score_courier(
    pickup: GeoPoint,
    dropoff: Option<GeoPoint>,
    courier: Courier,
    fallback: GeoPoint,
) -> Candidate {
    let position = courier.location.unwrap_or(fallback);
    let distance_to_restaurant_km = haversine_km(&pickup, &position);
    let distance_to_customer_km = dropoff.map(|d| haversine_km(&d, &position));

    let score = match distance_to_customer_km {
        Some(to_customer) => {
            PICKUP_WEIGHT * distance_to_restaurant_km + DROPOFF_WEIGHT * to_customer
        }
        None => distance_to_restaurant_km,
    };

    Candidate {
        courier,
        distance_to_restaurant_km,
        distance_to_customer_km,
        score,
    }
}

/// Scores the field and returns it best-first, dropping couriers that were
/// already offered this order in an earlier round.
pub fn rank(
    pickup: GeoPoint,
    dropoff: Option<GeoPoint>,
    couriers: Vec<Courier>,
    attempted: &[Uuid],
    fallback: GeoPoint,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = couriers
        .into_iter()
        .filter(|courier| !attempted.contains(&courier.id))
        .map(|courier| score_courier(pickup, dropoff, courier, fallback))
        .collect();

    candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
    candidates
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
