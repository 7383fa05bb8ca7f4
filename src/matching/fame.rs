const MAX_FAME: f64 = 5.0;
const LIKES_PER_POINT: f64 = 10.0;

/// Fame derived from likes received: one point per ten likes, capped at 5.
pub fn fame_rating(likes_received: i64) -> f64 {
    let raw = (likes_received.max(0) as f64 / LIKES_PER_POINT).min(MAX_FAME);
    (raw * 100.0).round() / 100.0
}
