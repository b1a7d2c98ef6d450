use serde::{Deserialize, Serialize};

pub const RATINGS_PATH: &str = "/api/ratings";
pub const HEALTH_PATH: &str = "/api/health";

/// A listener's vote on a track.  On the wire: `1` (up) or `-1` (down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i64")]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    pub fn value(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// `0` (no vote) and anything else outside {1, -1} map to `None`.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }
}

impl From<Rating> for i8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl TryFrom<i64> for Rating {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| format!("rating must be 1 or -1, got {}", value))
    }
}

/// Query string of `GET /api/ratings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingsQuery {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub listener_id: Option<String>,
}

/// Body of a successful `GET /api/ratings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingsResponse {
    pub thumbs_up: u64,
    pub thumbs_down: u64,
    /// `1`, `-1`, or `0` when this listener has not voted.
    pub user_rating: i8,
}

impl RatingsResponse {
    pub fn own_rating(&self) -> Option<Rating> {
        Rating::from_value(self.user_rating as i64)
    }
}

/// Body of `POST /api/ratings` as sent by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRating {
    pub artist: String,
    pub title: String,
    pub listener_id: String,
    pub rating: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_time: String,
}

/// Body of every 4xx/5xx from the ratings endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_wire_values() {
        assert_eq!(serde_json::to_string(&Rating::Up).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Rating::Down).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<Rating>("-1").unwrap(), Rating::Down);
        assert!(serde_json::from_str::<Rating>("0").is_err());
        assert!(serde_json::from_str::<Rating>("2").is_err());
    }

    #[test]
    fn test_submit_body_shape() {
        let body = SubmitRating {
            artist: "A".into(),
            title: "B".into(),
            listener_id: "L1".into(),
            rating: Rating::Up,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"artist": "A", "title": "B", "listener_id": "L1", "rating": 1})
        );
    }

    #[test]
    fn test_own_rating() {
        let mut resp = RatingsResponse::default();
        assert_eq!(resp.own_rating(), None);
        resp.user_rating = -1;
        assert_eq!(resp.own_rating(), Some(Rating::Down));
    }
}
