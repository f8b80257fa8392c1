use crate::api::render::{self, InfoPage};
use crate::api::AppState;
use crate::auth::AuthError;
use crate::codec;
use crate::house::HouseId;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

/// Body of every 403
pub const FORBIDDEN_BODY: &str = "403 Forbidden : you can't access this resource.\n";

/// Query parameters shared by every house endpoint
///
/// A repeated parameter keeps its first value. An unparseable query string
/// yields no parameters, which the gate then refuses with a 403.
#[derive(Debug, Default, PartialEq)]
pub struct HouseParams {
    pub id: Option<String>,
    pub api_key: Option<String>,
}

impl HouseParams {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "id" => &mut params.id,
                "api_key" => &mut params.api_key,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for HouseParams {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pairs = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Ok(Self::from_pairs(pairs))
    }
}

/// House API error types
#[derive(Debug)]
pub enum ApiError {
    Forbidden(AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                FORBIDDEN_BODY,
            )
                .into_response(),
        }
    }
}

/// Gate a request on its `id`/`api_key` pair
fn authorize(state: &AppState, path: &str, params: &HouseParams) -> Result<HouseId, ApiError> {
    state
        .gate
        .authorize(params.id.as_deref(), params.api_key.as_deref())
        .map_err(|e| {
            warn!(path = %path, id = ?params.id, error = %e, "403");
            ApiError::Forbidden(e)
        })
}

fn octet_stream(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// GET / - usage text
pub(crate) async fn usage() -> String {
    info!(path = "/", "200");
    render::usage()
}

/// GET /state - one byte, bit N = house N is on
///
/// This is what the houses poll, so it also records the caller as seen.
pub(crate) async fn get_state(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<Response, ApiError> {
    let house = authorize(&state, "/state", &params)?;

    let states = state.store.snapshot().await;
    state.store.record_seen(house).await;

    info!(
        path = "/state",
        house = %house,
        state = %codec::format_bits(codec::encode(&states)),
        "200"
    );
    Ok(octet_stream(vec![codec::state_byte(&states)]))
}

/// GET /on - switch the caller's house on
pub(crate) async fn turn_on(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<String, ApiError> {
    let house = authorize(&state, "/on", &params)?;

    state.store.set(house, true).await;
    state.store.log_event(house, "handle_turn_on").await;

    info!(path = "/on", house = %house, "200");
    Ok(format!("Turned on {}", house))
}

/// GET /off - switch the caller's house off
pub(crate) async fn turn_off(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<String, ApiError> {
    let house = authorize(&state, "/off", &params)?;

    state.store.set(house, false).await;
    state.store.log_event(house, "handle_turn_off").await;

    info!(path = "/off", house = %house, "200");
    Ok(format!("Turned off {}", house))
}

/// GET /target_mac - the 6 raw bytes of the caller's target MAC
///
/// A missing or malformed MAC yields an empty body rather than an error.
pub(crate) async fn target_mac(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<Response, ApiError> {
    let house = authorize(&state, "/target_mac", &params)?;

    let body = match state.target_macs.parsed(house) {
        Ok(mac) => mac.to_vec(),
        Err(e) => {
            warn!(house = %house, error = %e, "Error parsing target MAC");
            Vec::new()
        }
    };
    state.store.log_event(house, "handle_target_mac").await;

    info!(path = "/target_mac", house = %house, mac = %state.target_macs.raw(house), "200");
    Ok(octet_stream(body))
}

/// GET /log - the caller's events, one per line
pub(crate) async fn get_log(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<String, ApiError> {
    let house = authorize(&state, "/log", &params)?;

    let events = state.store.events_for(house).await;

    info!(path = "/log", house = %house, events = events.len(), "200");
    Ok(render::render_log(&events))
}

/// GET /info - human readable dump for the caller's house
pub(crate) async fn get_info(
    State(state): State<Arc<AppState>>,
    params: HouseParams,
) -> Result<String, ApiError> {
    let house = authorize(&state, "/info", &params)?;

    let state_bits = state.store.state_bits().await;
    let last_seen = state.store.last_seen().await;
    let events = state.store.events_for(house).await;

    let page = InfoPage {
        house,
        state_bits,
        target_mac: state.target_macs.raw(house),
        last_seen: &last_seen,
        events: &events,
        now: Utc::now().timestamp(),
    };

    info!(path = "/info", house = %house, "200");
    Ok(page.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessGate;
    use crate::mac::TargetMacs;
    use crate::state::{HouseStore, StoreOptions};

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(HouseStore::new(None, StoreOptions::default())),
            gate: Arc::new(AccessGate::new((0..8).map(|i| format!("K{}", i)))),
            target_macs: Arc::new(TargetMacs::new(vec!["01:02:03:04:05:06".to_string()])),
        })
    }

    fn params(id: &str, key: &str) -> HouseParams {
        HouseParams {
            id: Some(id.to_string()),
            api_key: Some(key.to_string()),
        }
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn house(i: usize) -> HouseId {
        HouseId::new(i).unwrap()
    }

    #[tokio::test]
    async fn test_turn_on_sets_state_and_logs() {
        let state = test_state();

        let body = turn_on(State(state.clone()), params("2", "K2")).await.unwrap();

        assert_eq!(body, "Turned on 2");
        assert!(state.store.get(house(2)).await);
        let events = state.store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].house, house(2));
        assert!(events[0].message.contains("turn_on"));
    }

    #[tokio::test]
    async fn test_turn_off_after_on() {
        let state = test_state();
        turn_on(State(state.clone()), params("1", "K1")).await.unwrap();

        let body = turn_off(State(state.clone()), params("1", "K1")).await.unwrap();

        assert_eq!(body, "Turned off 1");
        assert!(!state.store.get(house(1)).await);
        assert_eq!(state.store.events_for(house(1)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_key_is_forbidden_without_side_effects() {
        let state = test_state();

        let result = turn_on(State(state.clone()), params("5", "wrong")).await;

        assert!(matches!(
            result,
            Err(ApiError::Forbidden(AuthError::KeyMismatch(_)))
        ));
        assert_eq!(state.store.state_bits().await, 0);
        assert!(state.store.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_params_forbidden() {
        let state = test_state();
        let result = get_log(State(state), HouseParams::default()).await;
        assert!(matches!(
            result,
            Err(ApiError::Forbidden(AuthError::InvalidHouseId(_)))
        ));
    }

    #[test]
    fn test_params_first_value_wins() {
        let parsed = HouseParams::from_pairs(pairs(&[
            ("id", "1"),
            ("id", "2"),
            ("api_key", "K1"),
            ("api_key", "K2"),
            ("other", "x"),
        ]));
        assert_eq!(parsed, params("1", "K1"));
    }

    #[test]
    fn test_params_missing_and_unknown() {
        let parsed = HouseParams::from_pairs(pairs(&[("api_key", "K0"), ("debug", "1")]));
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.api_key.as_deref(), Some("K0"));
        assert_eq!(HouseParams::from_pairs(Vec::new()), HouseParams::default());
    }

    #[tokio::test]
    async fn test_get_state_records_last_seen() {
        let state = test_state();
        state.store.set(house(0), true).await;

        get_state(State(state.clone()), params("3", "K3")).await.unwrap();

        let seen = state.store.last_seen().await;
        assert!(seen[3] > 0);
        assert_eq!(seen[0], 0);
        // Polling is not an event
        assert!(state.store.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_target_mac_logs_event() {
        let state = test_state();

        target_mac(State(state.clone()), params("0", "K0")).await.unwrap();
        // Unparseable MAC still succeeds, with an empty body
        target_mac(State(state.clone()), params("6", "K6")).await.unwrap();

        let events = state.store.events().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.message == "handle_target_mac"));
    }

    #[tokio::test]
    async fn test_info_mentions_house() {
        let state = test_state();
        turn_on(State(state.clone()), params("0", "K0")).await.unwrap();

        let body = get_info(State(state), params("0", "K0")).await.unwrap();

        assert!(body.contains("Information on house_id: 0"));
        assert!(body.contains("Current state: 00000001 (1)"));
        assert!(body.contains("Target MAC Address: 01:02:03:04:05:06"));
        assert!(body.contains("House 0: handle_turn_on"));
    }
}
