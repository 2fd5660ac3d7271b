use std::convert::Infallible;

use warp::Filter;

use crate::models::GateReply;
use crate::state::SharedState;
use crate::utils::logger::{log_chill_request, log_heartbeat};

// Dependency injection for the watchdog state
fn with_state(state: SharedState) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `POST /heartbeat`, `POST /chill`, `POST /unchill`, `GET /status`, `GET /health`.
pub fn routes(state: SharedState) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let heartbeat = warp::post()
        .and(warp::path!("heartbeat"))
        .and(with_state(state.clone()))
        .and_then(heartbeat_handler);

    let chill = warp::post()
        .and(warp::path!("chill"))
        .and(with_state(state.clone()))
        .and_then(|state| chill_handler(state, true));

    let unchill = warp::post()
        .and(warp::path!("unchill"))
        .and(with_state(state.clone()))
        .and_then(|state| chill_handler(state, false));

    let status = warp::get()
        .and(warp::path!("status"))
        .and(with_state(state))
        .and_then(status_handler);

    let health = warp::get().and(warp::path!("health")).map(|| "OK");

    heartbeat.or(chill).or(unchill).or(status).or(health)
}

async fn heartbeat_handler(state: SharedState) -> Result<impl warp::Reply, warp::Rejection> {
    let unchilled = state.beat();
    log_heartbeat(unchilled);
    Ok(warp::reply::json(&GateReply::heartbeat(state.is_chilled())))
}

async fn chill_handler(state: SharedState, chill: bool) -> Result<impl warp::Reply, warp::Rejection> {
    let applied = state.set_chilled(chill);
    log_chill_request(chill, applied);
    Ok(warp::reply::json(&GateReply::new(applied, state.is_chilled())))
}

async fn status_handler(state: SharedState) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&state.snapshot()))
}
