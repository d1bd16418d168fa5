//! Entrega del feed de cambios por Server-Sent Events
//!
//! `/api/changes` emite cada evento a administradores y conductores. El
//! seguimiento público emite solo la vista de una solicitud concreta.

use axum::{
    extract::{Path, State},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::controllers::request_controller::RequestController;
use crate::dto::request_dto::TrackingResponse;
use crate::middleware::require_staff;
use crate::models::{ChangeEvent, EmergencyRequest};
use crate::repositories::DispatchStore;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_change_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(all_changes))
        .route_layer(middleware::from_fn_with_state(state, require_staff))
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

async fn all_changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.feed.subscribe();
    debug!("📡 Nuevo suscriptor del feed de cambios");

    let stream = stream::unfold(receiver, |mut receiver| async move {
        match receiver.recv().await {
            Ok(change) => Some((Ok(json_event(change.kind(), &change)), receiver)),
            // El cliente debe recargar su vista
            Err(RecvError::Lagged(skipped)) => {
                warn!("⚠️ Suscriptor SSE retrasado {} eventos", skipped);
                let event = Event::default().event("lagged").data(skipped.to_string());
                Some((Ok(event), receiver))
            }
            Err(RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

struct TrackingCursor {
    receiver: broadcast::Receiver<ChangeEvent>,
    store: Arc<dyn DispatchStore>,
    tracking_code: String,
    initial: Option<TrackingResponse>,
    finished: bool,
}

impl TrackingCursor {
    async fn view(&self, request: &EmergencyRequest) -> TrackingResponse {
        let ambulance = match request.assigned_ambulance_id {
            Some(id) => self.store.find_ambulance(id).await.ok().flatten(),
            None => None,
        };
        TrackingResponse::new(request, ambulance.as_ref())
    }

    async fn next_view(&mut self) -> Option<TrackingResponse> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.receiver.recv().await {
                Ok(ChangeEvent::EmergencyRequests { record, .. })
                    if record.tracking_code == self.tracking_code =>
                {
                    return Some(self.view(&record).await);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    let current = self
                        .store
                        .find_request_by_tracking_code(&self.tracking_code)
                        .await
                        .ok()
                        .flatten()?;
                    return Some(self.view(&current).await);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Seguimiento en vivo de una solicitud; termina al llegar a un estado final
pub async fn tracking_events(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Suscribirse antes de leer para no perder cambios intermedios
    let receiver = state.feed.subscribe();
    let initial = RequestController::new(state.clone()).track(&code).await?;

    let cursor = TrackingCursor {
        receiver,
        store: state.store.clone(),
        tracking_code: initial.tracking_code.clone(),
        initial: Some(initial),
        finished: false,
    };

    let stream = stream::unfold(cursor, |mut cursor| async move {
        if cursor.finished {
            return None;
        }
        let view = cursor.next_view().await?;
        cursor.finished = view.status.is_terminal();
        Some((Ok(json_event("tracking", &view)), cursor))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
