use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::NavConfig;
use crate::geocoding::{GeocodeError, GeocodingService};
use crate::location::{LocationEvent, LocationSource};
use crate::routing::{RouteError, RoutingService};
use crate::session::{MapCommand, MapSession, ServiceRequest, SessionEvent};

/// Executes the session's service requests. Every call is bounded by the
/// configured timeout and its answer, success or not, becomes an event.
pub struct ServiceRunner<R, G> {
    router: Arc<R>,
    geocoder: Arc<G>,
    routing_timeout: Duration,
    geocoding_timeout: Duration,
}

impl<R, G> Clone for ServiceRunner<R, G> {
    fn clone(&self) -> Self {
        ServiceRunner {
            router: self.router.clone(),
            geocoder: self.geocoder.clone(),
            routing_timeout: self.routing_timeout,
            geocoding_timeout: self.geocoding_timeout,
        }
    }
}

impl<R: RoutingService, G: GeocodingService> ServiceRunner<R, G> {
    pub fn new(config: &NavConfig, router: Arc<R>, geocoder: Arc<G>) -> Self {
        ServiceRunner {
            router,
            geocoder,
            routing_timeout: config.routing.timeout(),
            geocoding_timeout: config.geocoding.timeout(),
        }
    }

    pub async fn execute(&self, request: ServiceRequest) -> SessionEvent {
        match request {
            ServiceRequest::Route(request) => {
                let result = timeout(self.routing_timeout, self.router.route(&request))
                    .await
                    .unwrap_or(Err(RouteError::Timeout));
                match result {
                    Ok(route) => SessionEvent::RouteFound {
                        request_id: request.id,
                        route,
                    },
                    Err(e) => SessionEvent::RoutingFailed {
                        request_id: request.id,
                        error: e.to_string(),
                    },
                }
            }
            ServiceRequest::Geocode(request) => {
                let result = timeout(self.geocoding_timeout, self.geocoder.geocode(&request))
                    .await
                    .unwrap_or(Err(GeocodeError::Timeout));
                match result {
                    Ok(result) => SessionEvent::GeocodeResolved { request, result },
                    Err(e) => SessionEvent::GeocodeFailed {
                        request,
                        error: e.to_string(),
                    },
                }
            }
        }
    }
}

/// Owns a session and runs it to completion against real services. Events
/// are processed strictly one after another.
pub struct SessionDriver<R, G> {
    session: MapSession,
    services: ServiceRunner<R, G>,
}

impl<R: RoutingService, G: GeocodingService> SessionDriver<R, G> {
    pub fn new(session: MapSession, services: ServiceRunner<R, G>) -> Self {
        SessionDriver { session, services }
    }

    pub fn session(&self) -> &MapSession {
        &self.session
    }

    /// Handles `event` and every follow-up event produced by service calls.
    pub async fn dispatch(&mut self, event: SessionEvent) -> Vec<MapCommand> {
        let mut commands = Vec::new();
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let outcome = self.session.handle(event);
            commands.extend(outcome.commands);
            for request in outcome.requests {
                queue.push_back(self.services.execute(request).await);
            }
        }
        commands
    }

    /// Feeds every event of `source` into the session. The source is
    /// unsubscribed only when the session is torn down.
    pub async fn follow<S: LocationSource>(&mut self, source: &mut S) -> Vec<MapCommand> {
        let mut commands = Vec::new();
        while let Some(event) = source.next_event() {
            let event = match event {
                LocationEvent::Fix(fix) => SessionEvent::PositionFix(fix),
                LocationEvent::Failed(error) => SessionEvent::LocationFailed(error),
            };
            commands.extend(self.dispatch(event).await);
            if self.session.is_torn_down() {
                break;
            }
        }
        commands
    }

    pub async fn teardown<S: LocationSource>(&mut self, source: &mut S) -> Vec<MapCommand> {
        source.unsubscribe();
        self.dispatch(SessionEvent::Teardown).await
    }
}
