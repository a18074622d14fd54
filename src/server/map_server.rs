use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use actix_web::dev::Service;
use actix_web::{http::header, web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::Result;
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::outbox::{lock, Outbox, OutboxSpeech};
use super::requests::{Request, RequestResponse};
use crate::config::{NavConfig, TileLayer};
use crate::driver::ServiceRunner;
use crate::estate_data::EstateData;
use crate::geo_utils::{EstateBounds, GeoPoint};
use crate::geocoding::GeocodingService;
use crate::narrator::Narrator;
use crate::routing::RoutingService;
use crate::session::{MapCommand, MapSession, SessionEvent};
use crate::speech::SpeechSettings;

/// One browser tab. The session and its outbox are locked separately so a
/// poll for commands never waits on a session that is being updated.
pub struct SessionEntry {
    session: Mutex<MapSession>,
    outbox: Arc<Mutex<Outbox>>,
    last_seen: Mutex<Instant>,
}

impl SessionEntry {
    pub fn new(session: MapSession, outbox: Arc<Mutex<Outbox>>) -> Self {
        SessionEntry {
            session: Mutex::new(session),
            outbox,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *lock(&self.last_seen) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }
}

#[derive(Default, Clone)]
pub struct Registry {
    items: Arc<RwLock<HashMap<Uuid, Arc<SessionEntry>>>>,
}

impl Registry {
    pub fn register(&self, entry: SessionEntry) -> Uuid {
        let id = Uuid::new_v4();
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(id, Arc::new(entry));
        id
    }

    /// Looks up a session and marks it as active.
    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        let entry = items.get(id).cloned();
        if let Some(entry) = &entry {
            entry.touch();
        }
        entry
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.remove(id)
    }

    /// Drops every session idle for at least `max_idle` and returns how
    /// many were dropped.
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|id, entry| {
            let keep = entry.idle_for() < max_idle;
            if !keep {
                info!("session expired: {}", id);
            }
            keep
        });
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What every session of a server shares.
pub struct NavigationContext<R, G> {
    pub config: Arc<NavConfig>,
    pub data: Arc<EstateData>,
    /// Dataset problems found at startup, shown to each new session.
    pub warnings: Vec<String>,
    pub services: ServiceRunner<R, G>,
}

struct AppState<R, G> {
    context: NavigationContext<R, G>,
    registry: Registry,
}

impl<R: RoutingService, G: GeocodingService> AppState<R, G> {
    /// Runs `event` and the events answering its service requests. The
    /// session lock is released before any service call is awaited.
    async fn process(&self, entry: &SessionEntry, event: SessionEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let requests = {
                let mut session = lock(&entry.session);
                let outcome = session.handle(event);
                lock(&entry.outbox).extend(outcome.commands);
                outcome.requests
            };
            for request in requests {
                pending.push_back(self.context.services.execute(request).await);
            }
        }
    }
}

#[derive(Serialize)]
struct ClientConfig<'a> {
    initial_center: GeoPoint,
    initial_zoom: u8,
    bounds: EstateBounds,
    layers: &'a [TileLayer],
}

#[derive(Serialize)]
struct SessionCreated {
    id: Uuid,
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

async fn serve_config<R, G>(data: web::Data<AppState<R, G>>) -> HttpResponse
where
    R: RoutingService + 'static,
    G: GeocodingService + 'static,
{
    let config = &data.context.config;
    HttpResponse::Ok().json(ClientConfig {
        initial_center: config.map.initial_center,
        initial_zoom: config.map.initial_zoom,
        bounds: config.estate.bounds,
        layers: &config.map.layers,
    })
}

async fn create_session<R, G>(req: HttpRequest, data: web::Data<AppState<R, G>>) -> HttpResponse
where
    R: RoutingService + 'static,
    G: GeocodingService + 'static,
{
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok());
    let settings = SpeechSettings::for_user_agent(&data.context.config.speech, user_agent);

    let outbox = Arc::new(Mutex::new(Outbox::default()));
    let narrator = Narrator::new(Box::new(OutboxSpeech::new(outbox.clone())), settings);
    let session = MapSession::new(
        data.context.config.clone(),
        data.context.data.clone(),
        narrator,
    );
    let id = data.registry.register(SessionEntry::new(session, outbox));
    info!("session created: {} ({} active)", id, data.registry.len());

    if let Some(entry) = data.registry.get(&id) {
        let warnings = data.context.warnings.clone();
        data.process(&entry, SessionEvent::Start { warnings }).await;
    }
    HttpResponse::Ok().json(SessionCreated { id })
}

async fn delete_session<R, G>(
    id: web::Path<String>,
    data: web::Data<AppState<R, G>>,
) -> HttpResponse
where
    R: RoutingService + 'static,
    G: GeocodingService + 'static,
{
    match parse_id(&id).and_then(|uuid| data.registry.remove(&uuid)) {
        Some(entry) => {
            info!("dropping session: {}", id);
            data.process(&entry, SessionEvent::Teardown).await;
            let commands = lock(&entry.outbox).drain();
            HttpResponse::Ok().json(commands)
        }
        None => HttpResponse::NotFound().finish(),
    }
}

async fn handle_request<R, G>(
    id: web::Path<String>,
    body: String,
    data: web::Data<AppState<R, G>>,
) -> HttpResponse
where
    R: RoutingService + 'static,
    G: GeocodingService + 'static,
{
    let request = match Request::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("bad request for session {}: {}", id, e);
            return HttpResponse::BadRequest().json(RequestResponse::<()>::failed(
                String::new(),
                format!("Invalid request: {e}"),
            ));
        }
    };

    let entry = match parse_id(&id).and_then(|uuid| data.registry.get(&uuid)) {
        Some(entry) => entry,
        None => {
            return HttpResponse::NotFound().json(RequestResponse::<()>::failed(
                request.request_id,
                "Session not found".to_owned(),
            ))
        }
    };

    data.process(&entry, request.payload.into_event()).await;
    let commands: Vec<MapCommand> = lock(&entry.outbox).drain();
    HttpResponse::Ok().json(RequestResponse::ok(request.request_id, commands))
}

async fn drain_commands<R, G>(
    id: web::Path<String>,
    data: web::Data<AppState<R, G>>,
) -> HttpResponse
where
    R: RoutingService + 'static,
    G: GeocodingService + 'static,
{
    match parse_id(&id).and_then(|uuid| data.registry.get(&uuid)) {
        Some(entry) => {
            let commands = lock(&entry.outbox).drain();
            HttpResponse::Ok().json(commands)
        }
        None => HttpResponse::NotFound().finish(),
    }
}

async fn expire_sessions(registry: Registry, max_idle: Duration) {
    let mut ticker = tokio::time::interval((max_idle / 2).max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let expired = registry.expire_idle(max_idle);
        if expired > 0 {
            info!("{} idle sessions dropped, {} active", expired, registry.len());
        }
    }
}

pub struct MapServer {
    host: String,
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    registry: Registry,
}

impl MapServer {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            shutdown: None,
            handle: None,
            registry: Registry::default(),
        }
    }

    pub fn create_and_start<R, G>(
        host: &str,
        port: u16,
        context: NavigationContext<R, G>,
    ) -> Result<Self>
    where
        R: RoutingService + 'static,
        G: GeocodingService + 'static,
    {
        let mut server = Self::new(host, port);
        server.start(context)?;
        Ok(server)
    }

    /// Base URL of the API. The port is the bound one once started.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // Start the server in a separate thread
    pub fn start<R, G>(&mut self, context: NavigationContext<R, G>) -> Result<()>
    where
        R: RoutingService + 'static,
        G: GeocodingService + 'static,
    {
        if self.handle.is_some() {
            bail!("server already started on {}", self.url());
        }
        let host = self.host.clone();
        let port = self.port;
        let registry = self.registry.clone();
        let max_idle = context.config.server.session_idle_timeout();

        // signals the bound port, or why binding failed
        let (tx, rx) = mpsc::channel::<Result<u16, String>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = thread::Builder::new()
            .name("map-server".into())
            .spawn(move || {
                let sessions = registry.clone();
                let app_state = web::Data::new(AppState { context, registry });
                let runtime = match Runtime::new() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = tx.send(Err(format!("Failed to create Tokio runtime: {e}")));
                        return;
                    }
                };
                runtime.block_on(async move {
                    info!("Setting up server routes...");
                    let server = HttpServer::new(move || {
                        App::new()
                            .app_data(app_state.clone())
                            .wrap_fn(|req, srv| {
                                info!("Incoming request: {} {}", req.method(), req.uri());
                                srv.call(req)
                            })
                            .route("/api/config", web::get().to(serve_config::<R, G>))
                            .route("/api/sessions", web::post().to(create_session::<R, G>))
                            .route(
                                "/api/sessions/{id}",
                                web::delete().to(delete_session::<R, G>),
                            )
                            .route(
                                "/api/sessions/{id}/requests",
                                web::post().to(handle_request::<R, G>),
                            )
                            .route(
                                "/api/sessions/{id}/commands",
                                web::get().to(drain_commands::<R, G>),
                            )
                    })
                    // sessions live in memory only, nothing to drain for long
                    .shutdown_timeout(2)
                    .bind(format!("{}:{}", host, port));

                    let server = match server {
                        Ok(server) => server,
                        Err(e) => {
                            let _ = tx.send(Err(format!("Failed to bind server: {e}")));
                            return;
                        }
                    };

                    // If port was 0, report the one the OS picked
                    let bound_port = server
                        .addrs()
                        .first()
                        .map(|addr| addr.port())
                        .unwrap_or(port);
                    info!("Server bound successfully to {}:{}", host, bound_port);

                    let server = server.run();
                    let server_handle = server.handle();
                    tokio::spawn(async move {
                        let _ = shutdown_rx.await;
                        server_handle.stop(true).await;
                    });

                    let sweep = tokio::spawn(expire_sessions(sessions, max_idle));

                    let _ = tx.send(Ok(bound_port));
                    if let Err(e) = server.await {
                        error!("Server failed to run: {}", e);
                    }
                    sweep.abort();
                });
            })?;

        match rx.recv() {
            Ok(Ok(bound_port)) => {
                self.port = bound_port;
                self.shutdown = Some(shutdown_tx);
                self.handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                bail!(e)
            }
            Err(_) => {
                let _ = handle.join();
                bail!("server thread exited before binding")
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("map server thread panicked");
            }
        }
    }
}

impl Drop for MapServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeechConfig;
    use crate::speech::NoSpeech;

    fn entry() -> SessionEntry {
        let narrator = Narrator::new(
            Box::new(NoSpeech),
            SpeechSettings::new(&SpeechConfig::default(), false),
        );
        let session = MapSession::new(
            Arc::new(NavConfig::default()),
            Arc::new(EstateData::fallback()),
            narrator,
        );
        SessionEntry::new(session, Arc::new(Mutex::new(Outbox::default())))
    }

    #[test]
    fn idle_sessions_expire() {
        let registry = Registry::default();
        let id = registry.register(entry());
        registry.register(entry());

        assert_eq!(registry.expire_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.expire_idle(Duration::ZERO), 2);
        assert!(registry.is_empty());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn lookup_keeps_session_alive() {
        let registry = Registry::default();
        let id = registry.register(entry());
        let max_idle = Duration::from_millis(80);
        thread::sleep(Duration::from_millis(100));

        assert!(registry.get(&id).is_some());
        assert_eq!(registry.expire_idle(max_idle), 0);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(registry.expire_idle(max_idle), 1);
    }
}
