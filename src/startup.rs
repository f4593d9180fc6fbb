use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{InMemoryUserDirectory, TokenService, UserDirectory};
use crate::cleanup::CleanupScheduler;
use crate::clock::SystemClock;
use crate::configuration::{CookieSettings, Settings};
use crate::error::{json_error_handler, AppError};
use crate::fingerprint::TrustedProxies;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, refresh};

/// Shared state handed to every worker
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub directory: Arc<dyn UserDirectory>,
    pub cookies: CookieSettings,
    pub trusted_proxies: TrustedProxies,
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let tokens = web::Data::from(state.tokens.clone());
    let directory: web::Data<dyn UserDirectory> = web::Data::from(state.directory.clone());
    let cookies = web::Data::new(state.cookies.clone());
    let proxies = web::Data::new(state.trusted_proxies.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())

            // Shared state
            .app_data(tokens.clone())
            .app_data(directory.clone())
            .app_data(cookies.clone())
            .app_data(proxies.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout)),
            )

            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(
                        state.tokens.clone(),
                        state.directory.clone(),
                        state.trusted_proxies.clone(),
                    ))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Fully wired service: HTTP server plus the cleanup scheduler
pub struct Application {
    port: u16,
    server: Server,
    scheduler: CleanupScheduler,
}

impl Application {
    /// Validate settings, build the session engine and bind the listener
    ///
    /// # Errors
    /// Returns `AppError::Config` for unusable settings and
    /// `AppError::Internal` if the address cannot be bound
    pub fn build(settings: Settings) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenService::new(settings.jwt.clone(), Arc::new(SystemClock))?);
        let directory = InMemoryUserDirectory::from_seed(&settings.users)?;
        tracing::info!(users = directory.len(), "User directory loaded");

        let address = settings.application.address();
        let listener = TcpListener::bind(&address)
            .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", address, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .port();
        tracing::info!("Server listening on: {}", address);

        let scheduler = CleanupScheduler::new(
            tokens.clone(),
            Duration::from_secs(settings.cleanup.interval_seconds.max(1)),
        );

        let state = AppState {
            tokens,
            directory: Arc::new(directory),
            cookies: settings.cookie,
            trusted_proxies: TrustedProxies::new(settings.application.trusted_proxies),
        };
        let server = run(listener, state).map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            port,
            server,
            scheduler,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run until the server shuts down, then stop the scheduler
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.scheduler.start();
        let result = self.server.await;
        self.scheduler.stop().await;
        result
    }
}
