use std::net::TcpListener;

use actix_multipart::form::MultipartFormConfig;
use actix_web::dev::Server;
use actix_web::web;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpServer;
use tracing_actix_web::TracingLogger;

use crate::archive::Archive;
use crate::captcha_client::CaptchaClient;
use crate::configuration::Settings;
use crate::email_client::EmailClient;
use crate::routes::form_error_handler;
use crate::routes::health_check;
use crate::routes::multipart_error_handler;
use crate::routes::submit;
use crate::routes::FORM_LIMIT;
use crate::routing::RouteTable;

/// Wrapper for actix's `Server` with access to the bound port.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Build from settings alone; the archive store (if any) is Redis.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let archive = Archive::from_settings(cfg.archive.as_ref())?;
        Self::build_with_archive(cfg, archive).await
    }

    /// Like `build`, but with a caller-supplied archive; `cfg.archive` is
    /// ignored.
    pub async fn build_with_archive(
        cfg: Settings,
        archive: Archive,
    ) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        let port = listener.local_addr()?.port();

        let email_client = cfg.email_client.client()?;
        let captcha_client = cfg.captcha.client()?;

        tracing::info!(
            port,
            spam_check = captcha_client.is_enabled(),
            archive = archive.is_enabled(),
            request_types = ?cfg
                .routing
                .request_types
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>(),
            "starting form relay"
        );

        let server = run(
            listener,
            email_client,
            captcha_client,
            cfg.routing,
            archive,
        )?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    email_client: EmailClient,
    captcha_client: CaptchaClient,
    route_table: RouteTable,
    archive: Archive,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc`; each worker's `App` gets a clone of the handle, not
    // of the clients
    let email_client = Data::new(email_client);
    let captcha_client = Data::new(captcha_client);
    let route_table = Data::new(route_table);
    let archive = Data::new(archive);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(
                web::FormConfig::default()
                    .limit(FORM_LIMIT)
                    .error_handler(form_error_handler),
            )
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(FORM_LIMIT)
                    .memory_limit(FORM_LIMIT)
                    .error_handler(multipart_error_handler),
            )
            .route("/health_check", web::get().to(health_check))
            .route("/api/appointment", web::post().to(submit))
            .app_data(email_client.clone())
            .app_data(captcha_client.clone())
            .app_data(route_table.clone())
            .app_data(archive.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
