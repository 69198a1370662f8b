use actix_web::{App, HttpServer};
use paperclip::actix::{OpenApiExt, web};
use pix_gateway::{
    CertificateBundle, ChargeService, EnvName, EnvironmentConfig, PixClient, PixMetrics,
    RequestIdMiddleware, consultar_pix, consultar_pix_vencimento, create_openapi_spec,
    environment, gerar_pix, gerar_pix_lote, gerar_pix_vencimento, get_metrics, health, ping,
    version,
};
use std::sync::Arc;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger (make sure to run with RUST_LOG=info, for example)
    env_logger::init();

    let env = EnvName::from_env();
    environment::set_active(env);

    let config = match EnvironmentConfig::load(env) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e}");
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let certs = match CertificateBundle::load(&CertificateBundle::default_dir(), env) {
        Ok(certs) => certs,
        Err(e) => {
            error!("certificate error: {e}");
            eprintln!("certificate error: {e}");
            std::process::exit(1);
        }
    };

    let metrics = match PixMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("failed to build metrics registry: {e}");
            std::process::exit(1);
        }
    };

    let agents = match pix_gateway::TlsAgentFactory::new(
        &certs,
        env,
        config.ssl_verify,
        std::time::Duration::from_millis(config.timeout_ms),
    ) {
        Ok(agents) => Arc::new(agents),
        Err(e) => {
            error!("TLS setup error: {e}");
            eprintln!("TLS setup error: {e}");
            std::process::exit(1);
        }
    };

    let client = PixClient::from_config(&config, agents, Some(metrics.clone()));
    let charges = web::Data::new(ChargeService::new(client, &config));
    let metrics_data = web::Data::new(metrics);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    info!(
        ambiente = env.as_str(),
        port,
        base_url = %config.api_base_url,
        "pix-gateway starting"
    );
    println!(
        "pix-gateway [{}] listening on http://0.0.0.0:{port}",
        env.as_str()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap_api_with_spec(create_openapi_spec())
            .app_data(charges.clone())
            .app_data(metrics_data.clone())
            .service(web::resource("/gerar-pix").route(web::post().to(gerar_pix)))
            .service(
                web::resource("/gerar-pix-vencimento")
                    .route(web::post().to(gerar_pix_vencimento)),
            )
            .service(web::resource("/gerar-pix-lote").route(web::post().to(gerar_pix_lote)))
            .service(web::resource("/consultar-pix/{txid}").route(web::get().to(consultar_pix)))
            .service(
                web::resource("/consultar-pix-vencimento/{txid}")
                    .route(web::get().to(consultar_pix_vencimento)),
            )
            .service(web::resource("/health").route(web::get().to(health)))
            .service(web::resource("/ping").route(web::get().to(ping)))
            .service(web::resource("/api/version").route(web::get().to(version)))
            .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
            .with_json_spec_at("/api/spec/v2")
            .build()
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
