//! Integration tests for the HTTP surface
//!
//! Spins up the handlers against a mock provider and exercises the full
//! create/query flows plus request validation.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, test, web};
use pix_gateway::{
    ChargeService, EnvName, EnvironmentConfig, HttpTokenExchange, PixClient, PixMetrics,
    TlsAgentFactory, TokenManager, consultar_pix, consultar_pix_vencimento, gerar_pix,
    gerar_pix_lote, gerar_pix_vencimento, health, ping, version,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COPY_PASTE: &str = "00020126580014br.gov.bcb.pix0136chave-homolog@example.com520400005303986540615";

fn test_config(server_uri: &str) -> EnvironmentConfig {
    EnvironmentConfig {
        name: EnvName::Homolog,
        api_base_url: server_uri.to_string(),
        token_url: format!("{server_uri}/oauth/token"),
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        pix_key: Some("chave-homolog@example.com".to_string()),
        ssl_verify: true,
        timeout_ms: 5_000,
        retry_attempts: 3,
    }
}

fn charge_service(config: &EnvironmentConfig) -> ChargeService {
    let agents = Arc::new(TlsAgentFactory::without_identity(
        EnvName::Homolog,
        Duration::from_secs(5),
    ));
    let exchange = HttpTokenExchange::new(Arc::clone(&agents), config);
    let tokens = Arc::new(TokenManager::new(exchange));
    ChargeService::new(PixClient::new(agents, tokens, config, None), config)
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

macro_rules! charge_app {
    ($config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(charge_service($config)))
                .app_data(web::Data::new(PixMetrics::new().unwrap()))
                .route("/gerar-pix", web::post().to(gerar_pix))
                .route("/gerar-pix-vencimento", web::post().to(gerar_pix_vencimento))
                .route("/gerar-pix-lote", web::post().to(gerar_pix_lote))
                .route("/consultar-pix/{txid}", web::get().to(consultar_pix))
                .route(
                    "/consultar-pix-vencimento/{txid}",
                    web::get().to(consultar_pix_vencimento),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn health_and_ping_report_uptime() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(PixMetrics::new().unwrap()))
            .route("/health", web::get().to(health))
            .route("/ping", web::get().to(ping)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["service"], "pix-gateway");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ambiente"], "homolog");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "pong");
}

#[actix_web::test]
async fn version_always_answers() {
    let app = test::init_service(
        App::new().route("/api/version", web::get().to(version)),
    )
    .await;

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/api/version").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[actix_web::test]
async fn immediate_charge_end_to_end() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";

    // The provider must receive the normalized CPF and the two-decimal amount.
    Mock::given(method("POST"))
        .and(path("/cob"))
        .and(body_partial_json(json!({
            "devedor": { "nome": "Maria Silva", "cpf": "52998224725" },
            "valor": { "original": "150.00" },
            "chave": "chave-homolog@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "txid": txid,
            "status": "ATIVA"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "status": "ATIVA",
            "pixCopiaECola": COPY_PASTE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix")
        .set_json(json!({
            "pagamento": {
                "Pagador": "Maria Silva",
                "Inscricao": "529.982.247-25",
                "Valor Pix": "150,00"
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sucesso"], true);
    assert_eq!(body["txid"], txid);
    assert_eq!(body["pixCopiaECola"], COPY_PASTE);
    assert_eq!(body["valor"], "150.00");
    assert_eq!(body["pagador"], "Maria Silva");
    assert_eq!(body["ambiente"], "homolog");
}

#[actix_web::test]
async fn copy_paste_code_arrives_on_the_second_fetch() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";
    Mock::given(method("POST"))
        .and(path("/cob"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "txid": txid })))
        .expect(1)
        .mount(&server)
        .await;
    // The provider lags: the first fetch has no copy-and-paste code yet.
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "status": "ATIVA"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "status": "ATIVA",
            "pixCopiaECola": COPY_PASTE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix")
        .set_json(json!({
            "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pixCopiaECola"], COPY_PASTE);
}

#[actix_web::test]
async fn failed_fetch_after_creation_propagates_without_a_second_fetch() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";
    Mock::given(method("POST"))
        .and(path("/cob"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "txid": txid })))
        .expect(1)
        .mount(&server)
        .await;
    // A terminal provider failure on the follow-up fetch must surface
    // immediately; only one GET is allowed.
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"erro": "nao encontrada"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix")
        .set_json(json!({
            "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn due_date_charge_uses_a_client_generated_txid() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let due = (chrono::Utc::now().date_naive() + chrono::Days::new(10)).to_string();

    Mock::given(method("PUT"))
        .and(body_partial_json(json!({
            "calendario": { "dataDeVencimento": due, "validadeAposVencimento": 30 },
            "valor": { "original": "85.50" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "status": "ATIVA" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ATIVA",
            "pixCopiaECola": COPY_PASTE
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix-vencimento")
        .set_json(json!({
            "pagamento": {
                "nome": "Joao Souza",
                "cpf": "52998224725",
                "valor": "85,50"
            },
            "data_vencimento": due
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    let txid = body["txid"].as_str().unwrap();
    assert_eq!(txid.len(), 32);
    assert!(txid.bytes().all(|b| b.is_ascii_alphanumeric()));
    assert_eq!(body["data_vencimento"], due.as_str());
}

#[actix_web::test]
async fn invalid_amount_is_rejected_before_any_provider_call() {
    // No mocks mounted: a provider call would fail the test.
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix")
        .set_json(json!({
            "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "0,00" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["ambiente"], "homolog");
    assert!(body["erro"].as_str().unwrap().contains("valor"));
}

#[actix_web::test]
async fn invalid_cpf_is_rejected_before_any_provider_call() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix")
        .set_json(json!({
            "pagamento": { "nome": "Ana", "cpf": "111.111.111-11", "valor": "10" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn past_due_date_is_rejected() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix-vencimento")
        .set_json(json!({
            "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" },
            "data_vencimento": "2020-01-01"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn malformed_txid_is_rejected() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::get()
        .uri("/consultar-pix/not-a-txid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn charge_query_reports_payment_state() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "status": "CONCLUIDA",
            "pixCopiaECola": COPY_PASTE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::get()
        .uri(&format!("/consultar-pix/{txid}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "CONCLUIDA");
    assert_eq!(body["pago"], true);
}

#[actix_web::test]
async fn due_date_query_reports_overdue_arithmetic() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "client0generated0txid0abcdefabcd";
    let due = (chrono::Utc::now().date_naive() + chrono::Days::new(5)).to_string();
    Mock::given(method("GET"))
        .and(path(format!("/cobv/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "status": "ATIVA",
            "calendario": { "dataDeVencimento": due }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::get()
        .uri(&format!("/consultar-pix-vencimento/{txid}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["pago"], false);
    assert_eq!(body["vencido"], false);
    assert_eq!(body["dias_para_vencer"], 5);
}

#[actix_web::test]
async fn batch_reports_per_item_outcomes() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";
    Mock::given(method("POST"))
        .and(path("/cob"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "txid": txid })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "pixCopiaECola": COPY_PASTE
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    // Second item has an unusable CPF and must fail alone.
    let req = test::TestRequest::post()
        .uri("/gerar-pix-lote")
        .set_json(json!({
            "pagamentos": [
                { "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" } },
                { "pagamento": { "nome": "Bia", "cpf": "123", "valor": "10" } }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sucesso"], false);
    assert_eq!(body["total"], 2);
    assert_eq!(body["processados"], 1);
    assert_eq!(body["falhas"], 1);
    assert_eq!(body["resultados"][0]["sucesso"], true);
    assert_eq!(body["resultados"][1]["sucesso"], false);
    assert!(body["resultados"][1]["erro"].as_str().is_some());
}

#[actix_web::test]
async fn batch_items_with_a_due_date_become_cobv_charges() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let txid = "prov1dergenerated1dabcdefabcdef12";
    let due = (chrono::Utc::now().date_naive() + chrono::Days::new(7)).to_string();

    Mock::given(method("POST"))
        .and(path("/cob"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "txid": txid })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cob/{txid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": txid,
            "pixCopiaECola": COPY_PASTE
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex("^/cobv/[0-9a-f]{32}$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "status": "ATIVA" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/cobv/[0-9a-f]{32}$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pixCopiaECola": COPY_PASTE
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let req = test::TestRequest::post()
        .uri("/gerar-pix-lote")
        .set_json(json!({
            "pagamentos": [
                { "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" } },
                {
                    "pagamento": { "nome": "Bia", "cpf": "52998224725", "valor": "20" },
                    "dataVencimento": due
                }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sucesso"], true);
    assert_eq!(body["falhas"], 0);
    assert_eq!(body["resultados"][0]["txid"], txid);
    // The due-date item got a client-generated txid, not the provider's.
    let cobv_txid = body["resultados"][1]["txid"].as_str().unwrap();
    assert_eq!(cobv_txid.len(), 32);
    assert_ne!(cobv_txid, txid);
}

#[actix_web::test]
async fn oversized_batch_is_rejected() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let app = charge_app!(&config);

    let item = json!({ "pagamento": { "nome": "Ana", "cpf": "52998224725", "valor": "10" } });
    let pagamentos: Vec<Value> = std::iter::repeat_n(item, 51).collect();

    let req = test::TestRequest::post()
        .uri("/gerar-pix-lote")
        .set_json(json!({ "pagamentos": pagamentos }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}
