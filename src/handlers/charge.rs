//! Charge creation and query endpoint handlers.

use crate::{
    error::ApiError,
    models::{
        ConsultarPixResponse, GerarPixRequest, GerarPixResponse, GerarPixVencimentoRequest,
        RawJson,
    },
    services::{ChargeKind, ChargeService, PixMetrics, txid_is_valid},
};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

fn record_charge(req: &HttpRequest, tipo: &str, outcome: &str) {
    if let Some(metrics) = req.app_data::<web::Data<PixMetrics>>() {
        metrics.record_charge(tipo, outcome);
    }
}

/// Immediate charge endpoint
///
/// Validates the payment, creates a `cob` charge at the provider, and
/// returns the txid and copy-and-paste code.
#[api_v2_operation(
    summary = "Create Immediate PIX Charge",
    description = "Creates an immediate PIX charge (cob) and returns the txid and copy-and-paste code.",
    tags("Charges"),
    responses(
        (status = 200, description = "Charge created", body = GerarPixResponse),
        (status = 400, description = "Bad Request - invalid payment data"),
        (status = 401, description = "Unauthorized - provider rejected our credentials"),
        (status = 502, description = "Bad Gateway - provider unavailable after retries")
    )
)]
pub async fn gerar_pix(
    req: HttpRequest,
    body: web::Json<GerarPixRequest>,
    service: web::Data<ChargeService>,
) -> Result<web::Json<GerarPixResponse>, Error> {
    match service.create_immediate(&body).await {
        Ok(charge) => {
            record_charge(&req, "cob", "success");
            Ok(web::Json(GerarPixResponse {
                sucesso: true,
                txid: charge.txid,
                pix_copia_e_cola: charge.copy_paste_code,
                valor: charge.amount,
                pagador: body.pagamento.nome.clone(),
                ambiente: service.environment().as_str().to_string(),
                data_vencimento: None,
                evento: body.evento.clone(),
                tag_evento: body.tag_evento.clone(),
                categoria: body.categoria.clone(),
                dados_completos: RawJson(charge.raw),
            }))
        }
        Err(e) => {
            record_charge(&req, "cob", "error");
            Err(e.into())
        }
    }
}

/// Due-date charge endpoint
#[api_v2_operation(
    summary = "Create Due-Date PIX Charge",
    description = "Creates a due-date PIX charge (cobv) under a client-generated txid. The due date must be tomorrow or later.",
    tags("Charges"),
    responses(
        (status = 200, description = "Charge created", body = GerarPixResponse),
        (status = 400, description = "Bad Request - invalid payment data or due date"),
        (status = 401, description = "Unauthorized - provider rejected our credentials"),
        (status = 502, description = "Bad Gateway - provider unavailable after retries")
    )
)]
pub async fn gerar_pix_vencimento(
    req: HttpRequest,
    body: web::Json<GerarPixVencimentoRequest>,
    service: web::Data<ChargeService>,
) -> Result<web::Json<GerarPixResponse>, Error> {
    match service.create_due_date(&body).await {
        Ok(charge) => {
            record_charge(&req, "cobv", "success");
            Ok(web::Json(GerarPixResponse {
                sucesso: true,
                txid: charge.txid,
                pix_copia_e_cola: charge.copy_paste_code,
                valor: charge.amount,
                pagador: body.pagamento.nome.clone(),
                ambiente: service.environment().as_str().to_string(),
                data_vencimento: Some(body.data_vencimento.clone()),
                evento: body.evento.clone(),
                tag_evento: body.tag_evento.clone(),
                categoria: body.categoria.clone(),
                dados_completos: RawJson(charge.raw),
            }))
        }
        Err(e) => {
            record_charge(&req, "cobv", "error");
            Err(e.into())
        }
    }
}

fn validate_txid_param(txid: &str) -> Result<(), ApiError> {
    if txid_is_valid(txid) {
        Ok(())
    } else {
        Err(ApiError::validation(
            "txid",
            "txid must be 26-35 alphanumeric characters",
        ))
    }
}

/// Immediate charge query endpoint
#[api_v2_operation(
    summary = "Query Immediate PIX Charge",
    description = "Fetches an immediate charge by txid and reports its status and payment state.",
    tags("Charges"),
    responses(
        (status = 200, description = "Charge found", body = ConsultarPixResponse),
        (status = 400, description = "Bad Request - malformed txid"),
        (status = 404, description = "Charge not found at the provider")
    )
)]
pub async fn consultar_pix(
    txid: web::Path<String>,
    service: web::Data<ChargeService>,
) -> Result<web::Json<ConsultarPixResponse>, Error> {
    validate_txid_param(&txid)?;
    let query = service.query(ChargeKind::Immediate, &txid).await?;
    Ok(web::Json(ConsultarPixResponse {
        txid: query.txid,
        status: query.status,
        pago: query.pago,
        vencido: None,
        dias_para_vencer: None,
        dados: RawJson(query.raw),
        ambiente: service.environment().as_str().to_string(),
    }))
}

/// Due-date charge query endpoint
#[api_v2_operation(
    summary = "Query Due-Date PIX Charge",
    description = "Fetches a due-date charge by txid and reports status, payment state, and overdue arithmetic.",
    tags("Charges"),
    responses(
        (status = 200, description = "Charge found", body = ConsultarPixResponse),
        (status = 400, description = "Bad Request - malformed txid"),
        (status = 404, description = "Charge not found at the provider")
    )
)]
pub async fn consultar_pix_vencimento(
    txid: web::Path<String>,
    service: web::Data<ChargeService>,
) -> Result<web::Json<ConsultarPixResponse>, Error> {
    validate_txid_param(&txid)?;
    let query = service.query(ChargeKind::DueDate, &txid).await?;
    Ok(web::Json(ConsultarPixResponse {
        txid: query.txid,
        status: query.status,
        pago: query.pago,
        vencido: query.vencido,
        dias_para_vencer: query.dias_para_vencer,
        dados: RawJson(query.raw),
        ambiente: service.environment().as_str().to_string(),
    }))
}
