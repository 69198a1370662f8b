//! Batch charge creation handler.

use crate::{
    error::ApiError,
    models::{
        GerarPixLoteRequest, GerarPixLoteResponse, GerarPixRequest, GerarPixVencimentoRequest,
        LoteItemRequest, LoteItemResult,
    },
    services::{ChargeResult, ChargeService, PixMetrics},
};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;
use std::time::Duration;
use tracing::info;

/// Hard cap on items per batch request.
pub const MAX_BATCH_ITEMS: usize = 50;

/// Pause between items so the provider never sees a burst.
const INTER_ITEM_DELAY: Duration = Duration::from_millis(300);

async fn create_item(
    service: &ChargeService,
    item: &LoteItemRequest,
) -> (&'static str, Result<ChargeResult, ApiError>) {
    match &item.data_vencimento {
        Some(date) => {
            let req = GerarPixVencimentoRequest {
                pagamento: item.pagamento.clone(),
                data_vencimento: date.clone(),
                multa: None,
                juros: None,
                desconto: None,
                evento: item.evento.clone(),
                tag_evento: item.tag_evento.clone(),
                categoria: item.categoria.clone(),
            };
            ("cobv", service.create_due_date(&req).await)
        }
        None => {
            let req = GerarPixRequest {
                pagamento: item.pagamento.clone(),
                evento: item.evento.clone(),
                tag_evento: item.tag_evento.clone(),
                categoria: item.categoria.clone(),
            };
            ("cob", service.create_immediate(&req).await)
        }
    }
}

/// Batch charge endpoint
///
/// Processes up to [`MAX_BATCH_ITEMS`] payments sequentially, pausing between
/// items. Items with a `data_vencimento` become due-date charges; the rest
/// are immediate. One failed item does not stop the batch; each item reports
/// its own outcome.
#[api_v2_operation(
    summary = "Create PIX Charges in Batch",
    description = "Creates PIX charges for up to 50 payments, sequentially, reporting per-item success or failure. Items carrying dataVencimento are created as due-date charges.",
    tags("Charges"),
    responses(
        (status = 200, description = "Batch processed", body = GerarPixLoteResponse),
        (status = 400, description = "Bad Request - empty batch or over the item limit")
    )
)]
pub async fn gerar_pix_lote(
    req: HttpRequest,
    body: web::Json<GerarPixLoteRequest>,
    service: web::Data<ChargeService>,
) -> Result<web::Json<GerarPixLoteResponse>, Error> {
    let total = body.pagamentos.len();
    if total == 0 {
        return Err(ApiError::validation("pagamentos", "batch must not be empty").into());
    }
    if total > MAX_BATCH_ITEMS {
        return Err(ApiError::validation(
            "pagamentos",
            format!("batch is limited to {MAX_BATCH_ITEMS} items"),
        )
        .into());
    }

    let metrics = req.app_data::<web::Data<PixMetrics>>().cloned();
    let mut resultados = Vec::with_capacity(total);
    let mut falhas = 0usize;

    for (indice, item) in body.pagamentos.iter().enumerate() {
        if indice > 0 {
            tokio::time::sleep(INTER_ITEM_DELAY).await;
        }

        let (tipo, result) = create_item(&service, item).await;
        match result {
            Ok(charge) => {
                if let Some(m) = &metrics {
                    m.record_charge(tipo, "success");
                }
                resultados.push(LoteItemResult {
                    indice,
                    sucesso: true,
                    txid: Some(charge.txid),
                    pix_copia_e_cola: Some(charge.copy_paste_code),
                    erro: None,
                });
            }
            Err(e) => {
                if let Some(m) = &metrics {
                    m.record_charge(tipo, "error");
                }
                falhas += 1;
                resultados.push(LoteItemResult {
                    indice,
                    sucesso: false,
                    txid: None,
                    pix_copia_e_cola: None,
                    erro: Some(e.to_string()),
                });
            }
        }
    }

    info!(
        target: "batch",
        total,
        falhas,
        "batch finished"
    );

    Ok(web::Json(GerarPixLoteResponse {
        sucesso: falhas == 0,
        total,
        processados: total - falhas,
        falhas,
        resultados,
        ambiente: service.environment().as_str().to_string(),
    }))
}
