//! Charge validation, payload building, and the create/query flows.
//!
//! Input is normalized before anything touches the network: tax ids are
//! stripped to digits, amounts become exact two-decimal strings, and the
//! payer-facing description is cut at the network's 140-character limit.
//! Optional blocks the caller did not supply are left out of the payload
//! entirely.

use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::config::{EnvName, EnvironmentConfig};
use crate::error::ApiError;
use crate::models::api::{EncargoInput, GerarPixRequest, GerarPixVencimentoRequest, PagamentoInput};
use crate::models::pix::{
    Calendario, CobPayload, Desconto, DescontoDataFixa, Devedor, Encargo, InfoAdicional, Valor,
};
use crate::services::pix_client::{ChargeKind, PixClient};
use crate::services::token::{HttpTokenExchange, TokenExchange};

/// Payer-facing free text is capped by the PIX network.
pub const DESCRIPTION_LIMIT: usize = 140;

/// Immediate charges expire after one hour.
const IMMEDIATE_EXPIRATION_SECS: u32 = 3_600;

/// Due-date charges stay payable this many days past the due date.
const VALIDITY_AFTER_DUE_DAYS: u32 = 30;

/// The provider may not serve `pixCopiaECola` immediately after creation;
/// one re-fetch after this delay covers the lag.
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(1_500);

/// Strip punctuation and validate a CPF (11 digits, not all identical) or
/// CNPJ (14 digits).
pub fn normalize_tax_id(raw: &str) -> Result<String, ApiError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 => {
            let first = digits.as_bytes()[0];
            if digits.bytes().all(|b| b == first) {
                return Err(ApiError::validation(
                    "cpf",
                    "CPF with all identical digits is invalid",
                ));
            }
            Ok(digits)
        }
        14 => Ok(digits),
        n => Err(ApiError::validation(
            "cpf",
            format!("tax id must normalize to 11 (CPF) or 14 (CNPJ) digits, got {n}"),
        )),
    }
}

/// Parse a caller-supplied amount ("150,00", "150.00", "10") into the exact
/// two-decimal form the provider expects, rounding half-up on the third
/// decimal. Zero and negative amounts are rejected.
pub fn format_amount(raw: &str) -> Result<String, ApiError> {
    let cleaned = raw.trim().replace(',', ".");
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    let digits_only =
        |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(int_part) || !(frac_part.is_empty() || digits_only(frac_part)) {
        return Err(ApiError::validation(
            "valor",
            format!("'{raw}' is not a positive number"),
        ));
    }
    if int_part.len() > 10 {
        return Err(ApiError::validation("valor", "amount is too large"));
    }

    let whole: u64 = int_part
        .parse()
        .map_err(|_| ApiError::validation("valor", "amount is too large"))?;
    let frac: Vec<u8> = frac_part.bytes().map(|b| b - b'0').collect();

    let mut cents = whole * 100;
    cents += u64::from(*frac.first().unwrap_or(&0)) * 10;
    cents += u64::from(*frac.get(1).unwrap_or(&0));
    if frac.get(2).is_some_and(|d| *d >= 5) {
        cents += 1;
    }

    if cents == 0 {
        return Err(ApiError::validation("valor", "amount must be greater than zero"));
    }
    Ok(format!("{}.{:02}", cents / 100, cents % 100))
}

/// Cut the payer-facing description at the network limit, on a character
/// boundary.
pub fn truncate_description(text: &str) -> String {
    text.chars().take(DESCRIPTION_LIMIT).collect()
}

/// A due date must be tomorrow or later.
pub fn validate_due_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::validation("data_vencimento", format!("'{raw}' is not a YYYY-MM-DD date"))
    })?;
    let minimum = Utc::now().date_naive() + Days::new(1);
    if date < minimum {
        return Err(ApiError::validation(
            "data_vencimento",
            format!("due date must be {minimum} or later"),
        ));
    }
    Ok(date)
}

/// Client-generated charge id: UUIDv4 in simple form, 32 lowercase hex
/// characters, inside the network's 26-35 alphanumeric window.
pub fn generate_txid() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn txid_is_valid(txid: &str) -> bool {
    (26..=35).contains(&txid.len()) && txid.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Caller-supplied event tags carried into `infoAdicionais`.
#[derive(Debug, Default, Clone)]
pub struct ChargeTags {
    pub evento: Option<String>,
    pub tag_evento: Option<String>,
    pub categoria: Option<String>,
}

impl ChargeTags {
    fn is_empty(&self) -> bool {
        self.evento.is_none() && self.tag_evento.is_none() && self.categoria.is_none()
    }
}

/// Ordered tag list for the payload. Empty tags produce no list at all; when
/// any tag is present the environment and generation timestamp ride along.
pub fn build_info_adicionais(tags: &ChargeTags, env: EnvName) -> Option<Vec<InfoAdicional>> {
    if tags.is_empty() {
        return None;
    }
    let mut list = Vec::new();
    let mut push = |nome: &str, valor: &Option<String>| {
        if let Some(v) = valor {
            list.push(InfoAdicional {
                nome: nome.to_string(),
                valor: v.clone(),
            });
        }
    };
    push("evento", &tags.evento);
    push("tag_evento", &tags.tag_evento);
    push("categoria", &tags.categoria);
    list.push(InfoAdicional {
        nome: "ambiente".to_string(),
        valor: env.as_str().to_string(),
    });
    list.push(InfoAdicional {
        nome: "gerado_em".to_string(),
        valor: Utc::now().to_rfc3339(),
    });
    Some(list)
}

fn encargo_from_input(field: &str, input: &EncargoInput) -> Result<Encargo, ApiError> {
    let valor_perc = format_amount(&input.valor.raw())
        .map_err(|_| ApiError::validation(field, "value must be a positive number"))?;
    Ok(Encargo {
        modalidade: input.modalidade,
        valor_perc,
    })
}

/// Discounts go out as fixed-date entries; the caller supplies only a value,
/// so the entry is pinned to the charge's due date.
fn desconto_from_input(input: &EncargoInput, due: NaiveDate) -> Result<Desconto, ApiError> {
    let valor_perc = format_amount(&input.valor.raw())
        .map_err(|_| ApiError::validation("desconto", "value must be a positive number"))?;
    Ok(Desconto {
        modalidade: input.modalidade,
        desconto_data_fixa: vec![DescontoDataFixa {
            data: due.to_string(),
            valor_perc,
        }],
    })
}

/// A created charge: the id, the copy-and-paste (BR Code) string, and the
/// provider's raw response for the caller.
#[derive(Debug, Clone)]
pub struct ChargeResult {
    pub txid: String,
    pub copy_paste_code: String,
    pub raw: Value,
    pub amount: String,
}

/// A queried charge.
#[derive(Debug, Clone)]
pub struct ChargeQuery {
    pub txid: String,
    pub status: String,
    pub pago: bool,
    pub vencido: Option<bool>,
    pub dias_para_vencer: Option<i64>,
    pub raw: Value,
}

/// Orchestrates validation, payload building, and provider calls.
pub struct ChargeService<E: TokenExchange = HttpTokenExchange> {
    client: PixClient<E>,
    env: EnvName,
    pix_key: Option<String>,
}

impl<E: TokenExchange> ChargeService<E> {
    pub fn new(client: PixClient<E>, config: &EnvironmentConfig) -> Self {
        Self {
            client,
            env: config.name,
            pix_key: config.pix_key.clone(),
        }
    }

    fn pix_key(&self) -> Result<String, ApiError> {
        self.pix_key.clone().ok_or_else(|| {
            ApiError::Config(format!(
                "no PIX key configured for environment '{}'",
                self.env.as_str()
            ))
        })
    }

    fn devedor(&self, input: &PagamentoInput) -> Result<Devedor, ApiError> {
        let tax_id = normalize_tax_id(input.cpf.as_deref().unwrap_or(""))?;
        let (cpf, cnpj) = if tax_id.len() == 11 {
            (Some(tax_id), None)
        } else {
            (None, Some(tax_id))
        };
        Ok(Devedor {
            nome: input.nome.trim().to_string(),
            cpf,
            cnpj,
        })
    }

    fn description(&self, input: &PagamentoInput) -> String {
        let text = match (&input.descricao_pagador, &input.row_id) {
            (Some(desc), _) => desc.clone(),
            (None, Some(row)) => format!("Pagamento {row}"),
            (None, None) => "Pagamento PIX".to_string(),
        };
        truncate_description(&text)
    }

    /// Payload for an immediate charge (`POST /cob`).
    pub fn build_immediate_payload(
        &self,
        input: &PagamentoInput,
        tags: &ChargeTags,
    ) -> Result<CobPayload, ApiError> {
        if input.nome.trim().is_empty() {
            return Err(ApiError::validation("nome", "debtor name is required"));
        }
        Ok(CobPayload {
            calendario: Calendario {
                expiracao: Some(IMMEDIATE_EXPIRATION_SECS),
                ..Default::default()
            },
            devedor: self.devedor(input)?,
            valor: Valor {
                original: format_amount(&input.valor.raw())?,
                multa: None,
                juros: None,
                desconto: None,
            },
            chave: self.pix_key()?,
            solicitacao_pagador: self.description(input),
            info_adicionais: build_info_adicionais(tags, self.env),
        })
    }

    /// Payload for a due-date charge (`PUT /cobv/{txid}`).
    pub fn build_due_date_payload(
        &self,
        req: &GerarPixVencimentoRequest,
    ) -> Result<CobPayload, ApiError> {
        let input = &req.pagamento;
        if input.nome.trim().is_empty() {
            return Err(ApiError::validation("nome", "debtor name is required"));
        }
        let due = validate_due_date(&req.data_vencimento)?;

        let multa = req
            .multa
            .as_ref()
            .map(|m| encargo_from_input("multa", m))
            .transpose()?;
        let juros = req
            .juros
            .as_ref()
            .map(|j| encargo_from_input("juros", j))
            .transpose()?;
        let desconto = req
            .desconto
            .as_ref()
            .map(|d| desconto_from_input(d, due))
            .transpose()?;

        let tags = ChargeTags {
            evento: req.evento.clone(),
            tag_evento: req.tag_evento.clone(),
            categoria: req.categoria.clone(),
        };

        Ok(CobPayload {
            calendario: Calendario {
                expiracao: None,
                data_de_vencimento: Some(due.to_string()),
                validade_apos_vencimento: Some(VALIDITY_AFTER_DUE_DAYS),
            },
            devedor: self.devedor(input)?,
            valor: Valor {
                original: format_amount(&input.valor.raw())?,
                multa,
                juros,
                desconto,
            },
            chave: self.pix_key()?,
            solicitacao_pagador: self.description(input),
            info_adicionais: build_info_adicionais(&tags, self.env),
        })
    }

    /// Create an immediate charge. The provider assigns the txid; the charge
    /// is re-fetched for its copy-and-paste code.
    pub async fn create_immediate(&self, req: &GerarPixRequest) -> Result<ChargeResult, ApiError> {
        let tags = ChargeTags {
            evento: req.evento.clone(),
            tag_evento: req.tag_evento.clone(),
            categoria: req.categoria.clone(),
        };
        let payload = self.build_immediate_payload(&req.pagamento, &tags)?;
        let amount = payload.valor.original.clone();
        let body = serde_json::to_value(&payload)
            .map_err(|e| ApiError::Internal(format!("payload serialization: {e}")))?;

        let outcome = self.client.create_immediate_charge(&body).await?;
        let txid = outcome
            .body
            .get("txid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Upstream {
                status: outcome.status.as_u16(),
                body: outcome.body.to_string(),
                attempts: outcome.attempts,
            })?;

        let (copy_paste_code, raw) = self.fetch_copy_paste(ChargeKind::Immediate, &txid).await?;
        info!(txid = %txid, ambiente = self.env.as_str(), "immediate charge created");
        Ok(ChargeResult {
            txid,
            copy_paste_code,
            raw,
            amount,
        })
    }

    /// Create a due-date charge under a client-generated txid.
    pub async fn create_due_date(
        &self,
        req: &GerarPixVencimentoRequest,
    ) -> Result<ChargeResult, ApiError> {
        let payload = self.build_due_date_payload(req)?;
        let amount = payload.valor.original.clone();
        let body = serde_json::to_value(&payload)
            .map_err(|e| ApiError::Internal(format!("payload serialization: {e}")))?;

        let txid = generate_txid();
        debug_assert!(txid_is_valid(&txid));

        self.client.put_due_date_charge(&txid, &body).await?;
        let (copy_paste_code, raw) = self.fetch_copy_paste(ChargeKind::DueDate, &txid).await?;
        info!(txid = %txid, ambiente = self.env.as_str(), "due-date charge created");
        Ok(ChargeResult {
            txid,
            copy_paste_code,
            raw,
            amount,
        })
    }

    /// Query a charge and derive the paid/overdue view the callers expect.
    pub async fn query(&self, kind: ChargeKind, txid: &str) -> Result<ChargeQuery, ApiError> {
        let outcome = self.client.get_charge(kind, txid).await?;
        let status = outcome
            .body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("DESCONHECIDO")
            .to_string();
        let pago = status == "CONCLUIDA";

        let (vencido, dias_para_vencer) = match kind {
            ChargeKind::Immediate => (None, None),
            ChargeKind::DueDate => {
                let due = outcome
                    .body
                    .pointer("/calendario/dataDeVencimento")
                    .and_then(Value::as_str)
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                match due {
                    Some(date) => {
                        let today = Utc::now().date_naive();
                        let remaining = (date - today).num_days();
                        (Some(remaining < 0), Some(remaining.max(0)))
                    }
                    None => (None, None),
                }
            }
        };

        Ok(ChargeQuery {
            txid: txid.to_string(),
            status,
            pago,
            vencido,
            dias_para_vencer,
            raw: outcome.body,
        })
    }

    pub fn environment(&self) -> EnvName {
        self.env
    }

    /// Fetch the charge until the provider serves its copy-and-paste code,
    /// retrying once after a fixed delay to ride out creation lag. A fetch
    /// that fails outright propagates; only a response without the code is
    /// retried.
    async fn fetch_copy_paste(
        &self,
        kind: ChargeKind,
        txid: &str,
    ) -> Result<(String, Value), ApiError> {
        if let Some(found) = self.try_fetch(kind, txid).await? {
            return Ok(found);
        }
        tokio::time::sleep(FETCH_RETRY_DELAY).await;
        match self.try_fetch(kind, txid).await? {
            Some(found) => Ok(found),
            None => Err(ApiError::Upstream {
                status: 502,
                body: format!("provider did not return pixCopiaECola for {txid}"),
                attempts: 2,
            }),
        }
    }

    async fn try_fetch(
        &self,
        kind: ChargeKind,
        txid: &str,
    ) -> Result<Option<(String, Value)>, ApiError> {
        let outcome = self.client.get_charge(kind, txid).await?;
        Ok(outcome
            .body
            .get("pixCopiaECola")
            .and_then(Value::as_str)
            .map(|code| (code.to_string(), outcome.body.clone())))
    }
}
