//! Request/response models for the upstream HTTP surface.
//!
//! Field names keep the AppSheet-era aliases (`Pagador`, `Inscricao`,
//! `Valor Pix`) so existing callers keep working alongside the plain
//! lowercase names.

use paperclip::actix::Apiv2Schema;
use paperclip::v2::models::DataType;
use paperclip::v2::schema::TypedData;
use serde::{Deserialize, Serialize};

/// An amount as sent by callers: either a string ("150,00", "150.00") or a
/// bare JSON number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Text(String),
    Number(f64),
}

impl Amount {
    /// The raw textual form, prior to normalization.
    pub fn raw(&self) -> String {
        match self {
            Amount::Text(s) => s.trim().to_string(),
            Amount::Number(n) => n.to_string(),
        }
    }
}

impl TypedData for Amount {
    fn data_type() -> DataType {
        DataType::String
    }
}

/// Raw provider JSON carried through to the caller untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawJson(pub serde_json::Value);

impl TypedData for RawJson {
    fn data_type() -> DataType {
        DataType::Object
    }
}

/// The payment being charged.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct PagamentoInput {
    /// Debtor name.
    #[serde(alias = "Pagador")]
    pub nome: String,
    /// Debtor tax id (CPF or CNPJ), punctuation allowed.
    #[serde(alias = "Inscricao", default)]
    pub cpf: Option<String>,
    /// Charge amount, must be > 0.
    #[serde(alias = "Valor Pix")]
    pub valor: Amount,
    /// Free text shown to the payer, truncated to the network limit.
    #[serde(default)]
    pub descricao_pagador: Option<String>,
    /// Caller-side row/record id, used in the default description.
    #[serde(alias = "Row ID", default)]
    pub row_id: Option<String>,
}

/// Fine/interest/discount as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct EncargoInput {
    pub modalidade: u8,
    pub valor: Amount,
}

/// Body of `POST /gerar-pix`.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct GerarPixRequest {
    pub pagamento: PagamentoInput,
    #[serde(default)]
    pub evento: Option<String>,
    #[serde(default)]
    pub tag_evento: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
}

/// Body of `POST /gerar-pix-vencimento`.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct GerarPixVencimentoRequest {
    pub pagamento: PagamentoInput,
    /// Due date (YYYY-MM-DD), at least tomorrow.
    #[serde(alias = "dataVencimento")]
    pub data_vencimento: String,
    #[serde(default)]
    pub multa: Option<EncargoInput>,
    #[serde(default)]
    pub juros: Option<EncargoInput>,
    #[serde(default)]
    pub desconto: Option<EncargoInput>,
    #[serde(default)]
    pub evento: Option<String>,
    #[serde(default)]
    pub tag_evento: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
}

/// Successful charge-creation response.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct GerarPixResponse {
    pub sucesso: bool,
    pub txid: String,
    #[serde(rename = "pixCopiaECola")]
    pub pix_copia_e_cola: String,
    pub valor: String,
    pub pagador: String,
    pub ambiente: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vencimento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_evento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    pub dados_completos: RawJson,
}

/// Charge-query response.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct ConsultarPixResponse {
    pub txid: String,
    pub status: String,
    pub pago: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vencido: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dias_para_vencer: Option<i64>,
    pub dados: RawJson,
    pub ambiente: String,
}

/// One batch item: an immediate charge, or a due-date charge when
/// `data_vencimento` is present.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct LoteItemRequest {
    pub pagamento: PagamentoInput,
    #[serde(default, alias = "dataVencimento")]
    pub data_vencimento: Option<String>,
    #[serde(default)]
    pub evento: Option<String>,
    #[serde(default)]
    pub tag_evento: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
}

/// Body of `POST /gerar-pix-lote`.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct GerarPixLoteRequest {
    pub pagamentos: Vec<LoteItemRequest>,
}

/// Per-item outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct LoteItemResult {
    pub indice: usize,
    pub sucesso: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(
        rename = "pixCopiaECola",
        skip_serializing_if = "Option::is_none"
    )]
    pub pix_copia_e_cola: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
}

/// Batch response: partial failure is reported per item.
#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct GerarPixLoteResponse {
    pub sucesso: bool,
    pub total: usize,
    pub processados: usize,
    pub falhas: usize,
    pub resultados: Vec<LoteItemResult>,
    pub ambiente: String,
}

/// Response model for the health check endpoint.
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub timestamp: String,
    pub uptime: u64,
    pub uptime_formatted: String,
    pub ambiente: String,
}

/// Response model for the ping endpoint.
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct PingResponse {
    pub message: String,
    pub service: String,
    pub timestamp: String,
    pub uptime: u64,
}

/// Response model for the version information endpoint.
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

impl From<serde_json::Value> for RawJson {
    fn from(value: serde_json::Value) -> Self {
        RawJson(value)
    }
}
