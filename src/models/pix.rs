//! Wire schema for the provider's cob/cobv resources.
//!
//! Optional blocks use `skip_serializing_if` throughout: an omitted fine or
//! discount must be absent from the payload, never null.

use serde::{Deserialize, Serialize};

/// Scheduling block. Exactly one of the two shapes is populated:
/// `expiracao` for immediate charges, the due-date pair for cobv.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Calendario {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiracao: Option<u32>,
    #[serde(rename = "dataDeVencimento", skip_serializing_if = "Option::is_none")]
    pub data_de_vencimento: Option<String>,
    #[serde(
        rename = "validadeAposVencimento",
        skip_serializing_if = "Option::is_none"
    )]
    pub validade_apos_vencimento: Option<u32>,
}

/// The debtor. `cpf` (11 digits) and `cnpj` (14 digits) are mutually
/// exclusive on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Devedor {
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valor {
    /// Amount with exactly two decimal places, e.g. "150.00".
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multa: Option<Encargo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub juros: Option<Encargo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desconto: Option<Desconto>,
}

/// Fine/interest block: a mode plus a percentage or fixed value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encargo {
    pub modalidade: u8,
    #[serde(rename = "valorPerc")]
    pub valor_perc: String,
}

/// Discount block. Unlike multa/juros, the provider wants discounts as a
/// list of fixed-date entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Desconto {
    pub modalidade: u8,
    #[serde(rename = "descontoDataFixa")]
    pub desconto_data_fixa: Vec<DescontoDataFixa>,
}

/// One fixed-date discount entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescontoDataFixa {
    pub data: String,
    #[serde(rename = "valorPerc")]
    pub valor_perc: String,
}

/// Free-form `{nome, valor}` tag attached to a charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfoAdicional {
    pub nome: String,
    pub valor: String,
}

/// Request body for `POST /cob` and `PUT /cobv/{txid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CobPayload {
    pub calendario: Calendario,
    pub devedor: Devedor,
    pub valor: Valor,
    pub chave: String,
    #[serde(rename = "solicitacaoPagador")]
    pub solicitacao_pagador: String,
    #[serde(rename = "infoAdicionais", skip_serializing_if = "Option::is_none")]
    pub info_adicionais: Option<Vec<InfoAdicional>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_blocks_are_absent_not_null() {
        let payload = CobPayload {
            calendario: Calendario {
                expiracao: Some(3600),
                ..Default::default()
            },
            devedor: Devedor {
                nome: "Maria Silva".into(),
                cpf: Some("52998224725".into()),
                cnpj: None,
            },
            valor: Valor {
                original: "150.00".into(),
                multa: None,
                juros: None,
                desconto: None,
            },
            chave: "key".into(),
            solicitacao_pagador: "Donation".into(),
            info_adicionais: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        let valor = json.get("valor").unwrap().as_object().unwrap();
        assert!(!valor.contains_key("multa"));
        assert!(!valor.contains_key("juros"));
        assert!(!valor.contains_key("desconto"));
        assert!(json.get("infoAdicionais").is_none());
        assert!(json.get("devedor").unwrap().get("cnpj").is_none());

        let calendario = json.get("calendario").unwrap().as_object().unwrap();
        assert_eq!(calendario.len(), 1);
        assert_eq!(calendario["expiracao"], 3600);
    }

    #[test]
    fn desconto_serializes_as_fixed_date_list() {
        let desconto = Desconto {
            modalidade: 1,
            desconto_data_fixa: vec![DescontoDataFixa {
                data: "2026-09-01".into(),
                valor_perc: "10.00".into(),
            }],
        };
        let json = serde_json::to_value(&desconto).unwrap();
        assert_eq!(json["descontoDataFixa"][0]["data"], "2026-09-01");
        assert_eq!(json["descontoDataFixa"][0]["valorPerc"], "10.00");
        assert!(json.get("valorPerc").is_none());
    }

    #[test]
    fn due_date_calendario_uses_provider_field_names() {
        let calendario = Calendario {
            expiracao: None,
            data_de_vencimento: Some("2026-09-01".into()),
            validade_apos_vencimento: Some(30),
        };
        let json = serde_json::to_value(&calendario).unwrap();
        assert_eq!(json["dataDeVencimento"], "2026-09-01");
        assert_eq!(json["validadeAposVencimento"], 30);
    }
}
