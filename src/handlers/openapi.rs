//! OpenAPI specification generation.

use paperclip::v2::models::{DefaultApiRaw, Info};

/// Creates the shared OpenAPI specification for the gateway
///
/// Documents the charge endpoints, the environment model, and the
/// AppSheet-era field aliases the request bodies accept.
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "PIX Gateway".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "HTTP gateway for Sicredi PIX charges (immediate and due-date).\n\n\
                ## Environments\n\
                The active environment is selected at startup via `SICREDI_ENV`\n\
                (`homolog`, the default, or `prod`). Every response carries the\n\
                `ambiente` it was produced in. Production always verifies TLS;\n\
                homologation may relax verification via `SICREDI_HOMOLOG_SSL_VERIFY=false`.\n\
                \n\
                ## Request field aliases\n\
                Payment bodies accept both plain names (`nome`, `cpf`, `valor`)\n\
                and the legacy spreadsheet aliases (`Pagador`, `Inscricao`,\n\
                `Valor Pix`, `Row ID`). Amounts may be strings with comma or dot\n\
                decimals, or bare JSON numbers; they are normalized to two\n\
                decimal places before reaching the provider.\n\
                \n\
                ## Errors\n\
                Error responses are JSON objects with `erro`, `ambiente`, and\n\
                `timestamp` fields. Outside production a `detalhes` field carries\n\
                the raw provider diagnostics; production responses withhold it."
                    .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}
