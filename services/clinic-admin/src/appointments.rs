//! Appointment operations
//!
//! Thin wrappers over `ApiClient` for the `/agendamento` resource. Wire field
//! names are kept as the API sends them; the Rust side uses English names.

use std::fmt;

use clinic_api::{ApiClient, ApiError, RequestDescriptor, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const RESOURCE: &str = "/agendamento";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AppointmentStatus {
    #[serde(rename = "AGENDADO")]
    Scheduled,
    #[serde(rename = "CONFIRMADO")]
    Confirmed,
    #[serde(rename = "CANCELADO")]
    Cancelled,
    #[serde(rename = "REALIZADO")]
    Completed,
}

impl AppointmentStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "AGENDADO",
            AppointmentStatus::Confirmed => "CONFIRMADO",
            AppointmentStatus::Cancelled => "CANCELADO",
            AppointmentStatus::Completed => "REALIZADO",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Placeholder for a reference with nothing displayable.
pub const MISSING: &str = "—";

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Patient, doctor or clinic: either a bare id or an embedded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartyRef {
    Id(String),
    Object(Party),
}

/// Embedded party record. Doctors and patients may nest their login under `user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PartyUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PartyRef {
    /// First of `nome`, `name`, the nested user's `nome`/`name`/`email`, then
    /// `email`. Empty strings are skipped.
    pub fn display_name(&self) -> &str {
        match self {
            PartyRef::Id(id) if id.is_empty() => MISSING,
            PartyRef::Id(id) => id,
            PartyRef::Object(party) => party.display_name().unwrap_or(MISSING),
        }
    }
}

impl Party {
    fn display_name(&self) -> Option<&str> {
        present(&self.nome)
            .or_else(|| present(&self.name))
            .or_else(|| {
                self.user.as_ref().and_then(|user| {
                    present(&user.nome)
                        .or_else(|| present(&user.name))
                        .or_else(|| present(&user.email))
                })
            })
            .or_else(|| present(&self.email))
    }
}

/// Appointment type: a bare code such as `CONSULTA` or an object carrying one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppointmentKind {
    Code(String),
    Object(KindRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppointmentKind {
    /// Human label. Known codes are matched case-insensitively; anything else
    /// is shown as sent.
    pub fn label(&self) -> &str {
        let code = match self {
            AppointmentKind::Code(code) => Some(code.as_str()).filter(|c| !c.is_empty()),
            AppointmentKind::Object(record) => {
                present(&record.nome).or_else(|| present(&record.name))
            }
        };
        match code {
            None => MISSING,
            Some(code) if code.eq_ignore_ascii_case("EXAME") => "Exame",
            Some(code) if code.eq_ignore_ascii_case("CIRURGIA") => "Cirurgia",
            Some(code) if code.eq_ignore_ascii_case("CONSULTA") => "Consulta",
            Some(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    #[serde(rename = "data")]
    pub date: String,
    pub status: AppointmentStatus,
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PartyRef>,
    #[serde(rename = "medico", default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<PartyRef>,
    #[serde(rename = "clinica", default, skip_serializing_if = "Option::is_none")]
    pub clinic: Option<PartyRef>,
    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AppointmentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Optional filters for `list`. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<AppointmentStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub doctor_id: Option<String>,
    pub clinic_id: Option<String>,
}

impl ListFilter {
    fn descriptor(&self) -> RequestDescriptor {
        let pairs = [
            ("status", self.status.map(|s| s.as_wire().to_string())),
            ("dataInicio", self.from.clone()),
            ("dataFim", self.to.clone()),
            ("medicoId", self.doctor_id.clone()),
            ("clinicaId", self.clinic_id.clone()),
        ];
        pairs
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .fold(RequestDescriptor::get(RESOURCE), |d, (key, value)| {
                d.query(key, value)
            })
    }
}

/// Appointments matching `filter`. A payload that is not a list yields none.
pub async fn list(client: &ApiClient, filter: &ListFilter) -> Result<Vec<Appointment>> {
    let payload: Value = client.send(&filter.descriptor()).await?;
    if !payload.is_array() {
        return Ok(Vec::new());
    }
    serde_json::from_value(payload)
        .map_err(|e| ApiError::transport(format!("unexpected appointment list: {e}")))
}

pub async fn get(client: &ApiClient, id: &str) -> Result<Appointment> {
    client.fetch(&format!("{RESOURCE}/{id}")).await
}

pub async fn confirm(client: &ApiClient, id: &str) -> Result<Appointment> {
    client
        .update(&format!("{RESOURCE}/{id}/confirmar"), Some(&json!({})))
        .await
}

pub async fn cancel(client: &ApiClient, id: &str) -> Result<Appointment> {
    client
        .update(&format!("{RESOURCE}/{id}/cancelar"), Some(&json!({})))
        .await
}
