//! Modelos de dados compartilhados entre o portal e o Registry
//!
//! Os campos seguem os nomes usados pelo Registry no JSON (`nome`, `cpfPaciente`,
//! `horario`, ...). Os identificadores Rust ficam em inglês.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::record_set::Record;
use crate::registry::Collection;

/// Identificador de um registro no Registry
///
/// O Registry pode devolver ids numéricos ou textuais; ambos são guardados como texto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Gera um novo identificador único (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Registro ainda não enviado ao Registry
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => EntityId(text),
            RawId::Number(number) => EntityId(number.to_string()),
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// CPF, chave de junção entre pacientes, cuidadores e consultas
///
/// Comparado exatamente como foi digitado (`111.111.111-11` e `11111111111` são CPFs diferentes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cpf(String);

impl Cpf {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cpf {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Cpf {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Paciente cadastrado no portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Identificador único
    #[serde(default)]
    pub id: EntityId,
    /// Nome completo
    #[serde(rename = "nome")]
    pub name: String,
    /// Idade em anos
    #[serde(rename = "idade", deserialize_with = "idade::deserialize")]
    pub age: u32,
    /// CPF, único entre pacientes
    pub cpf: Cpf,
    /// CEP do endereço
    #[serde(rename = "cep")]
    pub postal_code: String,
    /// E-mail, usado como login
    pub email: String,
    /// Senha
    #[serde(rename = "senha")]
    pub password: String,
    /// Telefone de contato
    #[serde(rename = "telefone")]
    pub phone: String,
    /// Patologia principal
    #[serde(rename = "patologia")]
    pub pathology: String,
    /// Consentimento com os termos de uso
    #[serde(rename = "consentimento", default)]
    pub consent: bool,
}

/// Cuidador vinculado a um paciente pelo CPF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caregiver {
    #[serde(default)]
    pub id: EntityId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "idade", deserialize_with = "idade::deserialize")]
    pub age: u32,
    /// CPF do próprio cuidador
    #[serde(rename = "cpfCuidador")]
    pub cpf: Cpf,
    /// CPF do paciente acompanhado (pode não existir no Registry)
    #[serde(rename = "cpfPaciente")]
    pub linked_patient_cpf: Cpf,
    #[serde(rename = "cepCuidador")]
    pub postal_code: String,
    #[serde(rename = "cepPaciente")]
    pub patient_postal_code: String,
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    /// Grau de parentesco (mãe, filho, cônjuge, ...)
    #[serde(rename = "parentesco")]
    pub relationship: String,
    #[serde(rename = "consentimento", default)]
    pub consent: bool,
}

/// Consulta agendada
///
/// Não há campo de status: existir na coleção é estar agendada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default)]
    pub id: EntityId,
    #[serde(rename = "cpfPaciente")]
    pub patient_cpf: Cpf,
    /// Tipo/especialidade da consulta
    #[serde(rename = "especialidade")]
    pub specialty: String,
    /// Nome do médico
    #[serde(rename = "medico")]
    pub doctor: String,
    #[serde(rename = "especialidadeMedico")]
    pub doctor_specialty: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "horario", with = "horario")]
    pub time: NaiveTime,
}

/// Dados para agendar uma nova consulta
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_cpf: Cpf,
    pub specialty: String,
    pub doctor: String,
    pub doctor_specialty: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl NewAppointment {
    pub(crate) fn into_appointment(self, id: EntityId) -> Appointment {
        Appointment {
            id,
            patient_cpf: self.patient_cpf,
            specialty: self.specialty,
            doctor: self.doctor,
            doctor_specialty: self.doctor_specialty,
            date: self.date,
            time: self.time,
        }
    }
}

/// Campos substituídos em um reagendamento
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentChanges {
    pub specialty: String,
    pub doctor: String,
    pub doctor_specialty: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Appointment {
    /// Aplica um reagendamento mantendo `id` e `patient_cpf`
    pub fn rescheduled(&self, changes: AppointmentChanges) -> Appointment {
        Appointment {
            id: self.id.clone(),
            patient_cpf: self.patient_cpf.clone(),
            specialty: changes.specialty,
            doctor: changes.doctor,
            doctor_specialty: changes.doctor_specialty,
            date: changes.date,
            time: changes.time,
        }
    }
}

impl Record for Patient {
    const COLLECTION: Collection = Collection::Patients;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Record for Caregiver {
    const COLLECTION: Collection = Collection::Caregivers;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Record for Appointment {
    const COLLECTION: Collection = Collection::Appointments;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

/// Interpreta um horário `HH:MM` (aceita também `HH:MM:SS`)
pub fn parse_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, horario::FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

/// Idade gravada como número ou como texto vindo de formulário (`"34"`)
mod idade {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAge {
            Number(u32),
            Text(String),
        }

        match RawAge::deserialize(deserializer)? {
            RawAge::Number(age) => Ok(age),
            RawAge::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Horário no formato do Registry (`09:00`)
mod horario {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
