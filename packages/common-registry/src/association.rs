//! Resolução de papéis e vínculos a partir das coleções em cache
//!
//! Funções puras sobre snapshots. "Não encontrado" nunca é erro: vira
//! `Role::Unknown`, `None` ou lista vazia, e a tela decide o que mostrar.

use serde::Serialize;
use std::fmt;

use crate::models::{Appointment, Caregiver, Cpf, Patient};

/// Papel de quem está logado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Caregiver,
    Patient,
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caregiver => write!(f, "cuidador"),
            Role::Patient => write!(f, "paciente"),
            Role::Unknown => write!(f, "desconhecido"),
        }
    }
}

/// Registro encontrado para um login
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Identity<'a> {
    Caregiver(&'a Caregiver),
    Patient(&'a Patient),
    Unknown,
}

impl Identity<'_> {
    pub fn role(&self) -> Role {
        match self {
            Identity::Caregiver(_) => Role::Caregiver,
            Identity::Patient(_) => Role::Patient,
            Identity::Unknown => Role::Unknown,
        }
    }
}

/// Procura o login entre cuidadores e depois entre pacientes.
///
/// Se o mesmo e-mail aparecer nas duas coleções, o cuidador prevalece.
pub fn resolve_identity<'a>(
    email: &str,
    caregivers: &'a [Caregiver],
    patients: &'a [Patient],
) -> Identity<'a> {
    if let Some(caregiver) = caregivers.iter().find(|c| c.email == email) {
        return Identity::Caregiver(caregiver);
    }
    if let Some(patient) = patients.iter().find(|p| p.email == email) {
        return Identity::Patient(patient);
    }
    Identity::Unknown
}

pub fn resolve_role(email: &str, caregivers: &[Caregiver], patients: &[Patient]) -> Role {
    resolve_identity(email, caregivers, patients).role()
}

pub fn resolve_linked_patient<'a>(
    caregiver: &Caregiver,
    patients: &'a [Patient],
) -> Option<&'a Patient> {
    patients
        .iter()
        .find(|patient| patient.cpf == caregiver.linked_patient_cpf)
}

/// Todos os cuidadores vinculados ao CPF, na ordem do cache
pub fn caregivers_of<'a>(patient_cpf: &Cpf, caregivers: &'a [Caregiver]) -> Vec<&'a Caregiver> {
    caregivers
        .iter()
        .filter(|caregiver| &caregiver.linked_patient_cpf == patient_cpf)
        .collect()
}

/// Consultas que o usuário logado pode ver.
///
/// Paciente vê as próprias; cuidador vê as do paciente vinculado, desde que esse
/// paciente exista; desconhecido não vê nada.
pub fn appointments_visible_to<'a>(
    identity: &Identity<'_>,
    patients: &[Patient],
    appointments: &'a [Appointment],
) -> Vec<&'a Appointment> {
    let cpf = match identity {
        Identity::Patient(patient) => &patient.cpf,
        Identity::Caregiver(caregiver) => match resolve_linked_patient(caregiver, patients) {
            Some(patient) => &patient.cpf,
            None => return Vec::new(),
        },
        Identity::Unknown => return Vec::new(),
    };

    appointments
        .iter()
        .filter(|appointment| &appointment.patient_cpf == cpf)
        .collect()
}
