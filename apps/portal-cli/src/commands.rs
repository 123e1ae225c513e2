//! Execução dos subcomandos
//!
//! Cada comando de dados carrega as três coleções do Registry, como a tela do portal
//! faz ao abrir, e só então executa a operação. Falhas do Registry viram uma
//! mensagem genérica; vínculos não encontrados viram uma tela de acesso negado.

use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use common_registry::association::{
    appointments_visible_to, caregivers_of, resolve_identity, resolve_linked_patient, Identity,
};
use common_registry::forms;
use common_registry::{
    Appointment, AppointmentManager, Cpf, EntityId, EntityStore, Registry, RegistrationError,
    RegistryError, Session, SessionError,
};

use crate::cli::{AppointmentCommand, CaregiverCommand, Command, ContactArgs, PatientCommand};

pub const FAILURE_BANNER: &str = "Falha na operação, tente novamente.";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Nenhum usuário logado. Use `portal login <email>`.")]
    NotLoggedIn,

    #[error("{0} não encontrado")]
    NotFound(String),

    #[error("Acesso negado: {0}")]
    Denied(String),

    #[error("Falha ao escrever saída: {0}")]
    Output(#[from] std::io::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Cadastros e consultas carregados do Registry
pub struct Portal<R> {
    store: EntityStore<R>,
    appointments: AppointmentManager<R>,
}

pub async fn run<R: Registry, W: Write>(
    command: Command,
    registry: Arc<R>,
    session: &mut Session,
    out: &mut W,
) -> CommandResult<()> {
    match command {
        Command::Login { email } => {
            let email = email.trim();
            session.login(email).await?;
            writeln!(out, "Sessão iniciada para {}", email)?;
        }
        Command::Logout => {
            if session.is_logged_in() {
                session.logout().await?;
                writeln!(out, "Sessão encerrada")?;
            } else {
                writeln!(out, "Nenhuma sessão ativa")?;
            }
        }
        Command::Whoami => Portal::load(registry).await?.whoami(session, out)?,
        Command::Pacientes(command) => Portal::load(registry).await?.patients(command, out).await?,
        Command::Cuidadores(command) => {
            Portal::load(registry)
                .await?
                .caregivers(command, out)
                .await?
        }
        Command::Consultas(command) => {
            Portal::load(registry)
                .await?
                .appointments(command, session, out)
                .await?
        }
    }
    Ok(())
}

fn write_appointment<W: Write>(out: &mut W, appointment: &Appointment) -> std::io::Result<()> {
    writeln!(
        out,
        "{}  {} {}  {}  {} ({})  paciente {}",
        appointment.id,
        appointment.date,
        appointment.time.format("%H:%M"),
        appointment.specialty,
        appointment.doctor,
        appointment.doctor_specialty,
        appointment.patient_cpf
    )
}

fn apply_contact(contact: ContactArgs, email: &mut String, phone: &mut String, postal_code: &mut String) {
    if let Some(value) = contact.email {
        *email = value;
    }
    if let Some(value) = contact.phone {
        *phone = value;
    }
    if let Some(value) = contact.postal_code {
        *postal_code = value;
    }
}

impl<R: Registry> Portal<R> {
    pub async fn load(registry: Arc<R>) -> CommandResult<Self> {
        let store = EntityStore::new(registry.clone());
        let appointments = AppointmentManager::new(registry);
        store.load().await?;
        appointments.load().await?;
        Ok(Self {
            store,
            appointments,
        })
    }

    fn whoami<W: Write>(&self, session: &Session, out: &mut W) -> CommandResult<()> {
        let email = session.current().ok_or(CommandError::NotLoggedIn)?;
        let patients = self.store.list_patients();
        let caregivers = self.store.list_caregivers();

        let identity = resolve_identity(email, &caregivers, &patients);
        match identity {
            Identity::Caregiver(caregiver) => {
                writeln!(out, "{} <{}>: {}", caregiver.name, email, identity.role())?;
                match resolve_linked_patient(caregiver, &patients) {
                    Some(patient) => {
                        writeln!(out, "Paciente acompanhado: {} (CPF {})", patient.name, patient.cpf)?
                    }
                    None => writeln!(
                        out,
                        "Paciente vinculado (CPF {}) não encontrado",
                        caregiver.linked_patient_cpf
                    )?,
                }
            }
            Identity::Patient(patient) => {
                writeln!(out, "{} <{}>: {}", patient.name, email, identity.role())?;
                let linked = caregivers_of(&patient.cpf, &caregivers);
                if linked.is_empty() {
                    writeln!(out, "Nenhum cuidador vinculado")?;
                }
                for caregiver in linked {
                    writeln!(out, "Cuidador: {} ({})", caregiver.name, caregiver.relationship)?;
                }
            }
            Identity::Unknown => {
                return Err(CommandError::Denied(format!("{} não está cadastrado", email)))
            }
        }
        Ok(())
    }

    async fn patients<W: Write>(&self, command: PatientCommand, out: &mut W) -> CommandResult<()> {
        match command {
            PatientCommand::List => {
                let patients = self.store.list_patients();
                if patients.is_empty() {
                    writeln!(out, "Nenhum paciente cadastrado")?;
                }
                for patient in patients {
                    writeln!(
                        out,
                        "{}  {}  CPF {}  {}",
                        patient.id, patient.name, patient.cpf, patient.email
                    )?;
                }
            }
            PatientCommand::Register(args) => {
                let patient = forms::register_patient(&self.store, args.into()).await?;
                writeln!(out, "Paciente {} cadastrado (id {})", patient.name, patient.id)?;
            }
            PatientCommand::Update {
                id,
                contact,
                pathology,
            } => {
                let id = EntityId::from(id);
                let mut patient = self
                    .store
                    .patient_by_id(&id)
                    .ok_or_else(|| CommandError::NotFound(format!("Paciente {}", id)))?;
                apply_contact(
                    contact,
                    &mut patient.email,
                    &mut patient.phone,
                    &mut patient.postal_code,
                );
                if let Some(pathology) = pathology {
                    patient.pathology = pathology;
                }
                forms::update_patient(&self.store, &patient).await?;
                writeln!(out, "Paciente {} atualizado", patient.id)?;
            }
            PatientCommand::Remove { id } => {
                let id = EntityId::from(id);
                self.store.remove_patient(&id).await?;
                writeln!(out, "Paciente {} removido", id)?;
            }
        }
        Ok(())
    }

    async fn caregivers<W: Write>(
        &self,
        command: CaregiverCommand,
        out: &mut W,
    ) -> CommandResult<()> {
        match command {
            CaregiverCommand::List => {
                let caregivers = self.store.list_caregivers();
                if caregivers.is_empty() {
                    writeln!(out, "Nenhum cuidador cadastrado")?;
                }
                for caregiver in caregivers {
                    writeln!(
                        out,
                        "{}  {}  CPF {}  acompanha {}  {}",
                        caregiver.id,
                        caregiver.name,
                        caregiver.cpf,
                        caregiver.linked_patient_cpf,
                        caregiver.email
                    )?;
                }
            }
            CaregiverCommand::Register(args) => {
                let caregiver = forms::register_caregiver(&self.store, args.into()).await?;
                writeln!(out, "Cuidador {} cadastrado (id {})", caregiver.name, caregiver.id)?;
            }
            CaregiverCommand::Update {
                id,
                contact,
                relationship,
            } => {
                let id = EntityId::from(id);
                let mut caregiver = self
                    .store
                    .caregiver_by_id(&id)
                    .ok_or_else(|| CommandError::NotFound(format!("Cuidador {}", id)))?;
                apply_contact(
                    contact,
                    &mut caregiver.email,
                    &mut caregiver.phone,
                    &mut caregiver.postal_code,
                );
                if let Some(relationship) = relationship {
                    caregiver.relationship = relationship;
                }
                forms::update_caregiver(&self.store, &caregiver).await?;
                writeln!(out, "Cuidador {} atualizado", caregiver.id)?;
            }
            CaregiverCommand::Remove { id } => {
                let id = EntityId::from(id);
                self.store.remove_caregiver(&id).await?;
                writeln!(out, "Cuidador {} removido", id)?;
            }
        }
        Ok(())
    }

    /// CPF do paciente cujas consultas o usuário logado gerencia
    fn patient_cpf_for(&self, session: &Session) -> CommandResult<Cpf> {
        let email = session.current().ok_or(CommandError::NotLoggedIn)?;
        let patients = self.store.list_patients();
        let caregivers = self.store.list_caregivers();

        match resolve_identity(email, &caregivers, &patients) {
            Identity::Patient(patient) => Ok(patient.cpf.clone()),
            Identity::Caregiver(caregiver) => resolve_linked_patient(caregiver, &patients)
                .map(|patient| patient.cpf.clone())
                .ok_or_else(|| {
                    CommandError::Denied(format!(
                        "paciente vinculado (CPF {}) não encontrado",
                        caregiver.linked_patient_cpf
                    ))
                }),
            Identity::Unknown => Err(CommandError::Denied(format!("{} não está cadastrado", email))),
        }
    }

    async fn appointments<W: Write>(
        &self,
        command: AppointmentCommand,
        session: &Session,
        out: &mut W,
    ) -> CommandResult<()> {
        match command {
            AppointmentCommand::List { cpf } => {
                let listed = match cpf {
                    Some(cpf) => self.appointments.list_by_patient(&Cpf::from(cpf)),
                    None => {
                        let email = session.current().ok_or(CommandError::NotLoggedIn)?;
                        let patients = self.store.list_patients();
                        let caregivers = self.store.list_caregivers();
                        let all = self.appointments.list();
                        let identity = resolve_identity(email, &caregivers, &patients);
                        if identity == Identity::Unknown {
                            return Err(CommandError::Denied(format!(
                                "{} não está cadastrado",
                                email
                            )));
                        }
                        appointments_visible_to(&identity, &patients, &all)
                            .into_iter()
                            .cloned()
                            .collect()
                    }
                };

                if listed.is_empty() {
                    writeln!(out, "Nenhuma consulta agendada")?;
                }
                for appointment in &listed {
                    write_appointment(out, appointment)?;
                }
            }
            AppointmentCommand::Schedule { cpf, slot } => {
                let cpf = match cpf {
                    Some(cpf) => Cpf::from(cpf),
                    None => self.patient_cpf_for(session)?,
                };
                let appointment =
                    forms::schedule_appointment(&self.appointments, &cpf, slot.into()).await?;
                write!(out, "Consulta agendada: ")?;
                write_appointment(out, &appointment)?;
            }
            AppointmentCommand::Reschedule { id, slot } => {
                let id = EntityId::from(id);
                let current = self
                    .appointments
                    .find(&id)
                    .ok_or_else(|| CommandError::NotFound(format!("Consulta {}", id)))?;
                let appointment =
                    forms::reschedule_appointment(&self.appointments, &current, slot.into()).await?;
                write!(out, "Consulta reagendada: ")?;
                write_appointment(out, &appointment)?;
            }
            AppointmentCommand::Cancel { id, reason } => {
                let id = EntityId::from(id);
                self.appointments.cancel(&id, reason.as_deref()).await?;
                writeln!(out, "Consulta {} cancelada", id)?;
            }
        }
        Ok(())
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "__all__" => "termos",
        other => other,
    }
}

/// Mostra o erro ao usuário e devolve o código de saída
pub fn report<W: Write>(failure: &CommandError, err: &mut W) -> std::io::Result<u8> {
    match failure {
        CommandError::Registry(e) | CommandError::Registration(RegistrationError::Registry(e)) => {
            error!("Falha do Registry: {}", e);
            writeln!(err, "{}", FAILURE_BANNER)?;
            Ok(1)
        }
        CommandError::Registration(RegistrationError::Invalid(errors)) => {
            let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
            fields.sort_by_key(|(field, _)| *field);
            writeln!(err, "Corrija os campos abaixo:")?;
            for (field, field_errors) in fields {
                for field_error in field_errors {
                    let message = field_error
                        .message
                        .as_deref()
                        .unwrap_or_else(|| field_error.code.as_ref());
                    writeln!(err, "  {}: {}", field_label(field), message)?;
                }
            }
            Ok(2)
        }
        CommandError::Registration(RegistrationError::DuplicateCpf(cpf)) => {
            writeln!(err, "  cpf: CPF {} já cadastrado", cpf)?;
            Ok(2)
        }
        CommandError::Registration(RegistrationError::DuplicateEmail(email)) => {
            writeln!(err, "  email: E-mail {} já cadastrado", email)?;
            Ok(2)
        }
        CommandError::Denied(_) => {
            writeln!(err, "{}", failure)?;
            Ok(0)
        }
        other => {
            error!("{}", other);
            writeln!(err, "{}", other)?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{AppointmentArgs, CaregiverArgs, PatientArgs};
    use chrono::{NaiveDate, NaiveTime};
    use common_registry::memory::MemoryRegistry;
    use common_registry::{init_session_db, Collection, SessionDbConfig, SessionSlot};
    use tempfile::TempDir;

    struct Harness {
        registry: Arc<MemoryRegistry>,
        session: Session,
        _dir: TempDir,
    }

    impl Harness {
        async fn new() -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            let config = SessionDbConfig {
                db_path: dir.path().join("sessao.db").to_string_lossy().to_string(),
                max_connections: 1,
            };
            let session = Session::restore(SessionSlot::new(init_session_db(&config).await?)).await?;
            Ok(Self {
                registry: Arc::new(MemoryRegistry::new()),
                session,
                _dir: dir,
            })
        }

        async fn exec(&mut self, command: Command) -> CommandResult<String> {
            let mut out = Vec::new();
            run(command, self.registry.clone(), &mut self.session, &mut out).await?;
            Ok(String::from_utf8_lossy(&out).to_string())
        }
    }

    fn patient_args(cpf: &str, email: &str) -> PatientArgs {
        PatientArgs {
            name: "Ana Souza".to_string(),
            age: 34,
            cpf: cpf.to_string(),
            postal_code: "01001-000".to_string(),
            email: email.to_string(),
            password: "segredo123".to_string(),
            phone: "11987654321".to_string(),
            pathology: "Hipertensão".to_string(),
            consent: true,
        }
    }

    fn caregiver_args(cpf: &str, patient_cpf: &str, email: &str) -> CaregiverArgs {
        CaregiverArgs {
            name: "Carlos Souza".to_string(),
            age: 60,
            cpf: cpf.to_string(),
            patient_cpf: patient_cpf.to_string(),
            postal_code: "01001-000".to_string(),
            patient_postal_code: "01001-000".to_string(),
            email: email.to_string(),
            password: "segredo123".to_string(),
            phone: "11912345678".to_string(),
            relationship: "pai".to_string(),
            consent: true,
        }
    }

    fn cardiology() -> AppointmentArgs {
        AppointmentArgs {
            specialty: "Cardiologia".to_string(),
            doctor: "Dr. João Silva".to_string(),
            doctor_specialty: "Cardiologista".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_caregiver_schedules_for_linked_patient() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Pacientes(PatientCommand::Register(patient_args(
            "111.111.111-11",
            "ana@x.com",
        ))))
        .await?;
        h.exec(Command::Cuidadores(CaregiverCommand::Register(caregiver_args(
            "333.333.333-33",
            "111.111.111-11",
            "carlos@x.com",
        ))))
        .await?;
        h.exec(Command::Login {
            email: "carlos@x.com".to_string(),
        })
        .await?;

        let scheduled = h
            .exec(Command::Consultas(AppointmentCommand::Schedule {
                cpf: None,
                slot: cardiology(),
            }))
            .await?;
        assert!(scheduled.contains("paciente 111.111.111-11"));

        let whoami = h.exec(Command::Whoami).await?;
        assert!(whoami.contains("cuidador"));
        assert!(whoami.contains("Paciente acompanhado: Ana Souza"));

        let listed = h
            .exec(Command::Consultas(AppointmentCommand::List { cpf: None }))
            .await?;
        assert!(listed.contains("Dr. João Silva"));
        assert!(listed.contains("2025-05-10 09:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_login_is_denied() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Login {
            email: "ninguem".to_string(),
        })
        .await?;

        let result = h.exec(Command::Whoami).await;

        let failure = result.expect_err("acesso negado");
        assert!(matches!(failure, CommandError::Denied(_)));
        let mut err = Vec::new();
        assert_eq!(report(&failure, &mut err)?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_failure_shows_generic_banner() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.registry.set_failing(true);

        let failure = h
            .exec(Command::Pacientes(PatientCommand::List))
            .await
            .expect_err("Registry fora do ar");

        let mut err = Vec::new();
        assert_eq!(report(&failure, &mut err)?, 1);
        assert_eq!(String::from_utf8_lossy(&err).trim(), FAILURE_BANNER);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_cpf_is_field_error() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Pacientes(PatientCommand::Register(patient_args(
            "111.111.111-11",
            "ana@x.com",
        ))))
        .await?;

        let failure = h
            .exec(Command::Pacientes(PatientCommand::Register(patient_args(
                "111.111.111-11",
                "outra@x.com",
            ))))
            .await
            .expect_err("CPF duplicado");

        let mut err = Vec::new();
        assert_eq!(report(&failure, &mut err)?, 2);
        assert!(String::from_utf8_lossy(&err).contains("cpf: CPF 111.111.111-11"));
        assert_eq!(h.registry.stored(Collection::Patients).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Pacientes(PatientCommand::Register(patient_args(
            "111.111.111-11",
            "ana@x.com",
        ))))
        .await?;

        let failure = h
            .exec(Command::Cuidadores(CaregiverCommand::Register(caregiver_args(
                "333.333.333-33",
                "111.111.111-11",
                "ana@x.com",
            ))))
            .await
            .expect_err("e-mail duplicado");

        let mut err = Vec::new();
        assert_eq!(report(&failure, &mut err)?, 2);
        assert!(String::from_utf8_lossy(&err).contains("email: E-mail ana@x.com já cadastrado"));
        assert!(h.registry.stored(Collection::Caregivers).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reschedule_and_cancel_by_id() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Consultas(AppointmentCommand::Schedule {
            cpf: Some("111.111.111-11".to_string()),
            slot: cardiology(),
        }))
        .await?;
        let id = h.registry.stored(Collection::Appointments)[0]["id"]
            .as_str()
            .map(str::to_string)
            .expect("id gerado");

        let mut slot = cardiology();
        slot.time = NaiveTime::from_hms_opt(16, 15, 0).unwrap();
        let rescheduled = h
            .exec(Command::Consultas(AppointmentCommand::Reschedule {
                id: id.clone(),
                slot,
            }))
            .await?;
        assert!(rescheduled.contains(&id));
        assert!(rescheduled.contains("16:15"));

        h.exec(Command::Consultas(AppointmentCommand::Cancel {
            id: id.clone(),
            reason: Some("Melhorou".to_string()),
        }))
        .await?;
        assert!(h.registry.stored(Collection::Appointments).is_empty());

        let missing = h
            .exec(Command::Consultas(AppointmentCommand::Reschedule {
                id,
                slot: cardiology(),
            }))
            .await;
        assert!(matches!(missing, Err(CommandError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_logout_requires_new_login() -> anyhow::Result<()> {
        let mut h = Harness::new().await?;
        h.exec(Command::Login {
            email: "ana@x.com".to_string(),
        })
        .await?;
        assert_eq!(h.exec(Command::Logout).await?.trim(), "Sessão encerrada");
        assert_eq!(h.exec(Command::Logout).await?.trim(), "Nenhuma sessão ativa");

        let result = h
            .exec(Command::Consultas(AppointmentCommand::List { cpf: None }))
            .await;
        assert!(matches!(result, Err(CommandError::NotLoggedIn)));
        Ok(())
    }
}
