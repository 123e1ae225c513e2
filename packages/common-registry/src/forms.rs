//! Formulários de cadastro e agendamento
//!
//! A validação acontece aqui, antes de qualquer chamada ao store: erros de campo
//! nunca chegam ao Registry. CPF e e-mail duplicados são verificados contra o cache;
//! o e-mail é a chave do login, então não pode se repetir entre pacientes e cuidadores.

use chrono::{NaiveDate, NaiveTime};
use std::borrow::Cow;
use tracing::warn;
use validator::{Validate, ValidationError};

use crate::error::{RegistrationError, RegistrationResult};
use crate::lifecycle::AppointmentManager;
use crate::models::{Appointment, AppointmentChanges, Caregiver, Cpf, EntityId, NewAppointment, Patient};
use crate::registry::Registry;
use crate::store::EntityStore;

/// Confere o valor contra uma máscara em que `0` representa um dígito
fn matches_mask(value: &str, mask: &str) -> bool {
    value.len() == mask.len()
        && value.chars().zip(mask.chars()).all(|(c, m)| match m {
            '0' => c.is_ascii_digit(),
            literal => c == literal,
        })
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

/// `000.000.000-00` ou 11 dígitos
pub fn validate_cpf(value: &str) -> Result<(), ValidationError> {
    if matches_mask(value, "000.000.000-00") || matches_mask(value, "00000000000") {
        Ok(())
    } else {
        Err(invalid("cpf", "CPF inválido, use 000.000.000-00"))
    }
}

/// `00000-000` ou 8 dígitos
pub fn validate_cep(value: &str) -> Result<(), ValidationError> {
    if matches_mask(value, "00000-000") || matches_mask(value, "00000000") {
        Ok(())
    } else {
        Err(invalid("cep", "CEP inválido, use 00000-000"))
    }
}

/// DDD + número: 10 ou 11 dígitos, aceitando `()`, `-`, `+` e espaços
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let well_formed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '(' | ')' | '-' | '+' | ' '));
    let digits = value.chars().filter(char::is_ascii_digit).count();

    if well_formed && (10..=11).contains(&digits) {
        Ok(())
    } else {
        Err(invalid("telefone", "Telefone inválido, informe DDD e número"))
    }
}

fn consent_given(consent: bool) -> Result<(), ValidationError> {
    if consent {
        Ok(())
    } else {
        Err(invalid("consentimento", "É preciso aceitar os termos de uso"))
    }
}

fn validate_patient_consent(form: &PatientForm) -> Result<(), ValidationError> {
    consent_given(form.consent)
}

fn validate_caregiver_consent(form: &CaregiverForm) -> Result<(), ValidationError> {
    consent_given(form.consent)
}

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_patient_consent", skip_on_field_errors = false))]
pub struct PatientForm {
    #[validate(length(min = 1, message = "Nome é obrigatório"))]
    pub name: String,
    #[validate(range(max = 120, message = "Idade inválida"))]
    pub age: u32,
    #[validate(custom = "validate_cpf")]
    pub cpf: String,
    #[validate(custom = "validate_cep")]
    pub postal_code: String,
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter ao menos 6 caracteres"))]
    pub password: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 1, message = "Informe a patologia principal"))]
    pub pathology: String,
    pub consent: bool,
}

impl From<PatientForm> for Patient {
    fn from(form: PatientForm) -> Self {
        Patient {
            id: EntityId::default(),
            name: form.name.trim().to_string(),
            age: form.age,
            cpf: Cpf::from(form.cpf),
            postal_code: form.postal_code,
            email: form.email.trim().to_string(),
            password: form.password,
            phone: form.phone,
            pathology: form.pathology,
            consent: form.consent,
        }
    }
}

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_caregiver_consent", skip_on_field_errors = false))]
pub struct CaregiverForm {
    #[validate(length(min = 1, message = "Nome é obrigatório"))]
    pub name: String,
    #[validate(range(max = 120, message = "Idade inválida"))]
    pub age: u32,
    #[validate(custom = "validate_cpf")]
    pub cpf: String,
    #[validate(custom = "validate_cpf")]
    pub patient_cpf: String,
    #[validate(custom = "validate_cep")]
    pub postal_code: String,
    #[validate(custom = "validate_cep")]
    pub patient_postal_code: String,
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter ao menos 6 caracteres"))]
    pub password: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 1, message = "Informe o parentesco"))]
    pub relationship: String,
    pub consent: bool,
}

impl From<CaregiverForm> for Caregiver {
    fn from(form: CaregiverForm) -> Self {
        Caregiver {
            id: EntityId::default(),
            name: form.name.trim().to_string(),
            age: form.age,
            cpf: Cpf::from(form.cpf),
            linked_patient_cpf: Cpf::from(form.patient_cpf),
            postal_code: form.postal_code,
            patient_postal_code: form.patient_postal_code,
            email: form.email.trim().to_string(),
            password: form.password,
            phone: form.phone,
            relationship: form.relationship,
            consent: form.consent,
        }
    }
}

/// Dados de agendamento ou reagendamento
#[derive(Debug, Clone, Validate)]
pub struct AppointmentForm {
    #[validate(length(min = 1, message = "Escolha a especialidade"))]
    pub specialty: String,
    #[validate(length(min = 1, message = "Escolha o médico"))]
    pub doctor: String,
    #[validate(length(min = 1, message = "Informe a especialidade do médico"))]
    pub doctor_specialty: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl From<AppointmentForm> for AppointmentChanges {
    fn from(form: AppointmentForm) -> Self {
        AppointmentChanges {
            specialty: form.specialty,
            doctor: form.doctor,
            doctor_specialty: form.doctor_specialty,
            date: form.date,
            time: form.time,
        }
    }
}

impl From<&Patient> for PatientForm {
    fn from(patient: &Patient) -> Self {
        PatientForm {
            name: patient.name.clone(),
            age: patient.age,
            cpf: patient.cpf.to_string(),
            postal_code: patient.postal_code.clone(),
            email: patient.email.clone(),
            password: patient.password.clone(),
            phone: patient.phone.clone(),
            pathology: patient.pathology.clone(),
            consent: patient.consent,
        }
    }
}

impl From<&Caregiver> for CaregiverForm {
    fn from(caregiver: &Caregiver) -> Self {
        CaregiverForm {
            name: caregiver.name.clone(),
            age: caregiver.age,
            cpf: caregiver.cpf.to_string(),
            patient_cpf: caregiver.linked_patient_cpf.to_string(),
            postal_code: caregiver.postal_code.clone(),
            patient_postal_code: caregiver.patient_postal_code.clone(),
            email: caregiver.email.clone(),
            password: caregiver.password.clone(),
            phone: caregiver.phone.clone(),
            relationship: caregiver.relationship.clone(),
            consent: caregiver.consent,
        }
    }
}

fn ensure_email_available<R: Registry>(
    store: &EntityStore<R>,
    email: &str,
) -> RegistrationResult<()> {
    let email = email.trim();
    if store.is_email_registered(email) {
        warn!("Cadastro bloqueado: e-mail {} já está em uso", email);
        return Err(RegistrationError::DuplicateEmail(email.to_string()));
    }
    Ok(())
}

/// Valida o formulário, bloqueia CPF ou e-mail já presentes no cache e cadastra o paciente
pub async fn register_patient<R: Registry>(
    store: &EntityStore<R>,
    form: PatientForm,
) -> RegistrationResult<Patient> {
    form.validate()?;

    let cpf = Cpf::from(form.cpf.as_str());
    if store.is_patient_cpf_registered(&cpf) {
        warn!("Cadastro bloqueado: CPF {} já pertence a um paciente", cpf);
        return Err(RegistrationError::DuplicateCpf(cpf));
    }
    ensure_email_available(store, &form.email)?;

    Ok(store.create_patient(form.into()).await?)
}

/// Mesmo fluxo de [`register_patient`] para cuidadores.
///
/// O CPF do paciente vinculado não precisa existir: o vínculo só é resolvido na leitura.
pub async fn register_caregiver<R: Registry>(
    store: &EntityStore<R>,
    form: CaregiverForm,
) -> RegistrationResult<Caregiver> {
    form.validate()?;

    let cpf = Cpf::from(form.cpf.as_str());
    if store.is_caregiver_cpf_registered(&cpf) {
        warn!("Cadastro bloqueado: CPF {} já pertence a um cuidador", cpf);
        return Err(RegistrationError::DuplicateCpf(cpf));
    }
    ensure_email_available(store, &form.email)?;

    Ok(store.create_caregiver(form.into()).await?)
}

/// Revalida o registro editado antes de substituí-lo no Registry
pub async fn update_patient<R: Registry>(
    store: &EntityStore<R>,
    patient: &Patient,
) -> RegistrationResult<()> {
    PatientForm::from(patient).validate()?;
    Ok(store.update_patient(patient).await?)
}

pub async fn update_caregiver<R: Registry>(
    store: &EntityStore<R>,
    caregiver: &Caregiver,
) -> RegistrationResult<()> {
    CaregiverForm::from(caregiver).validate()?;
    Ok(store.update_caregiver(caregiver).await?)
}

pub async fn schedule_appointment<R: Registry>(
    manager: &AppointmentManager<R>,
    patient_cpf: &Cpf,
    form: AppointmentForm,
) -> RegistrationResult<Appointment> {
    form.validate()?;

    let request = NewAppointment {
        patient_cpf: patient_cpf.clone(),
        specialty: form.specialty,
        doctor: form.doctor,
        doctor_specialty: form.doctor_specialty,
        date: form.date,
        time: form.time,
    };
    Ok(manager.schedule(request).await?)
}

pub async fn reschedule_appointment<R: Registry>(
    manager: &AppointmentManager<R>,
    appointment: &Appointment,
    form: AppointmentForm,
) -> RegistrationResult<Appointment> {
    form.validate()?;
    Ok(manager.reschedule(appointment, form.into()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;
    use crate::registry::Collection;
    use std::sync::Arc;

    fn patient_form(cpf: &str) -> PatientForm {
        PatientForm {
            name: "Ana Souza".to_string(),
            age: 34,
            cpf: cpf.to_string(),
            postal_code: "01001-000".to_string(),
            email: "ana@exemplo.com".to_string(),
            password: "segredo123".to_string(),
            phone: "(11) 98765-4321".to_string(),
            pathology: "Hipertensão".to_string(),
            consent: true,
        }
    }

    fn caregiver_form(cpf: &str, patient_cpf: &str) -> CaregiverForm {
        CaregiverForm {
            name: "Carlos Souza".to_string(),
            age: 60,
            cpf: cpf.to_string(),
            patient_cpf: patient_cpf.to_string(),
            postal_code: "01001-000".to_string(),
            patient_postal_code: "01001000".to_string(),
            email: "carlos@exemplo.com".to_string(),
            password: "segredo123".to_string(),
            phone: "1133334444".to_string(),
            relationship: "pai".to_string(),
            consent: true,
        }
    }

    #[test]
    fn test_masks() {
        assert!(validate_cpf("111.111.111-11").is_ok());
        assert!(validate_cpf("11111111111").is_ok());
        assert!(validate_cpf("111.111.111/11").is_err());
        assert!(validate_cep("01001-000").is_ok());
        assert!(validate_cep("0100-1000").is_err());
        assert!(validate_phone("+55 11 98765-4321").is_err());
        assert!(validate_phone("(11) 98765-4321").is_ok());
        assert!(validate_phone("98765-4321").is_err());
    }

    #[test]
    fn test_invalid_fields_are_reported_together() {
        let mut form = patient_form("123");
        form.email = "sem-arroba".to_string();
        form.consent = false;

        let errors = form.validate().expect_err("formulário inválido");
        let fields = errors.field_errors();
        assert!(fields.contains_key("cpf"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("__all__"));
        assert!(!fields.contains_key("name"));
    }

    #[tokio::test]
    async fn test_register_patient_blocks_duplicate_cpf() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let store = EntityStore::new(registry.clone());
        store.load().await?;

        register_patient(&store, patient_form("111.111.111-11")).await?;
        let second = register_patient(&store, patient_form("111.111.111-11")).await;

        assert!(matches!(second, Err(RegistrationError::DuplicateCpf(_))));
        assert_eq!(registry.stored(Collection::Patients).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_patient_blocks_duplicate_email() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let store = EntityStore::new(registry.clone());

        register_patient(&store, patient_form("111.111.111-11")).await?;
        let mut form = patient_form("222.222.222-22");
        form.email = "ana@exemplo.com".to_string();
        let second = register_patient(&store, form).await;

        assert!(
            matches!(second, Err(RegistrationError::DuplicateEmail(ref email)) if email == "ana@exemplo.com")
        );
        assert_eq!(registry.stored(Collection::Patients).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_caregiver_cannot_reuse_patient_email() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let store = EntityStore::new(registry.clone());
        register_patient(&store, patient_form("111.111.111-11")).await?;

        let mut form = caregiver_form("333.333.333-33", "111.111.111-11");
        form.email = "ana@exemplo.com".to_string();
        let result = register_caregiver(&store, form).await;

        assert!(matches!(result, Err(RegistrationError::DuplicateEmail(_))));
        assert!(registry.stored(Collection::Caregivers).is_empty());
        assert!(!store.is_caregiver_cpf_registered(&Cpf::from("333.333.333-33")));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_registry() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let store = EntityStore::new(registry.clone());

        let result = register_caregiver(&store, caregiver_form("333", "222.222.222-22")).await;

        assert!(matches!(result, Err(RegistrationError::Invalid(_))));
        assert!(registry.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_caregiver_with_dangling_patient_is_accepted() -> anyhow::Result<()> {
        let store = EntityStore::new(Arc::new(MemoryRegistry::new()));

        let created =
            register_caregiver(&store, caregiver_form("333.333.333-33", "999.999.999-99")).await?;

        assert_eq!(created.linked_patient_cpf, Cpf::from("999.999.999-99"));
        assert!(store.is_caregiver_cpf_registered(&Cpf::from("333.333.333-33")));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_revalidates_edited_record() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let store = EntityStore::new(registry.clone());
        let mut patient = register_patient(&store, patient_form("111.111.111-11")).await?;

        patient.phone = "123".to_string();
        let rejected = update_patient(&store, &patient).await;
        assert!(matches!(rejected, Err(RegistrationError::Invalid(_))));

        patient.phone = "11912345678".to_string();
        update_patient(&store, &patient).await?;
        assert_eq!(store.list_patients()[0].phone, "11912345678");
        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_form_requires_doctor() -> anyhow::Result<()> {
        let registry = Arc::new(MemoryRegistry::new());
        let manager = AppointmentManager::new(registry.clone());
        let form = AppointmentForm {
            specialty: "Cardiologia".to_string(),
            doctor: String::new(),
            doctor_specialty: "Cardiologista".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };

        let result = schedule_appointment(&manager, &Cpf::from("111.111.111-11"), form).await;

        assert!(matches!(result, Err(RegistrationError::Invalid(_))));
        assert!(registry.requests().is_empty());
        Ok(())
    }
}
