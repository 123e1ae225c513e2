//! Entity Store: cache de pacientes e cuidadores
//!
//! O store não valida nada (isso fica nos formulários) e não captura falhas do
//! Registry: elas sobem intactas para quem chamou. As verificações de CPF e e-mail
//! consultam apenas o cache; um cadastro feito por outra sessão só aparece após a
//! próxima recarga.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RegistryResult;
use crate::models::{Caregiver, Cpf, EntityId, Patient};
use crate::record_set::RecordSet;
use crate::registry::Registry;

pub struct EntityStore<R> {
    registry: Arc<R>,
    patients: RecordSet<Patient>,
    caregivers: RecordSet<Caregiver>,
}

impl<R: Registry> EntityStore<R> {
    /// Cria o store com o cache vazio; chame [`EntityStore::load`] antes de consultar
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            patients: RecordSet::new(),
            caregivers: RecordSet::new(),
        }
    }

    /// Busca as duas coleções no Registry
    pub async fn load(&self) -> RegistryResult<()> {
        self.patients.refresh(self.registry.as_ref()).await?;
        self.caregivers.refresh(self.registry.as_ref()).await?;
        info!(
            "Cadastros carregados: {} pacientes, {} cuidadores",
            self.patients.len(),
            self.caregivers.len()
        );
        Ok(())
    }

    pub fn list_patients(&self) -> Vec<Patient> {
        self.patients.snapshot()
    }

    pub fn list_caregivers(&self) -> Vec<Caregiver> {
        self.caregivers.snapshot()
    }

    pub async fn create_patient(&self, patient: Patient) -> RegistryResult<Patient> {
        let created = self
            .patients
            .insert(self.registry.as_ref(), patient)
            .await?;
        info!("Paciente {} cadastrado", created.id);
        Ok(created)
    }

    pub async fn create_caregiver(&self, caregiver: Caregiver) -> RegistryResult<Caregiver> {
        let created = self
            .caregivers
            .insert(self.registry.as_ref(), caregiver)
            .await?;
        info!(
            "Cuidador {} cadastrado para o paciente {}",
            created.id, created.linked_patient_cpf
        );
        Ok(created)
    }

    /// Substitui o paciente de mesmo id; um id inexistente não tem efeito
    pub async fn update_patient(&self, patient: &Patient) -> RegistryResult<()> {
        self.patients
            .replace(self.registry.as_ref(), patient)
            .await?;
        info!("Paciente {} atualizado", patient.id);
        Ok(())
    }

    pub async fn update_caregiver(&self, caregiver: &Caregiver) -> RegistryResult<()> {
        self.caregivers
            .replace(self.registry.as_ref(), caregiver)
            .await?;
        info!("Cuidador {} atualizado", caregiver.id);
        Ok(())
    }

    pub async fn remove_patient(&self, id: &EntityId) -> RegistryResult<()> {
        self.patients.remove(self.registry.as_ref(), id).await?;
        info!("Paciente {} removido", id);
        Ok(())
    }

    pub async fn remove_caregiver(&self, id: &EntityId) -> RegistryResult<()> {
        self.caregivers.remove(self.registry.as_ref(), id).await?;
        info!("Cuidador {} removido", id);
        Ok(())
    }

    pub fn is_patient_cpf_registered(&self, cpf: &Cpf) -> bool {
        let found = self.patients.any(|patient| &patient.cpf == cpf);
        debug!("CPF {} entre pacientes em cache: {}", cpf, found);
        found
    }

    pub fn is_caregiver_cpf_registered(&self, cpf: &Cpf) -> bool {
        let found = self.caregivers.any(|caregiver| &caregiver.cpf == cpf);
        debug!("CPF {} entre cuidadores em cache: {}", cpf, found);
        found
    }

    /// E-mail já usado por um paciente ou cuidador em cache
    pub fn is_email_registered(&self, email: &str) -> bool {
        self.patients.any(|patient| patient.email == email)
            || self.caregivers.any(|caregiver| caregiver.email == email)
    }

    pub fn patient_by_id(&self, id: &EntityId) -> Option<Patient> {
        self.patients.find(|patient| &patient.id == id)
    }

    pub fn caregiver_by_id(&self, id: &EntityId) -> Option<Caregiver> {
        self.caregivers.find(|caregiver| &caregiver.id == id)
    }
}
