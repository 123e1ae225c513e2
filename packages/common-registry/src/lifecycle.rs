//! Ciclo de vida das consultas: agendar, reagendar e cancelar
//!
//! Uma consulta está agendada enquanto existir na coleção; cancelar é removê-la.
//! Não há verificação de conflito de horário: dois agendamentos para o mesmo
//! médico, data e horário são aceitos.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RegistryResult;
use crate::models::{Appointment, AppointmentChanges, Cpf, EntityId, NewAppointment};
use crate::record_set::RecordSet;
use crate::registry::Registry;

pub struct AppointmentManager<R> {
    registry: Arc<R>,
    appointments: RecordSet<Appointment>,
}

impl<R: Registry> AppointmentManager<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            appointments: RecordSet::new(),
        }
    }

    pub async fn load(&self) -> RegistryResult<()> {
        self.appointments.refresh(self.registry.as_ref()).await?;
        info!("Consultas carregadas: {}", self.appointments.len());
        Ok(())
    }

    /// Agenda uma consulta com um id novo e recarrega a coleção
    pub async fn schedule(&self, request: NewAppointment) -> RegistryResult<Appointment> {
        let appointment = request.into_appointment(EntityId::generate());
        let created = self
            .appointments
            .insert(self.registry.as_ref(), appointment)
            .await?;
        info!(
            "Consulta {} agendada: {} com {} em {} {}",
            created.id,
            created.specialty,
            created.doctor,
            created.date,
            created.time.format("%H:%M")
        );
        Ok(created)
    }

    /// Troca especialidade, médico, data e horário; `id` e CPF do paciente são mantidos
    pub async fn reschedule(
        &self,
        appointment: &Appointment,
        changes: AppointmentChanges,
    ) -> RegistryResult<Appointment> {
        let rescheduled = appointment.rescheduled(changes);
        self.appointments
            .replace(self.registry.as_ref(), &rescheduled)
            .await?;
        info!(
            "Consulta {} reagendada para {} {}",
            rescheduled.id,
            rescheduled.date,
            rescheduled.time.format("%H:%M")
        );
        Ok(rescheduled)
    }

    /// Remove a consulta. O motivo não é enviado ao Registry nem guardado.
    pub async fn cancel(&self, id: &EntityId, reason: Option<&str>) -> RegistryResult<()> {
        if let Some(reason) = reason {
            debug!("Motivo do cancelamento de {} descartado: {}", id, reason);
        }
        self.appointments
            .remove(self.registry.as_ref(), id)
            .await?;
        info!("Consulta {} cancelada", id);
        Ok(())
    }

    pub fn list(&self) -> Vec<Appointment> {
        self.appointments.snapshot()
    }

    pub fn list_by_patient(&self, cpf: &Cpf) -> Vec<Appointment> {
        self.appointments
            .filter(|appointment| &appointment.patient_cpf == cpf)
    }

    pub fn find(&self, id: &EntityId) -> Option<Appointment> {
        self.appointments.find(|appointment| &appointment.id == id)
    }
}
