use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use common_registry::forms::{AppointmentForm, CaregiverForm, PatientForm};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Portal de telemedicina para pacientes e cuidadores")]
#[command(version)]
pub struct Cli {
    /// URL base do Registry (sobrepõe PORTAL_REGISTRY_URL)
    #[arg(long, global = true)]
    pub registry_url: Option<String>,
    /// Arquivo SQLite da sessão (sobrepõe PORTAL_SESSION_DB)
    #[arg(long, global = true)]
    pub session_db: Option<String>,
    /// Logs em JSON
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Guarda o login na sessão local
    Login {
        /// E-mail usado no cadastro
        email: String,
    },
    /// Encerra a sessão local
    Logout,
    /// Mostra o papel do usuário logado e seus vínculos
    Whoami,
    /// Cadastro de pacientes
    #[command(subcommand)]
    Pacientes(PatientCommand),
    /// Cadastro de cuidadores
    #[command(subcommand)]
    Cuidadores(CaregiverCommand),
    /// Consultas
    #[command(subcommand)]
    Consultas(AppointmentCommand),
}

#[derive(Subcommand)]
pub enum PatientCommand {
    #[command(name = "listar")]
    List,
    #[command(name = "cadastrar")]
    Register(PatientArgs),
    #[command(name = "atualizar")]
    Update {
        id: String,
        #[command(flatten)]
        contact: ContactArgs,
        #[arg(long = "patologia")]
        pathology: Option<String>,
    },
    #[command(name = "remover")]
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum CaregiverCommand {
    #[command(name = "listar")]
    List,
    #[command(name = "cadastrar")]
    Register(CaregiverArgs),
    #[command(name = "atualizar")]
    Update {
        id: String,
        #[command(flatten)]
        contact: ContactArgs,
        #[arg(long = "parentesco")]
        relationship: Option<String>,
    },
    #[command(name = "remover")]
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum AppointmentCommand {
    /// Lista as consultas do CPF informado ou as visíveis para o usuário logado
    #[command(name = "listar")]
    List {
        #[arg(long)]
        cpf: Option<String>,
    },
    #[command(name = "agendar")]
    Schedule {
        /// CPF do paciente; por padrão o do usuário logado
        #[arg(long)]
        cpf: Option<String>,
        #[command(flatten)]
        slot: AppointmentArgs,
    },
    #[command(name = "reagendar")]
    Reschedule {
        id: String,
        #[command(flatten)]
        slot: AppointmentArgs,
    },
    #[command(name = "cancelar")]
    Cancel {
        id: String,
        /// Motivo informado pelo usuário (não é enviado ao Registry)
        #[arg(long = "motivo")]
        reason: Option<String>,
    },
}

#[derive(Args)]
pub struct ContactArgs {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long = "telefone")]
    pub phone: Option<String>,
    #[arg(long = "cep")]
    pub postal_code: Option<String>,
}

#[derive(Args)]
pub struct PatientArgs {
    #[arg(long = "nome")]
    pub name: String,
    #[arg(long = "idade")]
    pub age: u32,
    #[arg(long)]
    pub cpf: String,
    #[arg(long = "cep")]
    pub postal_code: String,
    #[arg(long)]
    pub email: String,
    #[arg(long = "senha")]
    pub password: String,
    #[arg(long = "telefone")]
    pub phone: String,
    #[arg(long = "patologia")]
    pub pathology: String,
    /// Aceite dos termos de uso
    #[arg(long = "aceito-termos")]
    pub consent: bool,
}

impl From<PatientArgs> for PatientForm {
    fn from(args: PatientArgs) -> Self {
        PatientForm {
            name: args.name,
            age: args.age,
            cpf: args.cpf,
            postal_code: args.postal_code,
            email: args.email,
            password: args.password,
            phone: args.phone,
            pathology: args.pathology,
            consent: args.consent,
        }
    }
}

#[derive(Args)]
pub struct CaregiverArgs {
    #[arg(long = "nome")]
    pub name: String,
    #[arg(long = "idade")]
    pub age: u32,
    #[arg(long)]
    pub cpf: String,
    /// CPF do paciente acompanhado
    #[arg(long = "cpf-paciente")]
    pub patient_cpf: String,
    #[arg(long = "cep")]
    pub postal_code: String,
    #[arg(long = "cep-paciente")]
    pub patient_postal_code: String,
    #[arg(long)]
    pub email: String,
    #[arg(long = "senha")]
    pub password: String,
    #[arg(long = "telefone")]
    pub phone: String,
    #[arg(long = "parentesco")]
    pub relationship: String,
    #[arg(long = "aceito-termos")]
    pub consent: bool,
}

impl From<CaregiverArgs> for CaregiverForm {
    fn from(args: CaregiverArgs) -> Self {
        CaregiverForm {
            name: args.name,
            age: args.age,
            cpf: args.cpf,
            patient_cpf: args.patient_cpf,
            postal_code: args.postal_code,
            patient_postal_code: args.patient_postal_code,
            email: args.email,
            password: args.password,
            phone: args.phone,
            relationship: args.relationship,
            consent: args.consent,
        }
    }
}

#[derive(Args)]
pub struct AppointmentArgs {
    #[arg(long = "especialidade")]
    pub specialty: String,
    #[arg(long = "medico")]
    pub doctor: String,
    #[arg(long = "especialidade-medico")]
    pub doctor_specialty: String,
    /// Data no formato AAAA-MM-DD
    #[arg(long = "data")]
    pub date: NaiveDate,
    /// Horário no formato HH:MM
    #[arg(long = "horario", value_parser = parse_time)]
    pub time: NaiveTime,
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    common_registry::models::parse_time(raw).map_err(|e| format!("horário inválido: {}", e))
}

impl From<AppointmentArgs> for AppointmentForm {
    fn from(args: AppointmentArgs) -> Self {
        AppointmentForm {
            specialty: args.specialty,
            doctor: args.doctor,
            doctor_specialty: args.doctor_specialty,
            date: args.date,
            time: args.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_arguments() {
        let cli = Cli::try_parse_from([
            "portal",
            "consultas",
            "agendar",
            "--cpf",
            "111.111.111-11",
            "--especialidade",
            "Cardiologia",
            "--medico",
            "Dr. João Silva",
            "--especialidade-medico",
            "Cardiologista",
            "--data",
            "2025-05-10",
            "--horario",
            "09:00",
        ])
        .expect("argumentos válidos");

        match cli.command {
            Command::Consultas(AppointmentCommand::Schedule { cpf, slot }) => {
                assert_eq!(cpf.as_deref(), Some("111.111.111-11"));
                assert_eq!(slot.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            }
            _ => panic!("subcomando inesperado"),
        }
    }

    #[test]
    fn test_invalid_time_is_rejected() {
        let result = Cli::try_parse_from([
            "portal",
            "consultas",
            "reagendar",
            "c1",
            "--especialidade",
            "Cardiologia",
            "--medico",
            "Dr. João Silva",
            "--especialidade-medico",
            "Cardiologista",
            "--data",
            "2025-05-10",
            "--horario",
            "9h",
        ]);
        assert!(result.is_err());
    }
}
