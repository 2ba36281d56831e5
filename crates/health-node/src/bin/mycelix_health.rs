//! Mycelix-Health operator CLI
//!
//! Runs one core operation per invocation and prints its JSON response
//! envelope on stdout.
//!
//! Usage:
//!   mycelix-health check-config
//!   mycelix-health register-patient --name <name> --birthdate <YYYY-MM-DD>
//!   mycelix-health grant-permission --grantor <addr> --grantee <addr> --patient-id <id> --days 30 --actions READ,WRITE
//!   mycelix-health has-permission --user <addr> --patient-id <id> --action READ
//!   mycelix-health create-record --patient-id <id> --doctor <addr> --record-type consultation --data '{...}'
//!   mycelix-health demo

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use mycelix_health_identity::PersonalData;
use mycelix_health_node::HealthCore;
use mycelix_health_records::NewRecord;
use mycelix_health_shared::{
    telemetry, Address, HealthConfig, HealthError, HealthResult, LedgerNetwork, MedicalRecord, PatientId, PermissionId,
    RecordId, RecordPolicy, RecordStatus, RecordType, Role, ServiceResponse,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "mycelix-health")]
#[command(author = "Mycelix Health")]
#[command(version)]
#[command(about = "Operate the Mycelix-Health ledger access core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file; MYCELIX_HEALTH_* variables override it
    #[arg(short, long, env = "MYCELIX_HEALTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration without contacting the ledger
    CheckConfig,

    #[command(flatten)]
    Operation(Operation),
}

/// Commands that run against a live core
#[derive(Subcommand)]
enum Operation {
    /// Register a patient identity with a custodial wallet
    RegisterPatient {
        #[arg(long)]
        name: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birthdate: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Show a patient identity (personal data stays encrypted)
    GetPatient { patient_id: PatientId },

    /// Register a platform participant
    RegisterUser {
        #[arg(long)]
        address: String,

        /// patient, doctor, admin, nurse, pharmacist or the numeric code
        #[arg(long)]
        role: Role,

        /// Hex-encoded public key
        #[arg(long)]
        public_key: String,

        #[arg(long)]
        professional_id: Option<String>,
    },

    /// Grant a time-bounded permission on a patient
    GrantPermission {
        #[arg(long)]
        grantor: String,

        #[arg(long)]
        grantee: String,

        #[arg(long)]
        patient_id: PatientId,

        /// Validity in days from now
        #[arg(long, default_value = "30")]
        days: i64,

        /// Comma-separated actions
        #[arg(long, value_delimiter = ',', default_value = "READ")]
        actions: Vec<String>,
    },

    /// Revoke a permission; revocation is final
    RevokePermission { permission_id: PermissionId },

    /// Evaluate a permission without logging the attempt
    HasPermission {
        #[arg(long)]
        user: String,

        #[arg(long)]
        patient_id: PatientId,

        #[arg(long, default_value = "READ")]
        action: String,
    },

    /// Create an encrypted medical record
    CreateRecord {
        #[arg(long)]
        patient_id: PatientId,

        #[arg(long)]
        doctor: String,

        #[arg(long, default_value = "consultation")]
        record_type: RecordType,

        /// Medical payload as JSON
        #[arg(long)]
        data: String,

        #[arg(long)]
        emergency: bool,
    },

    /// Show a record's metadata
    GetRecord { record_id: RecordId },

    /// List a patient's records
    History { patient_id: PatientId },

    /// Run the full patient/doctor flow against the local ledger
    Demo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigSummary {
    network: LedgerNetwork,
    rpc_url: Option<String>,
    record_policy: RecordPolicy,
}

#[derive(Serialize)]
struct PermissionCheck {
    allowed: bool,
}

#[derive(Serialize)]
struct RecordHistory {
    records: Vec<MedicalRecord>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HealthConfig> {
    match path {
        Some(path) => {
            let mut config = HealthConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => Ok(HealthConfig::from_env()?),
    }
}

fn emit<T: Serialize>(result: HealthResult<T>) -> ExitCode {
    let response = ServiceResponse::from(result);
    let json = response.to_json();
    match serde_json::to_string_pretty(&json) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", json),
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).context("loading configuration")?;
    telemetry::init_tracing(config.log_format)?;

    let operation = match cli.command {
        Commands::CheckConfig => {
            let summary = config.validate().map(|_| ConfigSummary {
                network: config.network,
                rpc_url: config.resolved_rpc_url(),
                record_policy: config.record_policy,
            });
            return Ok(emit(summary));
        }
        Commands::Operation(operation) => operation,
    };

    let core = HealthCore::from_config(&config).context("starting health core")?;
    let code = run(&core, operation).await;
    core.shutdown().await?;
    Ok(code)
}

async fn run(core: &HealthCore, operation: Operation) -> ExitCode {
    match operation {
        Operation::RegisterPatient {
            name,
            birthdate,
            email,
            phone,
        } => {
            let mut personal = PersonalData::new(name, birthdate);
            personal.email = email;
            personal.phone = phone;
            emit(core.identity().register(personal).await)
        }

        Operation::GetPatient { patient_id } => emit(core.identity().get_patient(patient_id).await),

        Operation::RegisterUser {
            address,
            role,
            public_key,
            professional_id,
        } => {
            let result: HealthResult<_> = async {
                let address = Address::parse(address)?;
                core.access()
                    .register_user(&address, role, &public_key, professional_id)
                    .await
            }
            .await;
            emit(result)
        }

        Operation::GrantPermission {
            grantor,
            grantee,
            patient_id,
            days,
            actions,
        } => {
            let result: HealthResult<_> = async {
                let grantor = Address::parse(grantor)?;
                let grantee = Address::parse(grantee)?;
                let actions: Vec<&str> = actions.iter().map(String::as_str).collect();
                core.access()
                    .grant_permission(&grantor, &grantee, patient_id, Utc::now() + Duration::days(days), &actions)
                    .await
            }
            .await;
            emit(result)
        }

        Operation::RevokePermission { permission_id } => {
            emit(core.access().revoke_permission(permission_id).await)
        }

        Operation::HasPermission {
            user,
            patient_id,
            action,
        } => {
            let result: HealthResult<_> = async {
                let user = Address::parse(user)?;
                let allowed = core.access().has_permission(&user, patient_id, &action).await?;
                Ok::<_, HealthError>(PermissionCheck { allowed })
            }
            .await;
            emit(result)
        }

        Operation::CreateRecord {
            patient_id,
            doctor,
            record_type,
            data,
            emergency,
        } => {
            let result: HealthResult<_> = async {
                let doctor = Address::parse(doctor)?;
                let medical_data: serde_json::Value = serde_json::from_str(&data)?;
                let mut record = NewRecord::new(patient_id, doctor, record_type, medical_data);
                record.is_emergency = emergency;
                core.records().create(record).await
            }
            .await;
            emit(result)
        }

        Operation::GetRecord { record_id } => emit(core.records().get_record(record_id).await),

        Operation::History { patient_id } => {
            let result = core
                .records()
                .patient_history(patient_id)
                .await
                .map(|records| RecordHistory { records });
            emit(result)
        }

        Operation::Demo => emit(demo(core).await),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoSummary {
    patient_id: PatientId,
    record_id: RecordId,
    allowed_before_revoke: bool,
    allowed_after_revoke: bool,
    history_len: usize,
}

/// Register a patient and a doctor, grant, write, amend, revoke
async fn demo(core: &HealthCore) -> HealthResult<DemoSummary> {
    if core.local_ledger().is_none() {
        return Err(HealthError::Precondition(
            "demo only runs against the local network".to_string(),
        ));
    }

    let registration = core
        .identity()
        .register(PersonalData::new("Amina Odhiambo", "1990-04-12"))
        .await?;
    let patient_id = registration.patient_id;
    let doctor = Address::parse("0xd0c7a11ce")?;

    core.access()
        .register_user(&doctor, Role::Doctor, &"ab".repeat(32), Some("KMPDC-0001".to_string()))
        .await?;
    let granted = core
        .access()
        .grant_permission(
            &registration.wallet_address,
            &doctor,
            patient_id,
            Utc::now() + Duration::days(30),
            &["READ", "WRITE"],
        )
        .await?;
    let allowed_before_revoke = core.access().has_permission(&doctor, patient_id, "READ").await?;

    let created = core
        .records()
        .create(NewRecord::new(
            patient_id,
            doctor.clone(),
            RecordType::Consultation,
            serde_json::json!({"complaint": "persistent cough", "temperature": 37.9}),
        ))
        .await?;
    core.records()
        .update_status(created.record_id, RecordStatus::Finalized)
        .await?;
    core.records()
        .amend(
            created.record_id,
            "Added chest auscultation findings",
            &serde_json::json!({"complaint": "persistent cough", "temperature": 37.9, "chest": "clear"}),
        )
        .await?;

    core.access().revoke_permission(granted.permission_id).await?;
    let allowed_after_revoke = core.access().has_permission(&doctor, patient_id, "READ").await?;
    let history_len = core.records().patient_history(patient_id).await?.len();

    Ok(DemoSummary {
        patient_id,
        record_id: created.record_id,
        allowed_before_revoke,
        allowed_after_revoke,
        history_len,
    })
}
