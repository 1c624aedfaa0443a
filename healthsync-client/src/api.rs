use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    Appointment, AuthResponse, ChatRoomHistory, CreateAppointmentRequest, CreateDoctorNote,
    Doctor, HealthRecord, LoginRequest, Registration, SymptomRequest, SymptomResponse,
};
use crate::pipeline::{Payload, RequestPipeline};

/// Relative paths of the consumed HTTP surface.
pub mod endpoints {
    pub const LOGIN: &str = "/api/auth/login";
    pub const REGISTER: &str = "/api/auth/register";
    pub const DOCTORS: &str = "/api/appointment/doctors";
    /// The trailing slash is load-bearing: the server redirects
    /// `/api/appointment` to `/api/appointment/`, and the redirected request
    /// loses its Authorization header.
    pub const CREATE_APPOINTMENT: &str = "/api/appointment/";
    pub const MY_APPOINTMENTS: &str = "/api/appointment/my-appointments";
    pub const PATIENT_HEALTH_RECORDS: &str = "/api/health-record/patient";
    pub const CREATE_DOCTOR_NOTE: &str = "/api/health-record/doctor-note";
    pub const CHAT_HISTORY: &str = "/api/chatbot/chats";
    pub const SEND_SYMPTOM: &str = "/api/chatbot/symptom";
}

/// Typed surface of the HealthSync backend.
///
/// The flows depend on this trait rather than on [`RequestPipeline`]
/// directly, so tests can substitute canned implementations.
#[async_trait]
pub trait HealthSyncApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse>;
    async fn register(&self, registration: &Registration) -> Result<AuthResponse>;
    async fn fetch_doctors(&self) -> Result<Vec<Doctor>>;
    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> Result<Appointment>;
    async fn fetch_my_appointments(&self) -> Result<Vec<Appointment>>;
    async fn fetch_patient_health_records(&self, patient_id: i64) -> Result<Vec<HealthRecord>>;
    async fn create_doctor_note(&self, note: &CreateDoctorNote) -> Result<HealthRecord>;
    async fn fetch_chat_history(&self) -> Result<Vec<ChatRoomHistory>>;
    async fn send_symptom(&self, request: &SymptomRequest) -> Result<SymptomResponse>;
}

/// [`HealthSyncApi`] implementation over the request pipeline.
pub struct HttpHealthSyncApi {
    pipeline: Arc<RequestPipeline>,
}

impl HttpHealthSyncApi {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }
}

fn json_payload<T: Serialize>(body: &T) -> Payload {
    Payload::Json(serde_json::to_value(body).expect("request body serializes to JSON"))
}

#[async_trait]
impl HealthSyncApi for HttpHealthSyncApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        // The auth endpoint is the one form-encoded holdout; see Payload.
        let fields = vec![
            ("username", request.username.clone()),
            ("password", request.password.clone()),
        ];
        self.pipeline
            .execute(
                Method::POST,
                endpoints::LOGIN,
                Some(Payload::Form(fields)),
                false,
            )
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse> {
        self.pipeline
            .execute(
                Method::POST,
                endpoints::REGISTER,
                Some(Payload::Json(registration.to_json())),
                false,
            )
            .await
    }

    async fn fetch_doctors(&self) -> Result<Vec<Doctor>> {
        self.pipeline
            .execute(Method::GET, endpoints::DOCTORS, None, true)
            .await
    }

    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> Result<Appointment> {
        self.pipeline
            .execute(
                Method::POST,
                endpoints::CREATE_APPOINTMENT,
                Some(json_payload(request)),
                true,
            )
            .await
    }

    async fn fetch_my_appointments(&self) -> Result<Vec<Appointment>> {
        self.pipeline
            .execute(Method::GET, endpoints::MY_APPOINTMENTS, None, true)
            .await
    }

    async fn fetch_patient_health_records(&self, patient_id: i64) -> Result<Vec<HealthRecord>> {
        let path = format!("{}/{patient_id}", endpoints::PATIENT_HEALTH_RECORDS);
        self.pipeline.execute(Method::GET, &path, None, true).await
    }

    async fn create_doctor_note(&self, note: &CreateDoctorNote) -> Result<HealthRecord> {
        self.pipeline
            .execute(
                Method::POST,
                endpoints::CREATE_DOCTOR_NOTE,
                Some(json_payload(note)),
                true,
            )
            .await
    }

    async fn fetch_chat_history(&self) -> Result<Vec<ChatRoomHistory>> {
        self.pipeline
            .execute(Method::GET, endpoints::CHAT_HISTORY, None, true)
            .await
    }

    async fn send_symptom(&self, request: &SymptomRequest) -> Result<SymptomResponse> {
        self.pipeline
            .execute(
                Method::POST,
                endpoints::SEND_SYMPTOM,
                Some(json_payload(request)),
                true,
            )
            .await
    }
}
