//! Hand-written stubs for the trait seams, shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::HealthSyncApi;
use crate::error::{RequestError, Result};
use crate::models::{
    Appointment, AuthResponse, ChatMessage, ChatRoomHistory, CreateAppointmentRequest,
    CreateDoctorNote, Doctor, HealthRecord, LoginRequest, Registration, SymptomRequest,
    SymptomResponse,
};
use crate::session::SessionStore;
use crate::vault::{CredentialVault, InMemoryCredentialVault, credential_keys};

fn unexpected<T>(call: &str) -> Result<T> {
    Err(RequestError::Domain(format!("stub: unexpected call to {call}")))
}

/// Canned [`HealthSyncApi`]. Single-shot results are configured as
/// `Option`s; repeated operations (symptom sends, appointment creations)
/// consume from queues. Unconfigured calls fail loudly.
#[derive(Default)]
pub(crate) struct StubApi {
    pub login_result: Mutex<Option<Result<AuthResponse>>>,
    pub register_result: Mutex<Option<Result<AuthResponse>>>,
    pub doctors_result: Mutex<Option<Result<Vec<Doctor>>>>,
    pub my_appointments_result: Mutex<Option<Result<Vec<Appointment>>>>,
    pub health_records_result: Mutex<Option<Result<Vec<HealthRecord>>>>,
    pub doctor_note_result: Mutex<Option<Result<HealthRecord>>>,
    pub history_result: Mutex<Option<Result<Vec<ChatRoomHistory>>>>,
    pub appointment_results: Mutex<VecDeque<Result<Appointment>>>,
    pub symptom_results: Mutex<VecDeque<Result<SymptomResponse>>>,
    pub symptom_requests: Mutex<Vec<SymptomRequest>>,
    pub appointment_requests: Mutex<Vec<CreateAppointmentRequest>>,
    pub history_calls: AtomicUsize,
}

impl StubApi {
    pub fn history_call_count(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn queue_symptom_result(&self, result: Result<SymptomResponse>) {
        self.symptom_results.lock().unwrap().push_back(result);
    }

    pub fn queue_appointment_result(&self, result: Result<Appointment>) {
        self.appointment_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl HealthSyncApi for StubApi {
    async fn login(&self, _request: &LoginRequest) -> Result<AuthResponse> {
        self.login_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("login"))
    }

    async fn register(&self, _registration: &Registration) -> Result<AuthResponse> {
        self.register_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("register"))
    }

    async fn fetch_doctors(&self) -> Result<Vec<Doctor>> {
        self.doctors_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("fetch_doctors"))
    }

    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> Result<Appointment> {
        self.appointment_requests.lock().unwrap().push(request.clone());
        self.appointment_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| unexpected("create_appointment"))
    }

    async fn fetch_my_appointments(&self) -> Result<Vec<Appointment>> {
        self.my_appointments_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("fetch_my_appointments"))
    }

    async fn fetch_patient_health_records(&self, _patient_id: i64) -> Result<Vec<HealthRecord>> {
        self.health_records_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("fetch_patient_health_records"))
    }

    async fn create_doctor_note(&self, _note: &CreateDoctorNote) -> Result<HealthRecord> {
        self.doctor_note_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("create_doctor_note"))
    }

    async fn fetch_chat_history(&self) -> Result<Vec<ChatRoomHistory>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unexpected("fetch_chat_history"))
    }

    async fn send_symptom(&self, request: &SymptomRequest) -> Result<SymptomResponse> {
        self.symptom_requests.lock().unwrap().push(request.clone());
        self.symptom_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| unexpected("send_symptom"))
    }
}

/// Vault that records whether the session already claimed authentication at
/// the moment the token entry was written, to pin the persist-then-notify
/// ordering.
pub(crate) struct OrderingVault {
    inner: InMemoryCredentialVault,
    pub session: Mutex<Option<Arc<SessionStore>>>,
    pub authenticated_when_token_stored: Mutex<Option<bool>>,
}

impl OrderingVault {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCredentialVault::new(),
            session: Mutex::new(None),
            authenticated_when_token_stored: Mutex::new(None),
        }
    }

    pub fn watch(&self, session: Arc<SessionStore>) {
        *self.session.lock().unwrap() = Some(session);
    }
}

impl CredentialVault for OrderingVault {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String) {
        if key == credential_keys::TOKEN {
            if let Some(session) = self.session.lock().unwrap().as_ref() {
                *self.authenticated_when_token_stored.lock().unwrap() =
                    Some(session.is_authenticated());
            }
        }
        self.inner.set(key, value);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }
}

pub(crate) fn auth_response(user_id: i64) -> AuthResponse {
    AuthResponse {
        access_token: format!("jwt-{user_id}"),
        token_type: "bearer".to_string(),
        user_id,
    }
}

pub(crate) fn doctor(id: i64) -> Doctor {
    Doctor {
        id,
        first_name: "Maya".to_string(),
        last_name: format!("Osei-{id}"),
        specialization: Some("General".to_string()),
        qualifications: None,
        email: format!("doctor{id}@clinic.example"),
        is_available: true,
        years_experience: Some(10),
        bio: None,
        rating: Some(4.8),
    }
}

pub(crate) fn appointment(id: i64) -> Appointment {
    Appointment {
        id,
        patient_id: 1,
        doctor_id: 3,
        start_time: "2024-07-27T10:30:00+00:00".to_string(),
        end_time: "2024-07-27T11:30:00+00:00".to_string(),
        status: "scheduled".to_string(),
        telemedicine_url: None,
    }
}

pub(crate) fn symptom_response(analysis: &str, advice: Option<&str>) -> SymptomResponse {
    SymptomResponse {
        analysis: Some(analysis.to_string()),
        triage_advice: advice.map(str::to_string),
    }
}

pub(crate) fn chat_room(room_number: u32) -> ChatRoomHistory {
    ChatRoomHistory {
        room_number,
        chats: vec![ChatMessage {
            id: i64::from(room_number) * 10,
            input_text: "I have a headache".to_string(),
            model_response: "How long has it lasted?".to_string(),
            triage_advice: None,
            created_at: "2024-07-01T09:00:00Z".to_string(),
            room_number,
        }],
    }
}
