pub mod api;
pub mod auth;
pub mod booking;
pub mod chat;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod vault;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{HealthSyncApi, HttpHealthSyncApi, endpoints};
pub use auth::Authenticator;
pub use booking::{AVAILABLE_TIME_SLOTS, BookingCoordinator, BookingDraft, SlotConversionError};
pub use chat::{
    ChatEntry, ChatFlowOrchestrator, ChatFlowState, ChatOutcome, SCHEDULE_APPOINTMENT_ADVICE,
    Sender,
};
pub use error::{RequestError, Result};
pub use models::{
    Appointment, AuthResponse, ChatMessage, ChatRoomHistory, CreateAppointmentRequest,
    CreateDoctorNote, Diagnosis, Doctor, Gender, HealthRecord, LoginRequest, Medication,
    PatientRegistration, Registration, DoctorRegistration, Symptom, SymptomRequest,
    SymptomResponse, TreatmentPlan,
};
pub use pipeline::{NoContent, Payload, RequestPipeline};
pub use session::{Session, SessionStore, UserRole};
pub use vault::{CredentialVault, InMemoryCredentialVault, StoredCredentials};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{StubApi, appointment, auth_response, doctor, symptom_response};

    #[tokio::test]
    async fn full_flow_from_sign_in_to_confirmed_booking() {
        let api = Arc::new(StubApi::default());
        *api.login_result.lock().unwrap() = Some(Ok(auth_response(42)));
        *api.history_result.lock().unwrap() = Some(Ok(vec![]));
        *api.doctors_result.lock().unwrap() = Some(Ok(vec![doctor(3), doctor(4)]));
        api.queue_symptom_result(Ok(symptom_response(
            "You should see a doctor soon.",
            Some(SCHEDULE_APPOINTMENT_ADVICE),
        )));
        api.queue_appointment_result(Ok(appointment(90)));

        let vault = Arc::new(InMemoryCredentialVault::new());
        let session = Arc::new(SessionStore::init(vault.clone()));
        let authenticator = Authenticator::new(api.clone(), vault.clone(), session.clone());

        authenticator
            .sign_in("ada", "secret", UserRole::Patient)
            .await
            .unwrap();
        assert!(session.is_authenticated());

        let chat = ChatFlowOrchestrator::new(api.clone(), session.clone());
        let outcome = chat.send_message("I have chest pain").await;
        assert_eq!(
            outcome,
            ChatOutcome::TriageAdvised(SCHEDULE_APPOINTMENT_ADVICE.to_string())
        );

        let booking = chat.open_scheduling().expect("scheduling opens");
        booking.load_doctors().await.unwrap();
        booking.select_time("10:30 AM");
        assert!(booking.can_confirm());

        let outcome = chat.confirm_booking().await;
        assert_eq!(outcome, ChatOutcome::Completed);
        assert_eq!(chat.flow_state(), ChatFlowState::Idle);
        assert!(chat.booking().is_none());
        assert!(session.is_authenticated());
    }
}
