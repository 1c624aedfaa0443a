//! Wire models for the HealthSync backend.
//!
//! The backend speaks snake_case JSON throughout, which coincides with Rust
//! field naming, so serde attributes only appear where a shape needs
//! behavior beyond the identity mapping (optional request fields, enum tag
//! values).

use serde::{Deserialize, Serialize};

use crate::session::UserRole;

/// Successful authentication payload, returned by both login and register.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: i64,
}

/// Credentials for the login endpoint. Sent form-encoded, not as JSON.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Wire values for the gender field of a patient registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "male")]
    Male,
    #[serde(rename = "female")]
    Female,
    #[serde(rename = "other")]
    Other,
    #[serde(rename = "prefer_not_to_say")]
    PreferNotToSay,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub blood_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_conditions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Always [`UserRole::Doctor`]; the registration endpoint infers patient
    /// when the field is absent.
    pub role: UserRole,
    pub specialization: String,
    pub qualifications: String,
    pub is_available: bool,
}

/// Registration payloads share one endpoint; the variant carries the
/// role-specific field set.
#[derive(Debug, Clone)]
pub enum Registration {
    Patient(PatientRegistration),
    Doctor(DoctorRegistration),
}

impl Registration {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Patient(_) => UserRole::Patient,
            Self::Doctor(_) => UserRole::Doctor,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Patient(data) => &data.first_name,
            Self::Doctor(data) => &data.first_name,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Patient(data) => serde_json::to_value(data),
            Self::Doctor(data) => serde_json::to_value(data),
        }
        .expect("registration serializes to JSON")
    }
}

/// A bookable doctor. Read-only: fetched from the server, never mutated
/// locally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub email: String,
    pub is_available: bool,
    pub years_experience: Option<i32>,
    pub bio: Option<String>,
    pub rating: Option<f64>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Body for appointment creation. Instants are ISO-8601 strings produced by
/// the booking coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub telemedicine_url: String,
}

/// A created or listed appointment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub start_time: String,
    pub end_time: String,
    /// "scheduled", "completed", "cancelled" or "no_show".
    pub status: String,
    pub telemedicine_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    pub severity: Option<i32>,
    pub duration: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub name: String,
    pub icd10_code: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub description: String,
    pub duration: Option<String>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: Option<String>,
    pub notes: Option<String>,
}

/// A stored health record: triage output or a doctor's note.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthRecord {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub title: String,
    pub summary: String,
    /// "doctor_note", "ai_triage", ...
    pub record_type: String,
    pub symptoms: Option<Vec<Symptom>>,
    pub diagnosis: Option<Vec<Diagnosis>>,
    pub treatment_plan: Option<Vec<TreatmentPlan>>,
    pub medication: Option<Vec<Medication>>,
    pub triage_recommendation: Option<String>,
    pub confidence_score: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body for doctor-note creation. The server assigns id, record type and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDoctorNote {
    pub title: String,
    pub summary: String,
    pub patient_id: i64,
    pub symptoms: Vec<Symptom>,
    pub diagnosis: Vec<Diagnosis>,
    pub treatment_plan: Vec<TreatmentPlan>,
    pub medication: Vec<Medication>,
}

/// One stored exchange in a chat room: the user's text and the model's
/// reply, append-only per room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub input_text: String,
    pub model_response: String,
    pub triage_advice: Option<String>,
    pub created_at: String,
    pub room_number: u32,
}

/// All stored exchanges of one room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatRoomHistory {
    pub room_number: u32,
    pub chats: Vec<ChatMessage>,
}

/// Body for sending one symptom message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomRequest {
    pub symptom_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<u32>,
}

/// Reply to a symptom message. `triage_advice` is a short signal string,
/// e.g. "schedule_appointment".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymptomResponse {
    pub analysis: Option<String>,
    pub triage_advice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_decodes_from_wire_shape() {
        let body = r#"{"access_token":"jwt-abc","token_type":"bearer","user_id":17}"#;
        let decoded: AuthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.access_token, "jwt-abc");
        assert_eq!(decoded.user_id, 17);
    }

    #[test]
    fn doctor_decodes_with_nullable_fields() {
        let body = r#"{
            "id": 3,
            "first_name": "Maya",
            "last_name": "Osei",
            "specialization": "Cardiology",
            "qualifications": null,
            "email": "maya@clinic.example",
            "is_available": true,
            "years_experience": null,
            "bio": null,
            "rating": 4.5
        }"#;
        let doctor: Doctor = serde_json::from_str(body).unwrap();
        assert_eq!(doctor.full_name(), "Maya Osei");
        assert_eq!(doctor.years_experience, None);
        assert_eq!(doctor.rating, Some(4.5));
    }

    #[test]
    fn symptom_request_omits_absent_room_number() {
        let request = SymptomRequest {
            symptom_text: "headache".to_string(),
            room_number: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"symptom_text": "headache"}));
    }

    #[test]
    fn patient_registration_serializes_backend_gender_tag() {
        let registration = PatientRegistration {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: "1990-12-10".to_string(),
            gender: Gender::PreferNotToSay,
            height_cm: 170.0,
            weight_kg: 60.0,
            blood_type: "O+".to_string(),
            allergies: None,
            existing_conditions: None,
        };
        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["gender"], "prefer_not_to_say");
        assert!(json.get("allergies").is_none());
    }

    #[test]
    fn doctor_registration_carries_role_tag() {
        let registration = DoctorRegistration {
            username: "gho".to_string(),
            email: "g@clinic.example".to_string(),
            password: "secret".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Ho".to_string(),
            role: UserRole::Doctor,
            specialization: "Dermatology".to_string(),
            qualifications: "MD".to_string(),
            is_available: true,
        };
        let json = Registration::Doctor(registration).to_json();
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["is_available"], true);
    }

    #[test]
    fn chat_history_decodes_room_shape() {
        let body = r#"[{
            "room_number": 2,
            "chats": [{
                "id": 11,
                "input_text": "I have a rash",
                "model_response": "Tell me more.",
                "triage_advice": null,
                "created_at": "2024-07-01T09:00:00Z",
                "room_number": 2
            }]
        }]"#;
        let rooms: Vec<ChatRoomHistory> = serde_json::from_str(body).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_number, 2);
        assert_eq!(rooms[0].chats[0].triage_advice, None);
    }
}
