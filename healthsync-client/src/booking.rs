use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::HealthSyncApi;
use crate::error::{RequestError, Result};
use crate::models::{Appointment, CreateAppointmentRequest, Doctor};

/// Selectable consultation slots, as offered by the scheduling surface.
pub const AVAILABLE_TIME_SLOTS: [&str; 8] = [
    "10:30 AM", "11:30 AM", "02:30 PM", "03:00 PM", "03:30 PM", "04:30 PM", "05:00 PM", "05:30 PM",
];

/// Fixed consultation length: the end instant is always start plus one hour.
const CONSULTATION_HOURS: i64 = 1;

/// A booking in progress. Mutable until submission.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub doctor: Option<Doctor>,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub is_submitting: bool,
}

impl BookingDraft {
    fn new(date: NaiveDate) -> Self {
        Self {
            doctor: None,
            date,
            time_slot: None,
            is_submitting: false,
        }
    }
}

/// Failure to turn a draft's date and slot into wire instants. Consumed by
/// the caller before any submission is attempted; never a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotConversionError {
    #[error("no time slot selected")]
    MissingSlot,
    #[error("cannot parse time slot {0:?}")]
    UnparseableSlot(String),
    #[error("selected time does not exist in the local timezone")]
    InvalidLocalTime,
}

/// Owns one booking draft and the gate over its confirmation.
///
/// Created when the chat flow enters scheduling and dropped when it leaves;
/// its lifetime is strictly bounded by the owning flow.
pub struct BookingCoordinator {
    api: Arc<dyn HealthSyncApi>,
    draft: Mutex<BookingDraft>,
    doctors: Mutex<Vec<Doctor>>,
}

impl BookingCoordinator {
    pub fn new(api: Arc<dyn HealthSyncApi>) -> Self {
        Self {
            api,
            draft: Mutex::new(BookingDraft::new(Local::now().date_naive())),
            doctors: Mutex::new(Vec::new()),
        }
    }

    /// Loads the selectable doctors and auto-selects the first one.
    pub async fn load_doctors(&self) -> Result<Vec<Doctor>> {
        let doctors = self.api.fetch_doctors().await?;
        info!(count = doctors.len(), "fetched doctors");
        if let Some(first) = doctors.first().cloned() {
            self.draft.lock().unwrap().doctor = Some(first);
        }
        *self.doctors.lock().unwrap() = doctors.clone();
        Ok(doctors)
    }

    pub fn doctors(&self) -> Vec<Doctor> {
        self.doctors.lock().unwrap().clone()
    }

    pub fn draft(&self) -> BookingDraft {
        self.draft.lock().unwrap().clone()
    }

    pub fn select_doctor(&self, doctor: Doctor) {
        self.draft.lock().unwrap().doctor = Some(doctor);
    }

    pub fn select_date(&self, date: NaiveDate) {
        self.draft.lock().unwrap().date = date;
    }

    pub fn select_time(&self, slot: impl Into<String>) {
        self.draft.lock().unwrap().time_slot = Some(slot.into());
    }

    /// Whether the confirm action is currently permitted.
    ///
    /// Derived from a single locked snapshot of the draft, so an observer
    /// never sees a value computed from a mix of old and new inputs.
    pub fn can_confirm(&self) -> bool {
        let draft = self.draft.lock().unwrap();
        draft.time_slot.is_some() && draft.doctor.is_some() && !draft.is_submitting
    }

    /// Derives the wire `(start, end)` instants for the current selection,
    /// in the device's local offset.
    pub fn appointment_window(
        &self,
    ) -> std::result::Result<(String, String), SlotConversionError> {
        let (date, slot) = {
            let draft = self.draft.lock().unwrap();
            let slot = draft
                .time_slot
                .clone()
                .ok_or(SlotConversionError::MissingSlot)?;
            (draft.date, slot)
        };
        slot_window(date, &slot)
    }

    /// Submits the draft through the pipeline.
    ///
    /// Only one submission may be in flight per draft; a second call while
    /// one is pending is rejected here, not by advisory UI disabling. The
    /// in-flight flag is released on every exit path, including drop.
    pub async fn submit(&self, request: CreateAppointmentRequest) -> Result<Appointment> {
        {
            let mut draft = self.draft.lock().unwrap();
            if draft.is_submitting {
                warn!("rejecting submit: a submission is already in flight");
                return Err(RequestError::Domain(
                    "An appointment request is already in progress.".to_string(),
                ));
            }
            draft.is_submitting = true;
        }
        let _release = SubmitGuard { draft: &self.draft };

        let appointment = self.api.create_appointment(&request).await?;
        info!(appointment_id = appointment.id, "appointment created");
        Ok(appointment)
    }
}

/// Releases the in-flight flag when the submission ends, however it ends.
struct SubmitGuard<'a> {
    draft: &'a Mutex<BookingDraft>,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.draft.lock().unwrap().is_submitting = false;
    }
}

/// Combines a calendar date with a human slot like "10:30 AM" into ISO-8601
/// start and end instants.
fn slot_window(
    date: NaiveDate,
    slot: &str,
) -> std::result::Result<(String, String), SlotConversionError> {
    let time = NaiveTime::parse_from_str(slot, "%I:%M %p")
        .map_err(|_| SlotConversionError::UnparseableSlot(slot.to_string()))?;
    let start = Local
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or(SlotConversionError::InvalidLocalTime)?;
    let end = start + Duration::hours(CONSULTATION_HOURS);
    Ok((start.to_rfc3339(), end.to_rfc3339()))
}
