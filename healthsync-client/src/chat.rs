//! Chat flow orchestration: the conversation log, room numbering, history
//! pagination, and the state machine that opens and closes the scheduling
//! sub-flow around a [`BookingCoordinator`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::HealthSyncApi;
use crate::booking::BookingCoordinator;
use crate::error::RequestError;
use crate::models::{ChatRoomHistory, CreateAppointmentRequest, SymptomRequest};
use crate::session::SessionStore;

/// Triage signal that invites the user into the scheduling sub-flow.
pub const SCHEDULE_APPOINTMENT_ADVICE: &str = "schedule_appointment";

const GREETING: &str = "Hello, how can I help you?";

/// Where the chat flow currently is. Transitions are driven by user actions
/// and by responses folding back in; see the individual methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlowState {
    Idle,
    AwaitingResponse,
    TriageReceived,
    Scheduling,
    ConfirmingBooking,
}

/// Author of a logged chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// One line of the local conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: Sender,
    pub text: String,
}

impl ChatEntry {
    fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

/// What a user-triggered chat action produced, for the embedding surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The action completed; log and state reflect it.
    Completed,
    /// The response carried triage advice; the flow is waiting for the user
    /// to act on it.
    TriageAdvised(String),
    /// The action failed with a user-facing message. Selections and advice
    /// are retained so the user can retry.
    Failed(String),
    /// The session is no longer authenticated; the user must log in again.
    SessionExpired,
    /// The action was not applicable: blank input, a state that does not
    /// accept it, or a stale result arriving after logout.
    Ignored,
}

struct ChatState {
    flow: ChatFlowState,
    log: Vec<ChatEntry>,
    history: Vec<ChatRoomHistory>,
    /// Room number the next brand-new chat will claim.
    next_room_number: u32,
    /// Room of the conversation currently on screen, once it has a message.
    active_room: Option<u32>,
    triage_advice: Option<String>,
    last_error: Option<String>,
    booking: Option<Arc<BookingCoordinator>>,
    history_loading: bool,
}

impl ChatState {
    fn new() -> Self {
        Self {
            flow: ChatFlowState::Idle,
            log: vec![ChatEntry::assistant(GREETING)],
            history: Vec::new(),
            next_room_number: 1,
            active_room: None,
            triage_advice: None,
            last_error: None,
            booking: None,
            history_loading: false,
        }
    }
}

/// Drives one user's chat, from plain symptom messages through triage into
/// booking confirmation.
///
/// All state lives behind one mutex that is only held between suspension
/// points; the network calls themselves run unlocked.
pub struct ChatFlowOrchestrator {
    api: Arc<dyn HealthSyncApi>,
    session: Arc<SessionStore>,
    state: Mutex<ChatState>,
}

impl ChatFlowOrchestrator {
    pub fn new(api: Arc<dyn HealthSyncApi>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(ChatState::new()),
        }
    }

    pub fn flow_state(&self) -> ChatFlowState {
        self.state.lock().unwrap().flow
    }

    pub fn log(&self) -> Vec<ChatEntry> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn history(&self) -> Vec<ChatRoomHistory> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn next_room_number(&self) -> u32 {
        self.state.lock().unwrap().next_room_number
    }

    pub fn triage_advice(&self) -> Option<String> {
        self.state.lock().unwrap().triage_advice.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }

    pub fn booking(&self) -> Option<Arc<BookingCoordinator>> {
        self.state.lock().unwrap().booking.clone()
    }

    /// Chronological view of one stored room, oldest exchange first.
    pub fn room_messages(&self, room_number: u32) -> Vec<ChatEntry> {
        let state = self.state.lock().unwrap();
        let Some(room) = state
            .history
            .iter()
            .find(|room| room.room_number == room_number)
        else {
            return Vec::new();
        };
        let mut chats = room.chats.clone();
        chats.sort_by_key(|chat| chat.id);
        chats
            .into_iter()
            .flat_map(|chat| {
                [
                    ChatEntry::user(chat.input_text),
                    ChatEntry::assistant(chat.model_response),
                ]
            })
            .collect()
    }

    /// Refreshes the cached room list. Rooms are kept newest-first; the next
    /// free room number follows the highest ever seen.
    pub async fn fetch_history(&self) -> ChatOutcome {
        {
            let mut state = self.state.lock().unwrap();
            if state.history_loading {
                return ChatOutcome::Ignored;
            }
            state.history_loading = true;
        }

        let result = self.api.fetch_chat_history().await;

        let mut state = self.state.lock().unwrap();
        state.history_loading = false;
        match result {
            Ok(mut rooms) => {
                if !self.session.is_authenticated() {
                    return ChatOutcome::Ignored;
                }
                rooms.sort_by(|a, b| b.room_number.cmp(&a.room_number));
                let highest = rooms.first().map_or(0, |room| room.room_number);
                state.next_room_number = state.next_room_number.max(highest + 1);
                info!(
                    rooms = rooms.len(),
                    next_room = state.next_room_number,
                    "chat history refreshed"
                );
                state.history = rooms;
                ChatOutcome::Completed
            }
            Err(RequestError::Unauthorized) => self.expire_session(&mut state),
            Err(err) => {
                warn!(%err, "failed to fetch chat history");
                let message = err.user_message();
                state.last_error = Some(message.clone());
                ChatOutcome::Failed(message)
            }
        }
    }

    /// Sends one symptom message.
    ///
    /// Accepted from `Idle` and from `TriageReceived` (which it leaves by
    /// clearing the retained advice). The user's line is appended to the log
    /// optimistically, before the call resolves.
    pub async fn send_message(&self, input: &str) -> ChatOutcome {
        let text = input.trim();
        if text.is_empty() {
            return ChatOutcome::Ignored;
        }

        let room = {
            let mut state = self.state.lock().unwrap();
            if !matches!(
                state.flow,
                ChatFlowState::Idle | ChatFlowState::TriageReceived
            ) {
                return ChatOutcome::Ignored;
            }
            state.flow = ChatFlowState::AwaitingResponse;
            state.triage_advice = None;
            state.last_error = None;
            state.log.push(ChatEntry::user(text));
            let next_room = state.next_room_number;
            *state.active_room.get_or_insert(next_room)
        };

        debug!(room, "sending symptom message");
        let request = SymptomRequest {
            symptom_text: text.to_string(),
            room_number: Some(room),
        };
        let result = self.api.send_symptom(&request).await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(response) => {
                if !self.session.is_authenticated() {
                    // Logged out while the call was in flight.
                    state.flow = ChatFlowState::Idle;
                    return ChatOutcome::Ignored;
                }
                let reply = response
                    .analysis
                    .unwrap_or_else(|| "Sorry, I couldn't process that.".to_string());
                state.log.push(ChatEntry::assistant(reply));

                if room == state.next_room_number {
                    // First successful exchange of a brand-new room: reserve
                    // the next number and pick up the new room in the cached
                    // history, once.
                    state.next_room_number = room + 1;
                    let room_known = state.history.iter().any(|r| r.room_number == room);
                    if !room_known {
                        drop(state);
                        self.fetch_history().await;
                        state = self.state.lock().unwrap();
                    }
                }

                match response.triage_advice.filter(|advice| !advice.is_empty()) {
                    Some(advice) => {
                        info!(%advice, "triage advice received");
                        state.triage_advice = Some(advice.clone());
                        state.flow = ChatFlowState::TriageReceived;
                        ChatOutcome::TriageAdvised(advice)
                    }
                    None => {
                        state.flow = ChatFlowState::Idle;
                        ChatOutcome::Completed
                    }
                }
            }
            Err(RequestError::Unauthorized) => self.expire_session(&mut state),
            Err(err) => {
                warn!(%err, "sending message failed");
                let message = err.user_message();
                state
                    .log
                    .push(ChatEntry::assistant(format!(
                        "Sorry, something went wrong. {message}"
                    )));
                state.last_error = Some(message.clone());
                state.flow = ChatFlowState::Idle;
                ChatOutcome::Failed(message)
            }
        }
    }

    /// Resets to a fresh conversation. Rejected while a response or a
    /// booking confirmation is in flight.
    pub fn start_new_chat(&self) -> ChatOutcome {
        let mut state = self.state.lock().unwrap();
        if matches!(
            state.flow,
            ChatFlowState::AwaitingResponse | ChatFlowState::ConfirmingBooking
        ) {
            return ChatOutcome::Ignored;
        }
        state.flow = ChatFlowState::Idle;
        state.log = vec![ChatEntry::assistant(GREETING)];
        state.active_room = None;
        state.triage_advice = None;
        state.last_error = None;
        state.booking = None;
        info!("started new chat");
        ChatOutcome::Completed
    }

    /// Enters the scheduling sub-flow, creating the booking coordinator.
    ///
    /// Only one coordinator may exist at a time: re-entering while one is
    /// live hands back the existing instance. Outside `TriageReceived` and
    /// `Scheduling` the action is not available.
    pub fn open_scheduling(&self) -> Option<Arc<BookingCoordinator>> {
        let mut state = self.state.lock().unwrap();
        match state.flow {
            ChatFlowState::TriageReceived => {
                let booking = Arc::new(BookingCoordinator::new(self.api.clone()));
                state.booking = Some(booking.clone());
                state.flow = ChatFlowState::Scheduling;
                info!("scheduling opened");
                Some(booking)
            }
            ChatFlowState::Scheduling => state.booking.clone(),
            _ => None,
        }
    }

    /// Leaves the scheduling sub-flow and discards the coordinator. The
    /// retained advice survives, so the prompt can be offered again.
    pub fn close_scheduling(&self) -> ChatOutcome {
        let mut state = self.state.lock().unwrap();
        if state.flow != ChatFlowState::Scheduling {
            return ChatOutcome::Ignored;
        }
        state.booking = None;
        state.flow = if state.triage_advice.is_some() {
            ChatFlowState::TriageReceived
        } else {
            ChatFlowState::Idle
        };
        info!("scheduling closed");
        ChatOutcome::Completed
    }

    /// Confirms the booking through the active coordinator.
    ///
    /// Accepted only while scheduling with the coordinator's gate open. On
    /// success the coordinator is discarded, the advice cleared, and the
    /// flow returns to `Idle`; on failure it stays in `Scheduling` with
    /// selections intact so the user can retry.
    pub async fn confirm_booking(&self) -> ChatOutcome {
        let booking = {
            let mut state = self.state.lock().unwrap();
            if state.flow != ChatFlowState::Scheduling {
                return ChatOutcome::Ignored;
            }
            let Some(booking) = state.booking.clone() else {
                return ChatOutcome::Ignored;
            };
            if !booking.can_confirm() {
                let message = "Please select a doctor, date, and time.".to_string();
                state.last_error = Some(message.clone());
                return ChatOutcome::Failed(message);
            }
            state.flow = ChatFlowState::ConfirmingBooking;
            state.last_error = None;
            booking
        };

        let (start_time, end_time) = match booking.appointment_window() {
            Ok(window) => window,
            Err(err) => {
                warn!(%err, "slot conversion failed");
                return self.fail_confirmation(format!(
                    "Could not prepare the appointment time: {err}"
                ));
            }
        };
        let Some(doctor) = booking.draft().doctor else {
            return self.fail_confirmation("Please select a doctor, date, and time.".to_string());
        };

        let request = CreateAppointmentRequest {
            doctor_id: doctor.id,
            start_time,
            end_time,
            telemedicine_url: telemedicine_url(),
        };
        let result = booking.submit(request).await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(appointment) => {
                if !self.session.is_authenticated() {
                    state.flow = ChatFlowState::Idle;
                    return ChatOutcome::Ignored;
                }
                info!(appointment_id = appointment.id, "booking confirmed");
                state.booking = None;
                state.triage_advice = None;
                state.flow = ChatFlowState::Idle;
                state
                    .log
                    .push(ChatEntry::assistant("Your appointment is booked."));
                ChatOutcome::Completed
            }
            Err(RequestError::Unauthorized) => self.expire_session(&mut state),
            Err(err) => {
                warn!(%err, "booking failed");
                let message = err.user_message();
                state.last_error = Some(message.clone());
                state.flow = ChatFlowState::Scheduling;
                ChatOutcome::Failed(message)
            }
        }
    }

    fn fail_confirmation(&self, message: String) -> ChatOutcome {
        let mut state = self.state.lock().unwrap();
        state.flow = ChatFlowState::Scheduling;
        state.last_error = Some(message.clone());
        ChatOutcome::Failed(message)
    }

    /// Unauthorized short-circuit: regardless of where the flow was, tear
    /// the session down and land idle.
    fn expire_session(&self, state: &mut MutexGuard<'_, ChatState>) -> ChatOutcome {
        warn!("unauthorized response; expiring session");
        state.flow = ChatFlowState::Idle;
        state.booking = None;
        state.triage_advice = None;
        state.last_error = Some(RequestError::Unauthorized.user_message());
        self.session.logout();
        ChatOutcome::SessionExpired
    }
}

/// Placeholder meeting link; the real link is provisioned server-side after
/// creation.
fn telemedicine_url() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("https://example.com/meeting/{}", &id[..8])
}
