//! Line-oriented front-end over the HealthSync client core: sign in, chat
//! with the symptom checker, and book an appointment when triage suggests
//! one. All domain behavior lives in the library; this binary only wires
//! components together and translates lines into actions.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use healthsync_client::{
    AVAILABLE_TIME_SLOTS, Authenticator, ChatFlowOrchestrator, ChatOutcome, CredentialVault,
    HttpHealthSyncApi, InMemoryCredentialVault, RequestError, RequestPipeline, SessionStore,
    UserRole,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing based on environment variables.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "healthsync_cli=info,healthsync_client=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

async fn print(text: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> anyhow::Result<String> {
    print(prompt).await?;
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("stdin closed"))?;
    Ok(line.trim().to_string())
}

async fn sign_in(
    lines: &mut Lines<BufReader<Stdin>>,
    authenticator: &Authenticator,
) -> anyhow::Result<()> {
    loop {
        let username = read_line(lines, "Username:").await?;
        let password = read_line(lines, "Password:").await?;
        let role = match read_line(lines, "Role [patient/doctor]:").await?.as_str() {
            "doctor" => UserRole::Doctor,
            _ => UserRole::Patient,
        };
        match authenticator.sign_in(&username, &password, role).await {
            Ok(()) => return Ok(()),
            Err(err) => print(&format!("Sign-in failed: {}", err.user_message())).await?,
        }
    }
}

async fn show_help() -> anyhow::Result<()> {
    print(concat!(
        "Commands:\n",
        "  :history           list stored chat rooms\n",
        "  :room <n>          show one stored room\n",
        "  :new               start a new chat\n",
        "  :schedule          open booking after triage advice\n",
        "  :doctors           list doctors while booking\n",
        "  :doctor <n>        pick a doctor by list position\n",
        "  :date <YYYY-MM-DD> pick the appointment date\n",
        "  :time <slot>       pick a slot, e.g. :time 10:30 AM\n",
        "  :slots             list selectable slots\n",
        "  :confirm           confirm the booking\n",
        "  :cancel            leave the booking flow\n",
        "  :quit              exit\n",
        "Anything else is sent to the symptom checker."
    ))
    .await
}

async fn report(outcome: ChatOutcome, chat: &ChatFlowOrchestrator) -> anyhow::Result<bool> {
    match outcome {
        ChatOutcome::Completed => {
            if let Some(entry) = chat.log().last() {
                print(&entry.text).await?;
            }
        }
        ChatOutcome::TriageAdvised(advice) => {
            if let Some(entry) = chat.log().last() {
                print(&entry.text).await?;
            }
            print(&format!(
                "Triage suggests: {advice}. Use :schedule to book an appointment."
            ))
            .await?;
        }
        ChatOutcome::Failed(message) => print(&format!("Error: {message}")).await?,
        ChatOutcome::SessionExpired => {
            print("Your session has expired. Please log in again.").await?;
            return Ok(false);
        }
        ChatOutcome::Ignored => {}
    }
    Ok(true)
}

async fn handle_command(
    line: &str,
    chat: &ChatFlowOrchestrator,
) -> anyhow::Result<Option<ChatOutcome>> {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        ":history" => {
            let outcome = chat.fetch_history().await;
            if outcome == ChatOutcome::Completed {
                for room in chat.history() {
                    print(&format!(
                        "room {} ({} exchanges)",
                        room.room_number,
                        room.chats.len()
                    ))
                    .await?;
                }
            }
            Ok(Some(outcome))
        }
        ":room" => {
            let room: u32 = argument.parse().context("usage: :room <number>")?;
            for entry in chat.room_messages(room) {
                let prefix = match entry.sender {
                    healthsync_client::Sender::User => "you",
                    healthsync_client::Sender::Assistant => "bot",
                };
                print(&format!("{prefix}> {}", entry.text)).await?;
            }
            Ok(None)
        }
        ":new" => Ok(Some(chat.start_new_chat())),
        ":schedule" => match chat.open_scheduling() {
            Some(booking) => match booking.load_doctors().await {
                Ok(doctors) => {
                    let names: Vec<String> =
                        doctors.iter().map(|doctor| doctor.full_name()).collect();
                    print(&format!("Doctors: {}", names.join(", "))).await?;
                    Ok(None)
                }
                Err(RequestError::Unauthorized) => Ok(Some(ChatOutcome::SessionExpired)),
                Err(err) => Ok(Some(ChatOutcome::Failed(err.user_message()))),
            },
            None => {
                print("Scheduling is only available after triage advice.").await?;
                Ok(None)
            }
        },
        ":doctors" => {
            if let Some(booking) = chat.booking() {
                for (index, doctor) in booking.doctors().iter().enumerate() {
                    print(&format!("{}. {}", index + 1, doctor.full_name())).await?;
                }
            }
            Ok(None)
        }
        ":doctor" => {
            let booking = chat.booking().context("no booking in progress")?;
            let position: usize = argument.parse().context("usage: :doctor <position>")?;
            let doctor = booking
                .doctors()
                .get(position.saturating_sub(1))
                .cloned()
                .context("no doctor at that position")?;
            print(&format!("Selected {}", doctor.full_name())).await?;
            booking.select_doctor(doctor);
            Ok(None)
        }
        ":date" => {
            let booking = chat.booking().context("no booking in progress")?;
            let date: NaiveDate = argument.parse().context("usage: :date <YYYY-MM-DD>")?;
            booking.select_date(date);
            Ok(None)
        }
        ":time" => {
            let booking = chat.booking().context("no booking in progress")?;
            booking.select_time(argument);
            Ok(None)
        }
        ":slots" => {
            print(&AVAILABLE_TIME_SLOTS.join(", ")).await?;
            Ok(None)
        }
        ":confirm" => Ok(Some(chat.confirm_booking().await)),
        ":cancel" => Ok(Some(chat.close_scheduling())),
        ":help" => {
            show_help().await?;
            Ok(None)
        }
        _ => Err(anyhow!("unknown command {command}; try :help")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let base_url =
        std::env::var("HEALTHSYNC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    info!(%base_url, "starting healthsync-cli");

    let vault: Arc<dyn CredentialVault> = Arc::new(InMemoryCredentialVault::new());
    let pipeline = Arc::new(
        RequestPipeline::new(&base_url, vault.clone())
            .map_err(|err| anyhow!("invalid HEALTHSYNC_BASE_URL: {err}"))?,
    );
    let api = Arc::new(HttpHealthSyncApi::new(pipeline));
    let session = Arc::new(SessionStore::init(vault.clone()));
    let authenticator = Authenticator::new(api.clone(), vault.clone(), session.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !session.is_authenticated() {
        sign_in(&mut lines, &authenticator).await?;
    }
    let display_name = vault.display_name().unwrap_or_else(|| "there".to_string());
    print(&format!("Hello {display_name}! Describe your symptoms, or :help for commands.")).await?;

    let chat = ChatFlowOrchestrator::new(api, session.clone());
    chat.fetch_history().await;

    loop {
        let line = read_line(&mut lines, ">").await?;
        if line.is_empty() {
            continue;
        }
        if line == ":quit" {
            authenticator.sign_out();
            break;
        }

        let outcome = if line.starts_with(':') {
            match handle_command(&line, &chat).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    print(&format!("{err}")).await?;
                    None
                }
            }
        } else {
            Some(chat.send_message(&line).await)
        };

        if let Some(outcome) = outcome {
            if !report(outcome, &chat).await? {
                // The store may not have seen the 401 itself (e.g. a doctor
                // fetch outside the chat flow); reset it before re-auth.
                authenticator.sign_out();
                sign_in(&mut lines, &authenticator).await?;
            }
        }
    }

    Ok(())
}
