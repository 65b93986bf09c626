//! Offline mode: a signed-in session over seeded in-memory data

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use log::debug;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use lifeline::{
    Backend, Conversation, InMemoryBackend, MemoryTokenStore, Message, Notification,
    NotificationKind, ParticipantUser, Role, Session, User,
};

const DEMO_EMAIL: &str = "demo.donor@lifeline.local";
const VOLUNTEER_EMAIL: &str = "rahim.volunteer@lifeline.local";

/// How often a new urgent request shows up in offline mode
const ACTIVITY_INTERVAL: Duration = Duration::from_secs(30);

/// Sign in a demo user against a seeded backend
///
/// Must be called from within a tokio runtime: a background task keeps
/// adding notifications so the poll has something to pick up.
pub fn start() -> Result<(Session, Arc<dyn Backend>)> {
    let user = User::new(DEMO_EMAIL, "Demo Donor", Role::Donor);
    let backend = Arc::new(InMemoryBackend::new(user.clone()));
    seed(&backend);

    let session = Session::new(Arc::new(MemoryTokenStore::default()));
    session.sign_in("offline", user)?;

    tokio::spawn(simulate_activity(backend.clone()));
    let backend: Arc<dyn Backend> = backend;
    Ok((session, backend))
}

fn seed(backend: &InMemoryBackend) {
    let now = Utc::now();

    let mut conversation = Conversation::new("demo-c1", DEMO_EMAIL, VOLUNTEER_EMAIL);
    conversation.participant_users.push(ParticipantUser {
        email: VOLUNTEER_EMAIL.to_string(),
        name: Some("Rahim".to_string()),
        photo_url: None,
        role: Some(Role::Volunteer),
    });
    conversation.last_message = Some("Can you reach the hospital by 5pm?".to_string());
    conversation.last_message_at = Some(now - ChronoDuration::minutes(12));
    conversation.unread_count = 1;
    conversation.request_id = Some("demo-r1".to_string());
    backend.add_conversation(conversation);

    backend.add_message(
        Message::builder("demo-m1", "demo-c1")
            .from(VOLUNTEER_EMAIL)
            .to(DEMO_EMAIL)
            .content("Can you reach the hospital by 5pm?")
            .created_at(now - ChronoDuration::minutes(12))
            .build(),
    );
    backend.set_message_unread(1);

    let mut welcome = Notification::new(
        "demo-n1",
        NotificationKind::Welcome,
        "Welcome to Lifeline",
        "Thanks for registering as a donor",
        now - ChronoDuration::days(3),
    );
    welcome.read = true;

    let message = Notification::new(
        "demo-n2",
        NotificationKind::decode(
            "new_message",
            json!({ "conversationId": "demo-c1", "senderName": "Rahim" }),
        ),
        "New message from Rahim",
        "Can you reach the hospital by 5pm?",
        now - ChronoDuration::minutes(12),
    );

    backend.set_notifications(vec![message, welcome]);
}

async fn simulate_activity(backend: Arc<InMemoryBackend>) {
    let mut ticker = tokio::time::interval(ACTIVITY_INTERVAL);
    ticker.tick().await;

    let mut n = 0u32;
    loop {
        ticker.tick().await;
        n += 1;

        let request_id = format!("demo-r{}", n + 1);
        backend.push_notification(Notification::new(
            format!("demo-urgent-{}", n),
            NotificationKind::UrgentRequest {
                request_id,
                blood_group: Some("B+".to_string()),
                district: Some("Dhaka".to_string()),
            },
            "Urgent blood request",
            "B+ needed at Dhaka Medical College Hospital",
            Utc::now(),
        ));
        debug!("Added demo notification {}", n);
    }
}
