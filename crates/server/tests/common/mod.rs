//! Shared fixtures for the integration tests: an in-memory schema, a
//! recording mailer and a test configuration.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use lettre::Message;
use parliament_alerts::{
    AppResources,
    api::app,
    config::{AlertsConfig, AppConfig, SmtpConfig},
    entity::{hansard, politician, politician_alert, statement},
    mailer::{MailError, Mailer},
    session::AUTHENTICATED_EMAIL_HEADER,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    Statement,
};
use std::sync::{Arc, Mutex};
use time::{Date, OffsetDateTime};

pub const TEST_SECRET: &str = "12345678901234567890123456789012";
pub const SITE_URL: &str = "https://parl.test";

/// One delivered message as seen by the SMTP relay.
#[derive(Clone, Debug)]
pub struct SentMail {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        let from = message.envelope().from().map(|a| a.to_string());
        let to = message
            .envelope()
            .to()
            .iter()
            .map(|a| a.to_string())
            .collect();
        let subject = message
            .headers()
            .get_raw("Subject")
            .unwrap_or_default()
            .to_string();
        self.sent.lock().unwrap().push(SentMail { from, to, subject });
        Ok(())
    }
}

/// Create a test database connection with the alert schema.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    for sql in [
        r#"CREATE TABLE politician (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            identifier TEXT NOT NULL UNIQUE,
            current_member BOOLEAN NOT NULL DEFAULT 1
        );"#,
        r#"CREATE TABLE hansard (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL
        );"#,
        r#"CREATE TABLE statement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hansard_id INTEGER NOT NULL,
            politician_id INTEGER NULL,
            sequence INTEGER NOT NULL,
            topic TEXT NOT NULL,
            content TEXT NOT NULL
        );"#,
        r#"CREATE TABLE politician_alert (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            politician_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE alert_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE subscription (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            query TEXT NOT NULL,
            topic TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, query)
        );"#,
    ] {
        db.execute(Statement::from_string(DbBackend::Sqlite, sql))
            .await
            .expect("create table");
    }

    db
}

pub fn create_test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        smtp: SmtpConfig {
            server: "localhost".into(),
            port: 25,
            username: "test".into(),
            password: "test".into(),
        },
        site_url: SITE_URL.into(),
        signing_secret: TEST_SECRET.into(),
        readonly_db: false,
        admins: vec!["ops@parl.test".into()],
        alerts: AlertsConfig::default(),
    }
}

pub struct TestApp {
    pub resources: AppResources,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(create_test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = create_test_db().await;
        let mailer = Arc::new(RecordingMailer::default());
        let resources = AppResources::new(Arc::new(db), mailer.clone(), Arc::new(config));
        Self { resources, mailer }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(app(self.resources.clone())).expect("test server")
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.resources.db.as_ref()
    }

    pub async fn politician(&self, name: &str, identifier: &str, current_member: bool) -> politician::Model {
        politician::ActiveModel {
            name: Set(name.into()),
            identifier: Set(identifier.into()),
            current_member: Set(current_member),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert politician")
    }

    pub async fn hansard(&self, date: Date) -> hansard::Model {
        hansard::ActiveModel {
            date: Set(date),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert hansard")
    }

    pub async fn statement(
        &self,
        hansard_id: i32,
        politician_id: Option<i32>,
        sequence: i32,
        topic: &str,
    ) -> statement::Model {
        statement::ActiveModel {
            hansard_id: Set(hansard_id),
            politician_id: Set(politician_id),
            sequence: Set(sequence),
            topic: Set(topic.into()),
            content: Set(format!("Remarks on {topic}")),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert statement")
    }

    pub async fn politician_alert(&self, politician_id: i32, email: &str) -> politician_alert::Model {
        politician_alert::ActiveModel {
            politician_id: Set(politician_id),
            email: Set(email.into()),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert politician alert")
    }
}

/// Header the upstream auth layer sets for a signed-in visitor.
pub fn signed_in(email: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(AUTHENTICATED_EMAIL_HEADER),
        HeaderValue::from_str(email).expect("header value"),
    )
}
