use crate::{auth::Claims, clock::Clock, configuration::Configuration};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TestConfiguration {
    pub app_secret: String,
    pub files_url: String,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            app_secret: "test secret".into(),
            files_url: "http://localhost:3333/files".into(),
        }
    }
}

impl Configuration for TestConfiguration {
    fn port(&self) -> String {
        "0".into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn app_secret(&self) -> String {
        self.app_secret.clone()
    }

    fn files_url(&self) -> String {
        self.files_url.clone()
    }
}

pub fn create_token(user_id: i32, secret: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::days(7)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
