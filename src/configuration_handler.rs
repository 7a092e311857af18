use crate::configuration::Configuration;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Appointment booking service")]
pub struct ConfigurationHandler {
    #[arg(long, env = "PORT", default_value = "3333")]
    port: String,

    /// Without a database url appointments are kept in memory only
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "APP_SECRET", hide_env_values = true)]
    app_secret: String,

    #[arg(long, env = "FILES_URL", default_value = "http://localhost:3333/files")]
    files_url: String,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn app_secret(&self) -> String {
        self.app_secret.clone()
    }

    fn files_url(&self) -> String {
        self.files_url.clone()
    }
}
