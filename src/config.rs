use std::{path::Path, time::Duration};

use axum::{
    Extension, Router,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::{
    api::{brackets, matches, participants, schedule, venues},
    state::{ConnectionOptions, DbPool},
    tournaments::matches::validate::FanOutPolicy,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    pub log_level: String,
    pub fan_out: FanOutPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: ":memory:".to_string(),
            bind_addr: "127.0.0.1:8000".to_string(),
            pool_size: 10,
            busy_timeout_ms: 5000,
            log_level: "info".to_string(),
            fan_out: FanOutPolicy::All,
        }
    }
}

impl Settings {
    /// Reads the TOML file (if any), then applies `DATABASE_URL`, `BIND_ADDR`
    /// and `LOG_LEVEL` from the environment.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::Read {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                Settings::from_toml(&text)?
            }
            None => Settings::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml(text: &str) -> Result<Settings, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Settings, ConfigError> {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        self.tracing_level()?;
        Ok(self)
    }

    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level.parse().map_err(|_| ConfigError::Invalid {
            key: "log_level",
            reason: format!("`{}` is not a log level", self.log_level),
        })
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

pub fn create_app(pool: DbPool, fan_out: FanOutPolicy) -> Router {
    Router::new()
        .route(
            "/regions",
            post(participants::create_region).get(participants::list_regions),
        )
        .route("/regions/:id/teams", get(participants::region_teams))
        .route(
            "/teams",
            post(participants::create_team).get(participants::list_teams),
        )
        .route("/teams/:id", axum::routing::delete(participants::delete_team))
        .route("/teams/:id/matches", get(participants::team_matches))
        .route("/rooms", post(venues::create_room).get(venues::list_rooms))
        .route("/rooms/:id/matches", get(venues::room_matches))
        .route(
            "/timeslots",
            post(venues::create_timeslot).get(venues::list_timeslots),
        )
        .route("/timeslots/generate", post(venues::generate_timeslots))
        .route(
            "/brackets",
            post(brackets::create_bracket).get(brackets::list_brackets),
        )
        .route("/brackets/:id", get(brackets::view_bracket))
        .route("/brackets/:id/rounds", post(brackets::create_round))
        .route(
            "/matches",
            post(matches::create_match).get(matches::list_matches),
        )
        .route("/matches/ready", get(matches::ready_matches))
        .route(
            "/matches/:id",
            get(matches::get_match)
                .put(matches::update_match)
                .delete(matches::delete_match),
        )
        .route(
            "/matches/:id/result",
            put(matches::set_result).delete(matches::clear_result),
        )
        .route("/matches/:id/slots/:side", get(matches::resolve_slot))
        .route(
            "/matches/:id/schedule",
            put(schedule::assign).delete(schedule::unassign),
        )
        .route("/schedule/available", get(schedule::available))
        .layer(Extension(pool))
        .layer(Extension(fan_out))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults() {
        let settings = Settings::from_toml(
            r#"
            database_url = "bracket.db"
            fan_out = "exclusive"
            "#,
        )
        .unwrap();
        assert_eq!(settings.database_url, "bracket.db");
        assert_eq!(settings.fan_out, FanOutPolicy::Exclusive);
        assert_eq!(settings.pool_size, 10);
        assert_eq!(settings.bind_addr, "127.0.0.1:8000");
    }

    #[test]
    fn environment_wins_over_file() {
        let settings = Settings::from_toml(r#"log_level = "debug""#)
            .unwrap()
            .with_overrides(|key| match key {
                "DATABASE_URL" => Some("other.db".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.database_url, "other.db");
        assert_eq!(settings.tracing_level().unwrap(), tracing::Level::DEBUG);
    }

    #[test]
    fn rejects_unknown_keys_and_levels() {
        assert!(Settings::from_toml("colour = 1").is_err());
        assert!(matches!(
            Settings::default().with_overrides(|key| {
                (key == "LOG_LEVEL").then(|| "loud".to_string())
            }),
            Err(ConfigError::Invalid { key: "log_level", .. })
        ));
    }
}
