use std::{
    env, fs,
    num::NonZeroUsize,
    ops::Deref,
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;

use crate::{
    dao::DataBase, error::Error, provider::WebPush, types::Urgency,
};

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub database: DataBase,
    pub push: Arc<WebPush>,
}

impl State {
    pub fn new(config: Config, database: DataBase, push: WebPush) -> State {
        State {
            config,
            database,
            push: Arc::new(push),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub data_directory: PathBuf,
    pub default_notification_url: String,
    pub fanout_limit: NonZeroUsize,
    pub delivery_attempts: u32,
    pub delivery_backoff_ms: u64,
    pub delivery_timeout: Duration,
    pub broadcast_deadline: Duration,
    pub push_ttl: i64,
    pub push_urgency: Urgency,
    pub status_code_to_delete: Vec<u16>,
    pub mail_to: String,
    pub vapid_private_key: Vec<u8>,
    pub vapid_public_key: Vec<u8>,
}

pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";

    let directory = env!("CARGO_MANIFEST_DIR");
    let path = format!("{}/{}", directory, config_file);

    match fs::read_to_string(path) {
        Ok(config_string) => {
            parse_config_string(config_string);
            Ok(())
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_config_string(config: String) {
    let params: Vec<Option<(&str, &str)>> = config
        .split('\n')
        .map(|s| {
            let element = s.find('=');
            if let Some(e) = element {
                return Some(s.split_at(e));
            }
            None
        })
        .map(|value| {
            if let Some((k, v)) = value {
                return Some((k, &v[1..]));
            }
            None
        })
        .collect();

    for (key, value) in params.into_iter().flatten() {
        if key.starts_with('#') {
            continue;
        }
        env::set_var(key, value);
    }
}

fn parse_config_vapid_keys() -> Result<(Vec<u8>, Vec<u8>), Error> {
    let directory = env!("CARGO_MANIFEST_DIR");
    let cert_directory = env::var("CERT_DIRECTORY")?;

    let private_key_dir =
        format!("{}/{}/vapid_private.pem", directory, cert_directory);
    let public_key_dir =
        format!("{}/{}/vapid_public.b64", directory, cert_directory);

    let private_key = fs::read(&private_key_dir)
        .with_context(|| format!("reading {}", private_key_dir))?;
    let public_key = fs::read(&public_key_dir)
        .with_context(|| format!("reading {}", public_key_dir))?;

    Ok((private_key, public_key))
}

pub fn get_configuration() -> Result<Config, Error> {
    let server_host = env::var("SERVER_HOST")?;
    let port: u16 = env::var("PORT")?.parse()?;
    let allowed_origins = env::var("ALLOWED_ORIGINS")?
        .split(',')
        .map(|item| item.to_owned())
        .collect::<Vec<String>>();
    let data_directory = PathBuf::from(env::var("DATA_DIRECTORY")?);
    let default_notification_url = env::var("DEFAULT_NOTIFICATION_URL")?;
    let mail_to = env::var("MAIL_TO")?;

    let fanout_limit =
        NonZeroUsize::new(env::var("FANOUT_LIMIT")?.parse()?).ok_or_else(
            || {
                Error::ConfigurationError(String::from(
                    "FANOUT_LIMIT must be greater than zero",
                ))
            },
        )?;
    let delivery_attempts: u32 = env::var("DELIVERY_ATTEMPTS")?.parse()?;
    if delivery_attempts == 0 {
        return Err(Error::ConfigurationError(String::from(
            "DELIVERY_ATTEMPTS must be at least 1",
        )));
    }
    let delivery_backoff_ms: u64 =
        env::var("DELIVERY_BACKOFF_MS")?.parse()?;
    let delivery_timeout = Duration::from_secs(
        env::var("DELIVERY_TIMEOUT_SECONDS")?.parse()?,
    );
    let broadcast_deadline = Duration::from_secs(
        env::var("BROADCAST_DEADLINE_SECONDS")?.parse()?,
    );

    let push_ttl: i64 = env::var("PUSH_TTL")?.parse()?;
    let push_urgency = Urgency::from_str(&env::var("PUSH_URGENCY")?)?;

    let codes = env::var("STATUS_CODE_TO_DELETE")?
        .split(',')
        .map(|item| item.to_string())
        .collect::<Vec<String>>();
    let mut status_code_to_delete = vec![];
    for code in codes {
        status_code_to_delete.push(code.trim().parse::<u16>()?);
    }

    let (vapid_private_key, vapid_public_key) = parse_config_vapid_keys()?;

    let config = Config {
        server_host,
        port,
        allowed_origins,
        data_directory,
        default_notification_url,
        fanout_limit,
        delivery_attempts,
        delivery_backoff_ms,
        delivery_timeout,
        broadcast_deadline,
        push_ttl,
        push_urgency,
        status_code_to_delete,
        mail_to,
        vapid_private_key,
        vapid_public_key,
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_lines_and_skips_comments() {
        parse_config_string(String::from(
            "RELAY_TEST_KEY=https://push.example/?a=b\n# RELAY_TEST_COMMENT=nope\n\nRELAY_TEST_OTHER=1",
        ));

        assert_eq!(
            env::var("RELAY_TEST_KEY").unwrap(),
            "https://push.example/?a=b"
        );
        assert_eq!(env::var("RELAY_TEST_OTHER").unwrap(), "1");
        assert!(env::var("RELAY_TEST_COMMENT").is_err());
    }
}
