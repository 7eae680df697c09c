/// Configuration management
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Id of the signed-in user (the credential store's answer)
    pub current_user_id: Option<String>,

    /// Bound of the queue shared by both subscriptions
    pub queue_capacity: usize,

    /// JSON-lines file of deliveries to replay
    pub replay_path: Option<PathBuf>,

    /// Print avatar payload sizes next to each conversation
    pub show_avatars: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_user_id: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_path: None,
            show_avatars: false,
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        Self::from_args_with_env(args, |key| std::env::var(key).ok())
    }

    /// Same as `from_args`, reading `CONVSYNC_*` overrides through `env`
    pub fn from_args_with_env(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let usage = || {
            SyncError::Config(format!(
                "Usage: {} <user-id> [--replay <path>] [--queue <n>] [--show-avatars]",
                args.first().map(String::as_str).unwrap_or("convsync")
            ))
        };

        let mut current_user_id: Option<String> = None;
        let mut replay_path: Option<PathBuf> = None;
        let mut queue_capacity: Option<usize> = None;
        let mut show_avatars = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--replay" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--replay requires a path argument".to_string())
                    })?;
                    replay_path = Some(PathBuf::from(path));
                    i += 2;
                }
                "--queue" => {
                    let n = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--queue requires a number argument".to_string())
                    })?;
                    queue_capacity = Some(n.parse::<usize>().map_err(|_| {
                        SyncError::Config("--queue must be a positive number".to_string())
                    })?);
                    i += 2;
                }
                "--show-avatars" => {
                    show_avatars = true;
                    i += 1;
                }
                flag if flag.starts_with("--") => {
                    return Err(SyncError::Config(format!("Unknown flag: {}", flag)));
                }
                other => {
                    if current_user_id.is_some() {
                        return Err(usage());
                    }
                    current_user_id = Some(other.to_string());
                    i += 1;
                }
            }
        }

        // Env overrides
        if let Some(id) = env("CONVSYNC_USER_ID") {
            if !id.is_empty() {
                current_user_id = Some(id);
            }
        }
        if let Some(n) = env("CONVSYNC_QUEUE_CAPACITY").and_then(|s| s.parse::<usize>().ok())
        {
            queue_capacity = Some(n);
        }

        let config = Self {
            current_user_id: Some(current_user_id.ok_or_else(usage)?),
            replay_path,
            queue_capacity: queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            show_avatars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(SyncError::Config(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        match self.current_user_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(()),
            _ => Err(SyncError::Config("current user id is required".to_string())),
        }
    }
}
