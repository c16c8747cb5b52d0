//! Audible alert sinks

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Sink failures; reported, never fatal to monitoring
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Alarm sound not found: {0}")]
    MissingSound(PathBuf),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Device that can sound the cabin alarm
pub trait AudibleAlert: Send + Sync {
    fn play(&self) -> Result<(), SinkError>;
    fn stop(&self) -> Result<(), SinkError>;
}

/// Alarm that only logs; for headless deployments and development
#[derive(Debug, Default)]
pub struct SilentAlarm;

impl AudibleAlert for SilentAlarm {
    fn play(&self) -> Result<(), SinkError> {
        info!("Alarm on");
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        debug!("Alarm off");
        Ok(())
    }
}

/// External player invocation, e.g. `aplay -q alert.wav`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandAlarmConfig {
    pub player: String,
    pub args: Vec<String>,
    pub sound_path: PathBuf,
}

impl Default for CommandAlarmConfig {
    fn default() -> Self {
        Self {
            player: "aplay".to_string(),
            args: vec!["-q".to_string()],
            sound_path: PathBuf::from("alert.wav"),
        }
    }
}

/// Plays the alarm file through an external player process
pub struct CommandAlarm {
    config: CommandAlarmConfig,
    child: Mutex<Option<Child>>,
}

impl CommandAlarm {
    pub fn new(config: CommandAlarmConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
        }
    }

    fn kill(child: &mut Child) -> Result<(), SinkError> {
        // Already-exited players are fine; just reap them
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        child.wait()?;
        Ok(())
    }
}

impl AudibleAlert for CommandAlarm {
    fn play(&self) -> Result<(), SinkError> {
        if !self.config.sound_path.exists() {
            return Err(SinkError::MissingSound(self.config.sound_path.clone()));
        }

        let mut slot = self
            .child
            .lock()
            .map_err(|e| SinkError::Playback(format!("Lock error: {}", e)))?;

        // Restart rather than overlap
        if let Some(mut previous) = slot.take() {
            Self::kill(&mut previous)?;
        }

        let child = Command::new(&self.config.player)
            .args(&self.config.args)
            .arg(&self.config.sound_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SinkError::Playback(format!("{}: {}", self.config.player, e)))?;

        debug!("Alarm player started (pid {})", child.id());
        *slot = Some(child);
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        let mut slot = self
            .child
            .lock()
            .map_err(|e| SinkError::Playback(format!("Lock error: {}", e)))?;
        match slot.take() {
            Some(mut child) => Self::kill(&mut child),
            None => Ok(()),
        }
    }
}

impl Drop for CommandAlarm {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sound_file() {
        let alarm = CommandAlarm::new(CommandAlarmConfig {
            sound_path: PathBuf::from("/nonexistent/alert.wav"),
            ..Default::default()
        });
        assert!(matches!(alarm.play(), Err(SinkError::MissingSound(_))));
        assert!(alarm.stop().is_ok());
    }

    #[test]
    fn test_missing_player_binary() {
        let path = std::env::temp_dir().join("driver-watch-sink-test.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let alarm = CommandAlarm::new(CommandAlarmConfig {
            player: "definitely-not-a-player-binary".to_string(),
            args: vec![],
            sound_path: path.clone(),
        });
        assert!(matches!(alarm.play(), Err(SinkError::Playback(_))));

        let _ = std::fs::remove_file(path);
    }

    #[cfg(unix)]
    #[test]
    fn test_play_then_stop_kills_player() {
        let path = std::env::temp_dir().join("driver-watch-sink-stop.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        // `sleep 30 <file>` stands in for a long-running player
        let alarm = CommandAlarm::new(CommandAlarmConfig {
            player: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            sound_path: path.clone(),
        });
        alarm.play().unwrap();
        alarm.play().unwrap();
        alarm.stop().unwrap();
        assert!(alarm.child.lock().unwrap().is_none());

        let _ = std::fs::remove_file(path);
    }
}
