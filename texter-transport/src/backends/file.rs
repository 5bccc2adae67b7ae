use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use texter_common::{
    Message, Response, Result, Settings, Transport, TransportError, check_delivery_params,
    outgoing,
};
use tokio::io::AsyncWriteExt;

use crate::registry::TransportType;

/// Settings for [`FileTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSettings {
    /// Directory the per-recipient files are written to. Created if missing.
    pub location: PathBuf,
    /// Hand back the list of written files from unchecked deliveries.
    pub return_response: bool,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            location: std::env::temp_dir().join("texts"),
            return_response: false,
        }
    }
}

/// Appends every delivered body to one plain-text file per recipient.
///
/// Each delivery adds the body followed by `\r\n`. Files are named after the
/// final path component of the recipient, so a recipient can never escape
/// the configured directory.
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    settings: FileSettings,
}

impl FileTransport {
    pub const NAME: &'static str = "file";

    #[must_use]
    pub const fn new(settings: FileSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &FileSettings {
        &self.settings
    }

    /// The settings the `file` method is registered with.
    #[must_use]
    pub fn default_settings() -> Settings {
        match serde_json::to_value(FileSettings::default()) {
            Ok(serde_json::Value::Object(settings)) => settings,
            _ => Settings::new(),
        }
    }

    /// Where messages for `recipient` are written.
    #[must_use]
    pub fn path_for(&self, recipient: &str) -> PathBuf {
        self.settings.location.join(file_name(recipient))
    }
}

fn file_name(recipient: &str) -> String {
    let name = Path::new(recipient)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name: String = name
        .chars()
        .map(|c| if c == '\\' || c.is_control() { '_' } else { c })
        .collect();

    if name.is_empty() { "_".to_string() } else { name }
}

#[async_trait]
impl Transport for FileTransport {
    async fn deliver(&self, message: &Message) -> Result<Response> {
        let (recipients, body) = check_delivery_params(message)?;

        tokio::fs::create_dir_all(&self.settings.location)
            .await
            .map_err(TransportError::Io)?;

        let mut written = Vec::with_capacity(recipients.len());
        for recipient in &recipients {
            let path = self.path_for(recipient);
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(TransportError::Io)?;

            file.write_all(format!("{body}\r\n").as_bytes())
                .await
                .map_err(TransportError::Io)?;
            file.flush().await.map_err(TransportError::Io)?;

            outgoing!(
                level = DEBUG,
                "Appended text for {recipient} to {}",
                path.display()
            );
            written.push(path.display().to_string());
        }

        Ok(json!({ "files": written }))
    }

    fn return_response(&self) -> bool {
        self.settings.return_response
    }
}

impl TransportType for FileTransport {
    type Settings = FileSettings;

    fn from_settings(settings: Self::Settings) -> Result<Self> {
        Ok(Self::new(settings))
    }
}
