use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, RetubeError};

/// Abstract yt-dlp invocation representation
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl YtDlpCommand {
    /// Create a new downloader command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Suppress progress output
    pub fn quiet(self) -> Self {
        self.arg("--quiet")
    }

    /// List playlist entries without resolving each video
    pub fn flat_playlist(self) -> Self {
        self.arg("--flat-playlist")
    }

    /// Print one JSON object per entry to stdout
    pub fn dump_json(self) -> Self {
        self.arg("--dump-json")
    }

    /// Write the `<id>.info.json` sidecar next to the media file
    pub fn write_info_json(self) -> Self {
        self.arg("--write-info-json")
    }

    /// Write the thumbnail image next to the media file
    pub fn write_thumbnail(self) -> Self {
        self.arg("--write-thumbnail")
    }

    /// Remux/merge the final download into the given container
    pub fn merge_output_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("--merge-output-format").arg(format)
    }

    /// Set the output filename template
    pub fn output_template<P: AsRef<Path>>(self, template: P) -> Self {
        self.arg("-o").arg(template.as_ref().to_string_lossy().to_string())
    }

    /// Never descend into playlists linked from the target URL
    pub fn no_playlist(self) -> Self {
        self.arg("--no-playlist")
    }

    /// Target URL, always the final argument
    pub fn url<S: Into<String>>(self, url: S) -> Self {
        self.arg(url)
    }

    /// Execute the command and return captured stdout
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing downloader command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args);

        let output = cmd.output()
            .await
            .map_err(|e| RetubeError::Download(format!("Failed to execute downloader: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RetubeError::Download(format!(
                "{} failed: {}",
                self.description,
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_argument_order() {
        let cmd = YtDlpCommand::new("yt-dlp", "Channel listing")
            .quiet()
            .flat_playlist()
            .dump_json()
            .url("https://www.youtube.com/@example");

        assert_eq!(
            cmd.args,
            vec![
                "--quiet",
                "--flat-playlist",
                "--dump-json",
                "https://www.youtube.com/@example"
            ]
        );
    }

    #[test]
    fn test_fetch_command_shape() {
        let cmd = YtDlpCommand::new("yt-dlp", "Video fetch")
            .write_info_json()
            .write_thumbnail()
            .merge_output_format("mp4")
            .output_template("downloads/%(id)s.%(ext)s")
            .no_playlist()
            .url("https://youtu.be/abc");

        assert!(cmd.args.contains(&"--write-info-json".to_string()));
        assert!(cmd.args.contains(&"--merge-output-format".to_string()));
        assert_eq!(cmd.args.last().unwrap(), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let cmd = YtDlpCommand::new("echo", "Echo stdout").arg("hello");
        let stdout = cmd.execute().await.unwrap();
        assert_eq!(stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_reports_nonzero_exit() {
        let cmd = YtDlpCommand::new("false", "Failing command");
        assert!(matches!(cmd.execute().await, Err(RetubeError::Download(_))));
    }
}
