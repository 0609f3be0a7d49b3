//! Locating and launching a Chromium-based browser with remote
//! debugging enabled.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::BrowserError;

/// Launch options for the automation browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Remote debugging port.
    pub debug_port: u16,
    pub headless: bool,
    /// Profile directory for persistent login state.
    pub profile_dir: PathBuf,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            debug_port: 9222,
            headless: false,
            profile_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".autologin")
                .join("browser-profile"),
        }
    }
}

impl BrowserOptions {
    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }
}

/// Find a Chromium-based browser executable on this system.
pub fn find_chromium() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let paths = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let paths = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Check whether a browser is already listening on the debug port.
pub(crate) async fn is_browser_running(options: &BrowserOptions) -> bool {
    reqwest::get(format!("{}/json/version", options.endpoint()))
        .await
        .is_ok()
}

/// Launch the browser and wait for the debugging endpoint to come up.
pub(crate) async fn launch(options: &BrowserOptions) -> Result<Child, BrowserError> {
    let browser_path = find_chromium().ok_or(BrowserError::BrowserNotFound)?;

    if let Err(e) = std::fs::create_dir_all(&options.profile_dir) {
        warn!("Failed to create profile directory: {}", e);
    }

    info!(
        "Launching browser with profile at: {}",
        options.profile_dir.display()
    );

    let mut cmd = Command::new(&browser_path);
    cmd.arg(format!("--remote-debugging-port={}", options.debug_port))
        .arg(format!("--user-data-dir={}", options.profile_dir.display()))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--metrics-recording-only")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if options.headless {
        cmd.arg("--headless=new");
    }

    let child = cmd
        .spawn()
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

    info!("Browser launched with PID: {:?}", child.id());

    // 30 * 200ms = 6 seconds
    let mut attempts = 0;
    while attempts < 30 {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        if is_browser_running(options).await {
            return Ok(child);
        }
        attempts += 1;
    }

    Err(BrowserError::LaunchFailed(
        "Browser failed to start within timeout".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = BrowserOptions::default();
        assert_eq!(options.debug_port, 9222);
        assert!(!options.headless);
        assert!(options.profile_dir.ends_with(".autologin/browser-profile"));
    }

    #[test]
    fn endpoint_format() {
        let options = BrowserOptions {
            debug_port: 9333,
            ..Default::default()
        };
        assert_eq!(options.endpoint(), "http://localhost:9333");
    }

    #[test]
    fn find_chromium_does_not_panic() {
        let _ = find_chromium();
    }
}
