use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Copy the current experiment file path and report the outcome in `state.info`.
pub fn copy_current_path(state: &mut UiState) {
    let Some(path) = state.current_path.as_ref() else {
        state.info = "No experiment file yet. Press Ctrl-N to start one.".into();
        return;
    };
    let path = path.to_string_lossy().to_string();
    match copy_to_clipboard(&path) {
        Ok(()) => {
            let display_path = if path.chars().count() > 60 {
                let head: String = path.chars().take(57).collect();
                format!("{head}...")
            } else {
                path
            };
            state.info = format!("✓ Copied to clipboard: {display_path}");
        }
        Err(e) => {
            state.info = format!("Clipboard copy failed: {e:#}");
        }
    }
}

/// Open the storage directory in the system file browser.
pub fn open_storage_dir(state: &mut UiState) {
    match crate::storage::open_in_file_browser(&state.storage_dir) {
        Ok(()) => {
            tracing::info!(dir = %state.storage_dir.display(), "opened storage directory");
            state.info = format!("Opened {}", state.storage_dir.display());
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "failed to open storage directory");
            state.info = format!("Open failed: {e:#}");
        }
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// Each clipboard instance is kept alive for a while so clipboard managers
/// on Linux get a chance to read it.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue text for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
