use crate::session::ScanControls;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a single key press does to the entry line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Keep editing
    Continue,
    /// Enter with a non-empty line
    Submit(String),
    /// Esc, `q` on an empty line, or Ctrl-C
    Cancel,
}

/// Line editor state for manual pass entry
#[derive(Debug, Default)]
pub struct EntryLine {
    buffer: String,
}

impl EntryLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Cancel,
            KeyCode::Esc => KeyAction::Cancel,
            KeyCode::Char('q') if self.buffer.is_empty() => KeyAction::Cancel,
            KeyCode::Enter => {
                let line = self.buffer.trim().to_string();
                self.buffer.clear();
                if line.is_empty() {
                    KeyAction::Continue
                } else {
                    KeyAction::Submit(line)
                }
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                KeyAction::Continue
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                KeyAction::Continue
            }
            other => {
                debug!("Key ignored: {:?}", other);
                KeyAction::Continue
            }
        }
    }
}

/// Terminal prompt that feeds typed passes into a running scan
pub struct ManualEntryPrompt {
    controls: ScanControls,
    cancellation_token: CancellationToken,
}

impl ManualEntryPrompt {
    pub fn new(controls: ScanControls) -> Self {
        Self {
            controls,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start reading keys on a blocking thread
    pub fn start(&self) -> JoinHandle<()> {
        info!("Manual entry active - type a pass and press Enter, Esc to cancel");

        let controls = self.controls.clone();
        let scan_token = controls.cancellation_token();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for manual entry: {}", e);
                return;
            }

            let mut line = EntryLine::new();
            redraw(line.as_str());

            loop {
                if cancellation_token.is_cancelled() || scan_token.is_cancelled() {
                    debug!("Manual entry stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key)) = event::read() else {
                            continue;
                        };
                        match line.handle_key(key) {
                            KeyAction::Continue => redraw(line.as_str()),
                            KeyAction::Submit(text) => {
                                info!("Manual pass entered");
                                if !controls.try_submit_manual(text) {
                                    warn!("Scan is no longer accepting manual entry");
                                    break;
                                }
                                redraw(line.as_str());
                            }
                            KeyAction::Cancel => {
                                info!("Scan cancelled from keyboard");
                                controls.cancel();
                                break;
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            eprint!("\r\n");
            debug!("Manual entry task exited");
        })
    }

    /// Stop reading keys and restore the terminal
    pub async fn stop(&self, handle: JoinHandle<()>) {
        self.cancellation_token.cancel();
        if let Err(e) = handle.await {
            warn!("Manual entry task failed: {}", e);
        }
        let _ = disable_raw_mode();
    }
}

fn redraw(line: &str) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r\x1b[2KPass: {}", line);
    let _ = stderr.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_and_submit() {
        let mut line = EntryLine::new();
        for c in "visitor-1x".chars() {
            assert_eq!(line.handle_key(press(KeyCode::Char(c))), KeyAction::Continue);
        }
        line.handle_key(press(KeyCode::Backspace));
        assert_eq!(line.as_str(), "visitor-1");

        assert_eq!(
            line.handle_key(press(KeyCode::Enter)),
            KeyAction::Submit("visitor-1".to_string())
        );
        assert_eq!(line.as_str(), "");
    }

    #[test]
    fn test_empty_enter_is_ignored() {
        let mut line = EntryLine::new();
        line.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(line.handle_key(press(KeyCode::Enter)), KeyAction::Continue);
    }

    #[test]
    fn test_cancel_keys() {
        let mut line = EntryLine::new();
        assert_eq!(line.handle_key(press(KeyCode::Esc)), KeyAction::Cancel);
        assert_eq!(line.handle_key(press(KeyCode::Char('q'))), KeyAction::Cancel);
        assert_eq!(
            line.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Cancel
        );

        // `q` is an ordinary character once something is typed
        line.handle_key(press(KeyCode::Char('a')));
        assert_eq!(line.handle_key(press(KeyCode::Char('q'))), KeyAction::Continue);
        assert_eq!(line.as_str(), "aq");
    }

    #[tokio::test]
    async fn test_prompt_stop() {
        let (controls, _inputs) = ScanControls::pair();
        let prompt = ManualEntryPrompt::new(controls);
        assert!(!prompt.cancellation_token.is_cancelled());
        prompt.cancellation_token.cancel();
        assert!(prompt.cancellation_token.is_cancelled());
    }
}
