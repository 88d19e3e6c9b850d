// ABOUTME: Terminal capability detection for graphics protocol selection
// ABOUTME: Ranks Kitty, Sixel, half-block and ASCII support from environment signals

use super::GraphicsProtocol;
use crate::constants::env as env_names;
use parking_lot::RwLock;
use std::env;

const KITTY_TERMS: &[&str] = &["kitty", "ghostty", "wezterm"];
const KITTY_PROGRAMS: &[&str] = &["kitty", "ghostty", "WezTerm"];

const SIXEL_TERMINALS: &[&str] = &[
    "foot",
    "mlterm",
    "mintty",
    "contour",
    "yaft",
    "iTerm.app",
    "xterm-sixel",
    "konsole",
];

const TRUECOLOR_PROGRAMS: &[&str] = &[
    "vscode",
    "Apple_Terminal",
    "Hyper",
    "Tabby",
    "Alacritty",
    "Warp",
];

/// Snapshot of the environment variables detection looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalEnv {
    pub term: String,
    pub term_program: String,
    pub colorterm: String,
    pub kitty_window_id: Option<String>,
    pub wezterm_executable: Option<String>,
    pub forced_protocol: Option<String>,
}

impl TerminalEnv {
    pub fn from_env() -> Self {
        Self {
            term: env::var("TERM").unwrap_or_default(),
            term_program: env::var("TERM_PROGRAM").unwrap_or_default(),
            colorterm: env::var("COLORTERM").unwrap_or_default(),
            kitty_window_id: env::var("KITTY_WINDOW_ID").ok(),
            wezterm_executable: env::var("WEZTERM_EXECUTABLE").ok(),
            forced_protocol: env::var(env_names::FORCE_PROTOCOL).ok(),
        }
    }

    pub fn terminal_name(&self) -> String {
        if !self.term_program.is_empty() {
            self.term_program.clone()
        } else if !self.term.is_empty() {
            self.term.clone()
        } else {
            "unknown".to_string()
        }
    }
}

/// Pick the best protocol for `env`, first match wins
pub fn detect_protocol(env: &TerminalEnv) -> GraphicsProtocol {
    if let Some(forced) = env.forced_protocol.as_deref() {
        match forced.parse::<GraphicsProtocol>() {
            Ok(protocol) => return protocol,
            Err(_) => log::warn!(
                "Unknown protocol '{}' in {}. Valid values: kitty, sixel, halfblock, ascii",
                forced,
                env_names::FORCE_PROTOCOL
            ),
        }
    }

    if detect_kitty_support(env) {
        GraphicsProtocol::Kitty
    } else if detect_sixel_support(env) {
        GraphicsProtocol::Sixel
    } else if detect_truecolor_support(env) {
        GraphicsProtocol::HalfBlock
    } else {
        GraphicsProtocol::Ascii
    }
}

fn detect_kitty_support(env: &TerminalEnv) -> bool {
    // Session markers are the most reliable signal
    if env.kitty_window_id.is_some() || env.wezterm_executable.is_some() {
        return true;
    }

    if KITTY_PROGRAMS.contains(&env.term_program.as_str()) {
        return true;
    }

    let term = env.term.to_lowercase();
    KITTY_TERMS.iter().any(|pattern| term.contains(pattern))
}

fn detect_sixel_support(env: &TerminalEnv) -> bool {
    if SIXEL_TERMINALS.contains(&env.term_program.as_str()) {
        return true;
    }

    SIXEL_TERMINALS.iter().any(|name| {
        env.term.eq_ignore_ascii_case(name) || env.term.starts_with(&format!("{}-", name))
    })
}

fn detect_truecolor_support(env: &TerminalEnv) -> bool {
    let colorterm = env.colorterm.to_lowercase();
    if colorterm == "truecolor" || colorterm == "24bit" {
        return true;
    }

    TRUECOLOR_PROGRAMS.contains(&env.term_program.as_str())
}

/// Detects once, then serves the memoized result until forced or reset.
///
/// Owned by whoever needs it; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct CapabilityDetector {
    cached: RwLock<Option<GraphicsProtocol>>,
    snapshot: Option<TerminalEnv>,
}

impl CapabilityDetector {
    /// Detector that reads the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that reads a fixed snapshot instead of the process environment
    pub fn with_env(snapshot: TerminalEnv) -> Self {
        Self {
            cached: RwLock::new(None),
            snapshot: Some(snapshot),
        }
    }

    pub fn detect(&self) -> GraphicsProtocol {
        if let Some(protocol) = *self.cached.read() {
            return protocol;
        }

        let mut cached = self.cached.write();
        // Another caller may have filled it while we waited for the lock
        if let Some(protocol) = *cached {
            return protocol;
        }

        let env = match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => TerminalEnv::from_env(),
        };
        let protocol = detect_protocol(&env);
        log::debug!(
            "Detected {} graphics for terminal {}",
            protocol,
            env.terminal_name()
        );

        *cached = Some(protocol);
        protocol
    }

    /// Override the memoized protocol
    pub fn force(&self, protocol: GraphicsProtocol) {
        *self.cached.write() = Some(protocol);
    }

    /// Forget the memoized protocol so the next `detect` re-reads the environment
    pub fn reset(&self) {
        *self.cached.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn env_with(term: &str, term_program: &str, colorterm: &str) -> TerminalEnv {
        TerminalEnv {
            term: term.to_string(),
            term_program: term_program.to_string(),
            colorterm: colorterm.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_kitty_detection() {
        assert_eq!(
            detect_protocol(&env_with("xterm-kitty", "", "")),
            GraphicsProtocol::Kitty
        );
        assert_eq!(
            detect_protocol(&env_with("xterm-256color", "ghostty", "truecolor")),
            GraphicsProtocol::Kitty
        );

        let marker = TerminalEnv {
            kitty_window_id: Some("1".to_string()),
            ..Default::default()
        };
        assert_eq!(detect_protocol(&marker), GraphicsProtocol::Kitty);
    }

    #[test]
    fn test_sixel_detection() {
        assert_eq!(
            detect_protocol(&env_with("foot", "", "")),
            GraphicsProtocol::Sixel
        );
        assert_eq!(
            detect_protocol(&env_with("xterm-256color", "iTerm.app", "truecolor")),
            GraphicsProtocol::Sixel
        );
        assert_eq!(
            detect_protocol(&env_with("mlterm-256color", "", "")),
            GraphicsProtocol::Sixel
        );
    }

    #[test]
    fn test_truecolor_detection() {
        assert_eq!(
            detect_protocol(&env_with("xterm-256color", "", "truecolor")),
            GraphicsProtocol::HalfBlock
        );
        assert_eq!(
            detect_protocol(&env_with("xterm-256color", "vscode", "")),
            GraphicsProtocol::HalfBlock
        );
    }

    #[test]
    fn test_fallback_detection() {
        assert_eq!(
            detect_protocol(&env_with("dumb", "", "")),
            GraphicsProtocol::Ascii
        );
        assert_eq!(detect_protocol(&TerminalEnv::default()), GraphicsProtocol::Ascii);
    }

    #[test]
    fn test_forced_protocol() {
        let mut env = env_with("xterm-kitty", "kitty", "truecolor");
        env.forced_protocol = Some("ascii".to_string());
        assert_eq!(detect_protocol(&env), GraphicsProtocol::Ascii);

        // Unknown override falls through to detection
        env.forced_protocol = Some("vt340".to_string());
        assert_eq!(detect_protocol(&env), GraphicsProtocol::Kitty);
    }

    #[test]
    fn test_terminal_name() {
        assert_eq!(env_with("xterm", "WezTerm", "").terminal_name(), "WezTerm");
        assert_eq!(env_with("xterm", "", "").terminal_name(), "xterm");
        assert_eq!(TerminalEnv::default().terminal_name(), "unknown");
    }

    #[test]
    fn test_detector_memoizes_and_forces() {
        let detector = CapabilityDetector::with_env(env_with("foot", "", ""));
        assert_eq!(detector.detect(), GraphicsProtocol::Sixel);

        detector.force(GraphicsProtocol::HalfBlock);
        assert_eq!(detector.detect(), GraphicsProtocol::HalfBlock);

        detector.reset();
        assert_eq!(detector.detect(), GraphicsProtocol::Sixel);
    }

    #[test]
    #[serial]
    fn test_detector_reads_process_env() {
        let original_force = env::var(env_names::FORCE_PROTOCOL).ok();

        unsafe {
            env::set_var(env_names::FORCE_PROTOCOL, "kitty");
        }
        let detector = CapabilityDetector::new();
        assert_eq!(detector.detect(), GraphicsProtocol::Kitty);

        // Memoized: later env changes are not observed until reset
        unsafe {
            env::set_var(env_names::FORCE_PROTOCOL, "ascii");
        }
        assert_eq!(detector.detect(), GraphicsProtocol::Kitty);
        detector.reset();
        assert_eq!(detector.detect(), GraphicsProtocol::Ascii);

        // Restore env
        unsafe {
            if let Some(val) = original_force {
                env::set_var(env_names::FORCE_PROTOCOL, val);
            } else {
                env::remove_var(env_names::FORCE_PROTOCOL);
            }
        }
    }
}
