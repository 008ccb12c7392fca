//! Per-instance structured logger (ambient concern, spec §4.J/§6).
//!
//! Grounded on `original_source/src/logging.c`'s `LAIK_LOG` parsing (prefix
//! letters `n`/`s`, minimum level, optional `:from[-to]` location filter)
//! and on the teacher's [`crate::metrics`]-style shared, interior-mutable
//! collector — here `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`, since
//! spec §5 rules out in-process thread parallelism.

use regex::Regex;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::rc::Rc;
use std::time::Instant;

/// Line-prefix verbosity, parsed from the optional `n`/`s` leading letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    /// `n` — no prefix at all, just the message.
    None,
    /// `s` — process id only.
    Short,
    /// Default — full `== ispace-<ctr>-P<id> <msgctr> <elapsed>` prefix.
    Long,
}

/// Parsed `LOG_LEVEL`/`LOG_FILE` configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub prefix: Prefix,
    /// Minimum level that gets logged; 0 means nothing is logged (LAIK's
    /// "no logging" default).
    pub level: u32,
    /// Inclusive `[from, to]` location-id filter, if present.
    pub location_range: Option<(i32, i32)>,
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { prefix: Prefix::Long, level: 0, location_range: None, file: None }
    }
}

impl LogConfig {
    /// Parse `LOG_LEVEL` (`[n|s]<level>[:from[-to]]`) and `LOG_FILE` from
    /// the process environment. Unset or malformed `LOG_LEVEL` leaves
    /// logging off (matches LAIK's exit-on-malformed-input, relaxed to
    /// falling back to the default rather than terminating the process).
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self { file: std::env::var("LOG_FILE").ok(), ..Self::default() };
        let Ok(raw) = std::env::var("LOG_LEVEL") else {
            return cfg;
        };
        let re = Regex::new(r"^(?P<opt>[ns]?)(?P<level>\d+)(:(?P<from>\d+)(-(?P<to>\d+))?)?$")
            .expect("LOG_LEVEL pattern is a constant");
        let Some(caps) = re.captures(raw.trim()) else {
            return cfg;
        };
        cfg.prefix = match caps.name("opt").map(|m| m.as_str()) {
            Some("n") => Prefix::None,
            Some("s") => Prefix::Short,
            _ => Prefix::Long,
        };
        if let Some(level) = caps.name("level").and_then(|m| m.as_str().parse().ok()) {
            cfg.level = level;
        }
        if let Some(from) = caps.name("from").and_then(|m| m.as_str().parse().ok()) {
            let to = caps.name("to").and_then(|m| m.as_str().parse().ok()).unwrap_or(from);
            cfg.location_range = Some((from, to));
        }
        cfg
    }
}

enum Sink {
    Stderr,
    File(std::fs::File),
}

impl Sink {
    fn write_line(&mut self, line: &str) {
        match self {
            Self::Stderr => eprintln!("{line}"),
            Self::File(f) => {
                let _ = writeln!(f, "{line}");
            }
        }
    }
}

struct LoggerState {
    sink: Sink,
    logctr: u32,
    msgctr: u32,
}

/// A per-process, per-instance logger. Cheap to clone (shares one sink via
/// `Rc<RefCell<_>>`); created once by [`crate::instance::Instance::init`].
#[derive(Clone)]
pub struct Logger {
    config: LogConfig,
    process: i32,
    start: Instant,
    state: Rc<RefCell<LoggerState>>,
}

impl Logger {
    #[must_use]
    pub fn new(process: i32, config: LogConfig) -> Self {
        let sink = match &config.file {
            Some(path) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_or(Sink::Stderr, Sink::File),
            None => Sink::Stderr,
        };
        Self {
            config,
            process,
            start: Instant::now(),
            state: Rc::new(RefCell::new(LoggerState { sink, logctr: 0, msgctr: 0 })),
        }
    }

    /// Advance the logical phase counter (spec: "logical counter" in the
    /// line prefix), typically called at iteration or barrier boundaries.
    pub fn next_phase(&self) {
        let mut s = self.state.borrow_mut();
        s.logctr += 1;
        s.msgctr = 0;
    }

    fn enabled(&self, level: u32) -> bool {
        if level < self.config.level {
            return false;
        }
        if let Some((from, to)) = self.config.location_range {
            if self.process < from || self.process > to {
                return false;
            }
        }
        true
    }

    /// Log `message` at `level` if the current filter allows it.
    pub fn log(&self, level: u32, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let mut s = self.state.borrow_mut();
        s.msgctr += 1;
        let line = match self.config.prefix {
            Prefix::None => message.to_string(),
            Prefix::Short => format!("[P{}] {message}", self.process),
            Prefix::Long => format!(
                "== ispace-{}-P{} {} {:.3}ms: {message}",
                s.logctr,
                self.process,
                s.msgctr,
                self.start.elapsed().as_secs_f64() * 1000.0
            ),
        };
        s.sink.write_line(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_and_prefix_option() {
        let re_input = "s2:1-3";
        // SAFETY: this crate's test binary is single-threaded per test
        // process under the default harness; no other test reads these vars.
        unsafe {
            std::env::set_var("LOG_LEVEL", re_input);
            std::env::remove_var("LOG_FILE");
        }
        let cfg = LogConfig::from_env();
        unsafe {
            std::env::remove_var("LOG_LEVEL");
        }
        assert_eq!(cfg.prefix, Prefix::Short);
        assert_eq!(cfg.level, 2);
        assert_eq!(cfg.location_range, Some((1, 3)));
    }

    #[test]
    fn missing_env_disables_logging() {
        // SAFETY: see above.
        unsafe {
            std::env::remove_var("LOG_LEVEL");
        }
        let cfg = LogConfig::from_env();
        assert_eq!(cfg.level, 0);
        let logger = Logger::new(0, cfg);
        assert!(!logger.enabled(5));
    }

    #[test]
    fn location_filter_excludes_out_of_range_process() {
        let cfg = LogConfig { level: 1, location_range: Some((2, 4)), ..LogConfig::default() };
        let logger = Logger::new(0, cfg);
        assert!(!logger.enabled(1));
    }
}
