//! Outcome sentinel scanning for emission-scanning handlers.
//!
//! Shell-family handlers publish outcomes through stdout using the
//! sentinel `##cjunct[yield-outcome-b64 <b64key> <b64val>]##` at end of
//! line. The scanner decodes matches into outcomes and forwards the rest
//! of the line; stderr is never scanned.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use tracing::warn;

use cjunct_workflow::ActionIo;

static SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?)##cjunct\[yield-outcome-b64 (?P<key>[^ \]]*) (?P<value>[^ \]]*)\]##\s*$")
        .expect("sentinel pattern is well-formed")
});

/// The shell function injected ahead of user commands so scripts can
/// report outcomes over stdout.
pub const YIELD_FUNCTION_DEFINITION: &str = r#"yield_outcome() {
    printf '##cjunct[yield-outcome-b64 %s %s]##\n' \
        "$(printf '%s' "$1" | base64 | tr -d '\n')" \
        "$(printf '%s' "$2" | base64 | tr -d '\n')"
}"#;

/// Emission facade that scans stdout lines for the outcome sentinel.
pub struct EmissionScanner {
    io: ActionIo,
}

impl EmissionScanner {
    /// Wrap an action's I/O facade.
    pub fn new(io: ActionIo) -> Self {
        Self { io }
    }

    /// Publish a stdout line, intercepting a trailing sentinel.
    ///
    /// On a match the decoded key/value pair is recorded as an outcome
    /// and only the text preceding the sentinel is forwarded (verbatim,
    /// trailing whitespace included). Malformed sentinels are logged and
    /// the line passes through untouched.
    pub fn emit_stdout(&self, line: &str) {
        let Some(captures) = SENTINEL.captures(line) else {
            self.io.emit(line);
            return;
        };
        let key = decode_b64(&captures["key"]);
        let value = decode_b64(&captures["value"]);
        let (Some(key), Some(value)) = (key, value) else {
            warn!(line, "malformed outcome sentinel, forwarding verbatim");
            self.io.emit(line);
            return;
        };
        self.io.yield_outcome(key, value);
        let prefix = &captures["prefix"];
        if !prefix.is_empty() {
            self.io.emit(prefix);
        }
    }

    /// Publish a stderr line. Never scanned.
    pub fn emit_stderr(&self, line: &str) {
        self.io.emit_stderr(line);
    }
}

fn decode_b64(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
