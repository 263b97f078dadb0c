// Diagnostic tracing gated by the RBX_PARSER_DEBUG environment variable.
// Read once at first use and never mutated.

use std::sync::OnceLock;

fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("RBX_PARSER_DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    })
}

// Prints f() to stderr if tracing is enabled.
pub fn trace(f: impl FnOnce() -> String) {
    if enabled() {
        eprintln!("[rbxl_extractor] {}", f());
    }
}
