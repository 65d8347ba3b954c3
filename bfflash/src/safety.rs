//! Write-permission gating for mutating radio operations.
//!
//! [`require_write_permission`] is the single gate in front of every
//! operation that changes device memory. Front-ends build a
//! [`SafetyContext`] from their flags and the core applies the same rules
//! everywhere; interactive confirmation goes through a caller-supplied
//! prompt callback so the core never touches a terminal.

use crate::error::{Error, Result};

/// Confirmation token required for writes.
pub const CONFIRMATION_TOKEN: &str = "WRITE";

/// Prompt callback: receives a prompt string, returns the user's answer.
pub type PromptFn = Box<dyn Fn(&str) -> String + Send>;

/// Safety context for one write operation. Created per operation,
/// consumed and discarded.
#[derive(Default)]
pub struct SafetyContext {
    /// Whether the write flag was provided.
    pub write_enabled: bool,
    /// Non-interactive confirmation token, if supplied.
    pub confirmation_token: Option<String>,
    /// Whether the front-end can prompt for confirmation.
    pub interactive: bool,
    /// Detected or specified radio model name.
    pub model: String,
    /// Whether the target region is definitively known.
    pub region_known: bool,
    /// Dry-run mode; nothing will be written.
    pub simulate: bool,
    /// Warnings accumulated during the operation.
    pub warnings: Vec<String>,
    /// Confirmation prompt callback for interactive mode.
    pub prompt: Option<PromptFn>,
}

impl std::fmt::Debug for SafetyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyContext")
            .field("write_enabled", &self.write_enabled)
            .field("confirmation_token", &self.confirmation_token)
            .field("interactive", &self.interactive)
            .field("model", &self.model)
            .field("region_known", &self.region_known)
            .field("simulate", &self.simulate)
            .field("warnings", &self.warnings)
            .field("prompt", &self.prompt.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl SafetyContext {
    /// Context for a write-enabled operation on a known model/region.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            region_known: true,
            ..Self::default()
        }
    }

    /// Enable the write flag.
    #[must_use]
    pub fn with_write_enabled(mut self, enabled: bool) -> Self {
        self.write_enabled = enabled;
        self
    }

    /// Supply a non-interactive confirmation token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.confirmation_token = Some(token.into());
        self
    }

    /// Mark the context as a dry run.
    #[must_use]
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Attach an interactive confirmation prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptFn) -> Self {
        self.interactive = true;
        self.prompt = Some(prompt);
        self
    }

    /// Record a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn is_model_unknown(&self) -> bool {
        self.model.is_empty() || self.model.eq_ignore_ascii_case("unknown")
    }
}

fn token_matches(token: &str) -> bool {
    token.trim().eq_ignore_ascii_case(CONFIRMATION_TOKEN)
}

/// Enforce the write-permission rules, in order:
///
/// 1. simulation is always allowed (nothing will be written);
/// 2. the write flag must be set;
/// 3. the model must be known;
/// 4. the target region must be known or explicitly named;
/// 5. a supplied token must equal `WRITE` (trimmed, case-insensitive);
/// 6. otherwise an interactive prompt must return `WRITE`;
/// 7. with neither token nor prompt, the write is refused.
///
/// Call this before opening the port for write or just before the first
/// write byte, whichever is later.
pub fn require_write_permission(
    ctx: &SafetyContext,
    target_region: &str,
    bytes_length: usize,
    offset: Option<u32>,
) -> Result<()> {
    if ctx.simulate {
        return Ok(());
    }

    if !ctx.write_enabled {
        return Err(Error::Unsafe(
            "write flag required: pass --write (CLI) or acknowledge the risk (UI)".into(),
        ));
    }

    if ctx.is_model_unknown() {
        return Err(Error::Unsafe(
            "unknown model: identification failed or model not recognized".into(),
        ));
    }

    if !ctx.region_known && target_region.is_empty() {
        return Err(Error::Unsafe(
            "region unknown: provide an explicit offset or region".into(),
        ));
    }

    if let Some(token) = &ctx.confirmation_token {
        if token_matches(token) {
            return Ok(());
        }
        return Err(Error::Unsafe(format!(
            "confirmation token mismatch (expected '{CONFIRMATION_TOKEN}')"
        )));
    }

    if ctx.interactive {
        let Some(prompt) = &ctx.prompt else {
            return Err(Error::Unsafe(
                "interactive confirmation required but no prompt handler set".into(),
            ));
        };
        let question = format!(
            "About to write {bytes_length} bytes to {} ({target_region}{}). \
             Type '{CONFIRMATION_TOKEN}' to proceed",
            ctx.model,
            offset.map_or_else(String::new, |o| format!(" at 0x{o:06X}")),
        );
        if token_matches(&prompt(&question)) {
            return Ok(());
        }
        return Err(Error::Unsafe("confirmation failed: write aborted".into()));
    }

    Err(Error::Unsafe(
        "confirmation required: supply the WRITE token in non-interactive mode".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unsafe(result: Result<()>, needle: &str) {
        match result.unwrap_err() {
            Error::Unsafe(msg) => assert!(msg.contains(needle), "message: {msg}"),
            other => panic!("expected Unsafe, got {other:?}"),
        }
    }

    #[test]
    fn test_simulate_always_allowed() {
        let ctx = SafetyContext::default().with_simulate(true);
        require_write_permission(&ctx, "", 0, None).unwrap();
    }

    #[test]
    fn test_write_flag_required() {
        let ctx = SafetyContext::new("UV5R").with_token(CONFIRMATION_TOKEN);
        assert_unsafe(
            require_write_permission(&ctx, "main", 16, None),
            "write flag",
        );
    }

    #[test]
    fn test_unknown_model_refused() {
        for name in ["", "unknown", "Unknown"] {
            let ctx = SafetyContext::new(name)
                .with_write_enabled(true)
                .with_token(CONFIRMATION_TOKEN);
            assert_unsafe(require_write_permission(&ctx, "main", 16, None), "model");
        }
    }

    #[test]
    fn test_unknown_region_refused_without_target() {
        let mut ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_token(CONFIRMATION_TOKEN);
        ctx.region_known = false;
        assert_unsafe(require_write_permission(&ctx, "", 16, None), "region");
        // An explicit target region satisfies rule 4
        require_write_permission(&ctx, "logo at 0x1000", 16, Some(0x1000)).unwrap();
    }

    #[test]
    fn test_token_is_trimmed_and_case_insensitive() {
        let ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_token("  write \n");
        require_write_permission(&ctx, "main", 16, None).unwrap();
    }

    #[test]
    fn test_wrong_token_refused() {
        let ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_token("YES");
        assert_unsafe(require_write_permission(&ctx, "main", 16, None), "token");
    }

    #[test]
    fn test_interactive_prompt_path() {
        let ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_prompt(Box::new(|_| "WRITE".to_string()));
        require_write_permission(&ctx, "main", 16, Some(0)).unwrap();

        let ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_prompt(Box::new(|_| "no".to_string()));
        assert_unsafe(
            require_write_permission(&ctx, "main", 16, None),
            "aborted",
        );
    }

    #[test]
    fn test_no_token_no_prompt_refused() {
        let ctx = SafetyContext::new("UV5R").with_write_enabled(true);
        assert_unsafe(
            require_write_permission(&ctx, "main", 16, None),
            "confirmation required",
        );
    }
}
