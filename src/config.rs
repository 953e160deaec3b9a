/*
 * Process-wide toolkit configuration, handed to `ControlTree::new` at startup.
 *
 * Environment overrides:
 * - `CONTROLCORE_CHECK_CROSS_THREAD`: `1`/`true`/`yes`/`on` makes handle access
 *   from a thread other than the owning one fail with `InvalidOperation`.
 * - `CONTROLCORE_SUPPRESS_CONTEXT_FLOW`: same values; marshaled calls then run
 *   without the caller's ambient context.
 */
use crate::types::Size;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitConfig {
    /// Fail fast when a handle is touched off its owning thread.
    pub check_for_illegal_cross_thread_calls: bool,
    /// Do not capture the ambient context snapshot on `begin_invoke`.
    pub suppress_context_flow: bool,
    /// Distance the pointer must travel with a button held before a drag starts.
    pub drag_size: Size,
    /// Forces double buffering on (`Some(true)`) or off for controls without their own override.
    pub default_buffering: Option<bool>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            check_for_illegal_cross_thread_calls: cfg!(debug_assertions),
            suppress_context_flow: false,
            drag_size: Size::new(4, 4),
            default_buffering: None,
        }
    }
}

impl ToolkitConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(enabled) = read_flag("CONTROLCORE_CHECK_CROSS_THREAD") {
            config.check_for_illegal_cross_thread_calls = enabled;
        }
        if let Some(enabled) = read_flag("CONTROLCORE_SUPPRESS_CONTEXT_FLOW") {
            config.suppress_context_flow = enabled;
        }
        config
    }

    pub fn with_cross_thread_checks(mut self, enabled: bool) -> Self {
        self.check_for_illegal_cross_thread_calls = enabled;
        self
    }

    pub fn with_context_flow_suppressed(mut self, suppressed: bool) -> Self {
        self.suppress_context_flow = suppressed;
        self
    }

    pub fn with_drag_size(mut self, drag_size: Size) -> Self {
        self.drag_size = drag_size;
        self
    }

    pub fn with_default_buffering(mut self, buffering: Option<bool>) -> Self {
        self.default_buffering = buffering;
        self
    }
}

fn read_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    let parsed = parse_flag(&value);
    match parsed {
        Some(enabled) => log::debug!("Config: {name}={value} -> {enabled}"),
        None => log::warn!(
            "Config: {name}={value} not understood (expected true/false, 1/0, yes/no, on/off), ignoring"
        ),
    }
    parsed
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" => Some(true),
        "0" | "false" | "no" | "off" | "disable" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_are_case_insensitive() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn builders_override_defaults() {
        let config = ToolkitConfig::default()
            .with_cross_thread_checks(false)
            .with_drag_size(Size::new(10, 2));
        assert!(!config.check_for_illegal_cross_thread_calls);
        assert_eq!(config.drag_size, Size::new(10, 2));
        assert!(!config.suppress_context_flow);
    }
}
