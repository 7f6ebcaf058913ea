//! Port definitions describing a node's input/output connection points.

use serde::{Deserialize, Serialize};

/// Key identifying a node port (e.g. `"in"`, `"main"`, `"error"`, `"true"`).
pub type PortKey = String;

/// An input port declaration on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    pub key: PortKey,
    /// Whether a connection to this port is required for the node to fire.
    /// Consulted by the input coordinator's wait-mode logic.
    #[serde(default = "default_true")]
    pub required: bool,
}

impl InputPort {
    #[must_use]
    pub fn new(key: impl Into<PortKey>) -> Self {
        Self { key: key.into(), required: true }
    }

    #[must_use]
    pub fn optional(key: impl Into<PortKey>) -> Self {
        Self { key: key.into(), required: false }
    }
}

fn default_true() -> bool {
    true
}

/// An output port declaration on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    pub key: PortKey,
    /// Whether this port only ever carries error data. Every node
    /// implicitly has an `"error"` port with `is_error = true`; declaring
    /// it explicitly lets the registry show it in the node's schema.
    #[serde(default)]
    pub is_error: bool,
}

impl OutputPort {
    #[must_use]
    pub fn new(key: impl Into<PortKey>) -> Self {
        Self { key: key.into(), is_error: false }
    }

    #[must_use]
    pub fn error(key: impl Into<PortKey>) -> Self {
        Self { key: key.into(), is_error: true }
    }
}

/// The port every node's error output lands on when no node-specific
/// error port is declared.
pub const ERROR_PORT: &str = "error";

/// The conventional name for a node's single success output.
pub const MAIN_PORT: &str = "main";

#[must_use]
pub fn default_input_ports() -> Vec<InputPort> {
    vec![InputPort::new("in")]
}

#[must_use]
pub fn default_output_ports() -> Vec<OutputPort> {
    vec![OutputPort::new(MAIN_PORT), OutputPort::error(ERROR_PORT)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_port_new_is_required_by_default() {
        let port = InputPort::new("in");
        assert!(port.required);
    }

    #[test]
    fn input_port_optional_is_not_required() {
        let port = InputPort::optional("fallback");
        assert!(!port.required);
    }

    #[test]
    fn output_port_error_sets_flag() {
        let port = OutputPort::error("error");
        assert!(port.is_error);
    }

    #[test]
    fn input_port_serde_roundtrip() {
        let port = InputPort::new("in");
        let json = serde_json::to_string(&port).unwrap();
        let back: InputPort = serde_json::from_str(&json).unwrap();
        assert_eq!(port, back);
    }

    #[test]
    fn default_output_ports_include_error() {
        let ports = default_output_ports();
        assert!(ports.iter().any(|p| p.key == ERROR_PORT && p.is_error));
    }
}
