use std::collections::HashMap;

use serde_json::Value;

/// Key identifying a node output port (e.g. `"main"`, `"error"`, `"true"`,
/// `"false"`).
pub type PortKey = String;

/// The data a node execution produces, keyed by output port.
///
/// A node fans its result out to zero or more of its declared output
/// ports; the engine routes each port's value along the connections that
/// originate from it. A node with a single output port (the common case)
/// produces exactly one entry.
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    ports: HashMap<PortKey, Value>,
}

impl NodeOutput {
    /// A result on a single named port — the common case for non-branching
    /// nodes (http, transform, log, file_write).
    pub fn single(port: impl Into<PortKey>, value: Value) -> Self {
        let mut ports = HashMap::with_capacity(1);
        ports.insert(port.into(), value);
        Self { ports }
    }

    /// Convenience for the conventional `"main"` port.
    pub fn main(value: Value) -> Self {
        Self::single("main", value)
    }

    /// Adds a value on `port`, overwriting any existing value there.
    pub fn with_port(mut self, port: impl Into<PortKey>, value: Value) -> Self {
        self.ports.insert(port.into(), value);
        self
    }

    pub fn get(&self, port: &str) -> Option<&Value> {
        self.ports.get(port)
    }

    pub fn ports(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ports.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_ports(self) -> HashMap<PortKey, Value> {
        self.ports
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_creates_one_entry() {
        let out = NodeOutput::single("main", Value::from(1));
        assert_eq!(out.get("main"), Some(&Value::from(1)));
        assert_eq!(out.ports().count(), 1);
    }

    #[test]
    fn main_uses_conventional_port_name() {
        let out = NodeOutput::main(Value::from("hi"));
        assert_eq!(out.get("main"), Some(&Value::from("hi")));
    }

    #[test]
    fn with_port_accumulates_multiple_ports() {
        let out = NodeOutput::main(Value::from(true)).with_port("false", Value::from(false));
        assert_eq!(out.ports().count(), 2);
        assert_eq!(out.get("false"), Some(&Value::from(false)));
    }

    #[test]
    fn with_port_overwrites_existing_port() {
        let out = NodeOutput::single("main", Value::from(1)).with_port("main", Value::from(2));
        assert_eq!(out.get("main"), Some(&Value::from(2)));
    }

    #[test]
    fn default_is_empty() {
        assert!(NodeOutput::default().is_empty());
    }
}
