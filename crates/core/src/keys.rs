//! String-keyed identifiers: node ids, node-type keys, and port names.

use domain_key::{define_domain, key_type};

define_domain!(NodeIdDomain, "node_id");
key_type!(NodeId, NodeIdDomain);

define_domain!(NodeTypeDomain, "node_type");
key_type!(NodeTypeKey, NodeTypeDomain);

define_domain!(PortDomain, "port");
key_type!(PortName, PortDomain);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_roundtrips_through_display() {
        let id = NodeId::new("fetch_users").unwrap();
        assert_eq!(id.as_str(), "fetch_users");
    }

    #[test]
    fn node_type_key_roundtrips_through_display() {
        let key = NodeTypeKey::new("http.request").unwrap();
        assert_eq!(key.as_str(), "http.request");
    }

    #[test]
    fn port_name_roundtrips_through_display() {
        let name = PortName::new("success").unwrap();
        assert_eq!(name.as_str(), "success");
    }
}
