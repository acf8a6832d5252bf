use uuid::Uuid;

pub fn uuid_v5_u128(ns: Uuid, name: &str) -> u128 {
    Uuid::new_v5(&ns, name.as_bytes()).as_u128()
}

pub fn stable_node_id_u128(entity_type: &str, key_values: &[(&str, String)]) -> u128 {
    // name 形如 "Branch|repository=42|name=main"
    let mut name = String::from(entity_type);
    for (k, v) in key_values {
        name.push('|');
        name.push_str(k);
        name.push('=');
        name.push_str(v);
    }
    uuid_v5_u128(Uuid::NAMESPACE_OID, &name)
}

/// Hyphenated UUID string for nodes whose identity is synthetic.
pub fn stable_node_uuid(entity_type: &str, key_values: &[(&str, String)]) -> String {
    Uuid::from_u128(stable_node_id_u128(entity_type, key_values)).to_string()
}
