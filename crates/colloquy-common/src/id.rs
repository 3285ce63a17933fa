pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short per-attempt client identifier embedded in the WebSocket path,
/// e.g. `client-a3f09c12`. A fresh one is generated for every connection
/// attempt and never reused.
pub fn new_client_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "client-{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}
