use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode a startup script for the launch specification's `UserData` field.
pub fn encode_user_data(script: &[u8]) -> String {
    STANDARD.encode(script)
}
