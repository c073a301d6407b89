/// A fulfilled spot request together with its instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub instance_type: String,
    pub request_id: String,
    pub instance_id: String,
    /// Last address seen; empty while unknown.
    pub public_ip: String,
}

impl Reservation {
    pub fn ssh_command(&self, key_name: &str) -> String {
        format!("ssh -i \"{}.pem\" ubuntu@{}", key_name, self.public_ip)
    }
}
