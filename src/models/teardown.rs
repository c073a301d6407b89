/// What cancelling a spot request actually did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Teardown {
    /// The request had no running instance left once cancelled.
    AlreadyTornDown { status_code: Option<String> },
    /// The request's instance was terminated by this call.
    Terminated {
        instance_id: String,
        /// State reported by terminate-instances, e.g. `shutting-down`.
        state: Option<String>,
    },
}

impl Teardown {
    pub fn terminated_instance(&self) -> Option<&str> {
        match self {
            Teardown::Terminated { instance_id, .. } => Some(instance_id),
            Teardown::AlreadyTornDown { .. } => None,
        }
    }
}
