/// Auth/session middleware is out of scope; the only thing the core
/// needs from it is a group membership check for auto-dispatch
/// eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum UserGroup {
    Untrusted,
    Trusted,
    Admin,
}

impl UserGroup {
    pub fn at_least_trusted(&self) -> bool {
        *self >= UserGroup::Trusted
    }
}
