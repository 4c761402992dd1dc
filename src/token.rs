//! Bearer token state.
//!
//! Spec §5 is explicit: the token is per-client-instance state, read on
//! every request and written only by `login`/`signout`. There is no
//! external storage trait and no process-wide singleton (contrast with the
//! teacher's `ClientStorage`/`SessionTokenCache`, which this crate does not
//! need — see DESIGN.md).

#[derive(Debug, Clone, Default)]
pub struct TokenCell(Option<String>);

impl TokenCell {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn set(&mut self, token: String) {
        self.0 = Some(token);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn auth_header(&self) -> Option<String> {
        self.0.as_ref().map(|t| format!("Bearer {t}"))
    }
}
