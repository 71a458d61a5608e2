use std::fmt::{Display, Formatter, Result as FmtResult};

/// The authenticated caller, attached to the request extensions by the middleware.
///
/// This carries the application identifier and nothing else; authorization decisions belong to downstream handlers.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallerIdentity {
    app_id: String,
}

impl CallerIdentity {
    pub fn new<S: Into<String>>(app_id: S) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    #[inline]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl Display for CallerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.app_id)
    }
}
