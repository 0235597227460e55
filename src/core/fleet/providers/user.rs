use log::warn;
use serde::Deserialize;
use serde_json::Value;

use super::{as_array, from_payload};
use crate::core::fleet::provider::{Collected, FactProvider, ProviderContext};
use crate::core::fleet::transport::Capability;
use crate::core::fleet::types::{FieldMap, FieldValue, HostTarget};
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoggedOnUser {
    user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsoleSession {
    user_name: Option<String>,
}

/// Primary logged-on account, plus console session users when enabled.
#[derive(Debug, Clone)]
pub struct UserProvider {
    console_sessions: bool,
}

impl UserProvider {
    pub fn new(console_sessions: bool) -> Self {
        Self { console_sessions }
    }

    fn console_users(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<String> {
        let raw = ctx
            .transport
            .query_host(host, Capability::ConsoleSessions, &Value::Null)?;

        let mut names = Vec::new();
        for item in as_array(raw) {
            let session: ConsoleSession = from_payload(item, "console session")?;
            if let Some(name) = session.user_name.filter(|n| !n.trim().is_empty()) {
                names.push(name.trim().to_string());
            }
        }
        Ok(names.join(","))
    }
}

impl FactProvider for UserProvider {
    fn name(&self) -> &str {
        super::USER
    }

    fn description(&self) -> &str {
        "Logged-on account (and console session users when enabled)"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::LoggedOnUser, &Value::Null)?;

        let user_name = match raw {
            Value::Null => None,
            other => from_payload::<LoggedOnUser>(other, "logged-on user")?
                .user_name
                .filter(|n| !n.trim().is_empty()),
        };

        let mut collected: Collected = FieldMap::new()
            .with("UserName", FieldValue::opt_text(user_name))
            .into();

        if self.console_sessions {
            match self.console_users(host, ctx) {
                Ok(users) => collected.fields.insert("ConsoleUsers", users),
                Err(e) => {
                    warn!("Console session query failed on {}: {}", host, e);
                    collected.fields.insert("ConsoleUsers", FieldValue::Null);
                    collected = collected.with_note(format!("console sessions unavailable: {}", e));
                }
            }
        }

        Ok(collected)
    }
}
