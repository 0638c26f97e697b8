use std::fmt;

/// Entity collections exposed by the Arc Admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Connectors,
    Files,
    Transactions,
    Logs,
    Profile,
    Workspaces,
    Vault,
    Certificates,
    Reports,
    Requests,
}

impl Resource {
    pub const fn path(self) -> &'static str {
        match self {
            Resource::Connectors => "connectors",
            Resource::Files => "files",
            Resource::Transactions => "transactions",
            Resource::Logs => "logs",
            Resource::Profile => "profile",
            Resource::Workspaces => "workspaces",
            Resource::Vault => "vault",
            Resource::Certificates => "certificates",
            Resource::Reports => "reports",
            Resource::Requests => "requests",
        }
    }

    /// Singular noun used in rendered messages.
    pub const fn noun(self) -> &'static str {
        match self {
            Resource::Connectors => "connector",
            Resource::Files => "file",
            Resource::Transactions => "transaction",
            Resource::Logs => "log entry",
            Resource::Profile => "profile",
            Resource::Workspaces => "workspace",
            Resource::Vault => "vault entry",
            Resource::Certificates => "certificate",
            Resource::Reports => "report",
            Resource::Requests => "request",
        }
    }

    pub const fn plural(self) -> &'static str {
        match self {
            Resource::Connectors => "connectors",
            Resource::Files => "files",
            Resource::Transactions => "transactions",
            Resource::Logs => "log entries",
            Resource::Profile => "profiles",
            Resource::Workspaces => "workspaces",
            Resource::Vault => "vault entries",
            Resource::Certificates => "certificates",
            Resource::Reports => "reports",
            Resource::Requests => "requests",
        }
    }

    /// `@odata.type` discriminator Arc requires on PUT for some resources.
    pub const fn update_discriminator(self) -> Option<&'static str> {
        match self {
            Resource::Vault => Some("#CDataArcAPI.vault"),
            Resource::Profile => Some("#CDataArcAPI.profile"),
            _ => None,
        }
    }

    /// The profile is a single object rather than a keyed collection.
    pub const fn is_singleton(self) -> bool {
        matches!(self, Resource::Profile)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Key of a single entity, rendered into the OData path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKey {
    Single(String),
    Composite(Vec<(&'static str, String)>),
}

impl EntityKey {
    pub fn single(value: impl Into<String>) -> Self {
        EntityKey::Single(value.into())
    }

    /// Files have no standalone key; all four parts are required.
    pub fn file(
        connector_id: impl Into<String>,
        folder: impl Into<String>,
        filename: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        EntityKey::Composite(vec![
            ("ConnectorId", connector_id.into()),
            ("Folder", folder.into()),
            ("Filename", filename.into()),
            ("MessageId", message_id.into()),
        ])
    }

    /// `('value')` or `(K1='v1',K2='v2')`, with literals escaped for the path.
    pub fn to_segment(&self) -> String {
        match self {
            EntityKey::Single(value) => format!("({})", key_literal(value)),
            EntityKey::Composite(parts) => {
                let inner = parts
                    .iter()
                    .map(|(name, value)| format!("{name}={}", key_literal(value)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({inner})")
            }
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Single(value) => write!(f, "'{value}'"),
            EntityKey::Composite(parts) => {
                let rendered = parts
                    .iter()
                    .map(|(name, value)| format!("{name}='{value}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                f.write_str(&rendered)
            }
        }
    }
}

fn key_literal(value: &str) -> String {
    let doubled = value.replace('\'', "''");
    format!("'{}'", urlencoding::encode(&doubled))
}

/// POST action endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReceiveFile,
    SendFile,
    CopyConnector,
    Cleanup,
    Export,
    Import,
    SetFlow,
    ExchangeCert,
    CreateCert,
}

impl Action {
    pub const fn path(self) -> &'static str {
        match self {
            Action::ReceiveFile => "receiveFile",
            Action::SendFile => "sendFile",
            Action::CopyConnector => "copyConnector",
            Action::Cleanup => "cleanup",
            Action::Export => "export",
            Action::Import => "import",
            Action::SetFlow => "setFlow",
            Action::ExchangeCert => "exchangeCert",
            Action::CreateCert => "createCert",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
