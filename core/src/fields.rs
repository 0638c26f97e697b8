//! Per-resource field-alias tables.
//!
//! Arc returns PascalCase keys on some resources and versions and lowercase
//! keys on others. Each variant lists every spelling it accepts, canonical
//! (the one sent upstream) first.

use std::fmt::Debug;

use serde_json::Value;

use crate::error::CoreError;

/// Declared value shape of a field, used when validating caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    /// Upstream stores lists as comma-separated strings.
    CommaList,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::Integer => "an integer",
            FieldKind::Boolean => "a boolean",
            FieldKind::CommaList => "a string or an array of strings",
        }
    }

    /// Coerce caller input into the upstream shape. `null` passes through so
    /// settings can be cleared.
    pub fn coerce(self, field: &str, value: &Value) -> Result<Value, CoreError> {
        let invalid = || CoreError::InvalidValue {
            field: field.to_string(),
            expected: self.expected(),
        };
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldKind::Text => match value {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(invalid()),
            },
            FieldKind::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| invalid()),
                _ => Err(invalid()),
            },
            FieldKind::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => parse_flag(s).map(Value::Bool).ok_or_else(invalid),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            FieldKind::CommaList => match value {
                Value::String(s) => Ok(Value::String(
                    s.split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .collect::<Vec<_>>()
                        .join(","),
                )),
                Value::Array(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        let text = item.as_str().ok_or_else(invalid)?.trim();
                        if !text.is_empty() {
                            parts.push(text.to_string());
                        }
                    }
                    Ok(Value::String(parts.join(",")))
                }
                _ => Err(invalid()),
            },
        }
    }
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub trait Field: Copy + Eq + Ord + Debug + 'static {
    const ALL: &'static [Self];

    /// Accepted upstream spellings, canonical first.
    fn aliases(self) -> &'static [&'static str];

    fn kind(self) -> FieldKind;

    fn canonical(self) -> &'static str {
        self.aliases()[0]
    }

    /// Case-insensitive lookup across every alias of every variant.
    fn resolve(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.aliases().iter().any(|a| a.eq_ignore_ascii_case(name)))
    }
}

macro_rules! field_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident: $kind:ident => [$($alias:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Field for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn aliases(self) -> &'static [&'static str] {
                match self {
                    $($name::$variant => &[$($alias),+]),+
                }
            }

            fn kind(self) -> FieldKind {
                match self {
                    $($name::$variant => FieldKind::$kind),+
                }
            }
        }
    };
}

field_table! {
    pub enum ConnectorField {
        ConnectorId: Text => ["ConnectorId", "connectorid", "connectorId"],
        WorkspaceId: Text => ["WorkspaceId", "workspaceid", "workspaceId", "Workspace"],
        ConnectorType: Text => ["ConnectorType", "connectortype", "connectorType", "Type"],
        Description: Text => ["Description", "description"],
        AutomationSend: Boolean => ["AutomationSend", "automationsend", "automationSend"],
        AutomationReceive: Boolean => ["AutomationReceive", "automationreceive", "automationReceive"],
        ReceiveInterval: Text => ["ReceiveInterval", "receiveinterval", "receiveInterval"],
        MaxWorkers: Integer => ["MaxWorkers", "maxworkers", "maxWorkers"],
        MaxFiles: Integer => ["MaxFiles", "maxfiles", "maxFiles"],
        SendFolder: Text => ["SendFolder", "sendfolder", "InputFolder", "inputfolder"],
        ReceiveFolder: Text => ["ReceiveFolder", "receivefolder", "OutputFolder", "outputfolder"],
        SentFolder: Text => ["SentFolder", "sentfolder", "ProcessedFolder", "processedfolder"],
        LogLevel: Text => ["LogLevel", "loglevel", "logLevel"],
    }
}

field_table! {
    pub enum FileField {
        ConnectorId: Text => ["ConnectorId", "connectorid", "connectorId"],
        Folder: Text => ["Folder", "folder"],
        Subfolder: Text => ["Subfolder", "subfolder", "SubFolder"],
        Filename: Text => ["Filename", "FileName", "filename", "fileName"],
        MessageId: Text => ["MessageId", "messageid", "messageId"],
        TimeCreated: Text => ["TimeCreated", "timecreated", "CreatedTime", "timeCreated"],
        FileSize: Integer => ["FileSize", "filesize", "Size", "fileSize"],
        Content: Text => ["Content", "content"],
        BatchGroupId: Text => ["BatchGroupId", "batchgroupid", "batchGroupId"],
    }
}

field_table! {
    /// Covers both observed transaction schemas (Timestamp + ProcessingTime,
    /// StartTime/EndTime + MessageCount).
    pub enum TransactionField {
        Id: Text => ["Id", "id", "TransactionId"],
        ConnectorId: Text => ["ConnectorId", "connectorid", "connectorId"],
        Status: Text => ["Status", "status"],
        Timestamp: Text => ["Timestamp", "timestamp", "StartTime", "starttime"],
        EndTime: Text => ["EndTime", "endtime"],
        Direction: Text => ["Direction", "direction"],
        Filename: Text => ["Filename", "FileName", "filename"],
        FileSize: Integer => ["FileSize", "filesize", "Size"],
        ProcessingTime: Integer => ["ProcessingTime", "processingtime"],
        MessageCount: Integer => ["MessageCount", "messagecount"],
        MessageId: Text => ["MessageId", "messageid"],
        ErrorMessage: Text => ["ErrorMessage", "errormessage", "Error"],
    }
}

field_table! {
    pub enum LogField {
        Id: Text => ["Id", "id"],
        Timestamp: Text => ["Timestamp", "timestamp", "Time"],
        Level: Text => ["Type", "Level", "type", "level"],
        Message: Text => ["Message", "message"],
        ConnectorId: Text => ["ConnectorId", "connectorid", "connectorId"],
        Category: Text => ["Category", "category"],
        MessageId: Text => ["MessageId", "messageid"],
    }
}

field_table! {
    /// Recognised profile settings; everything else passes through untyped.
    pub enum ProfileSetting {
        CompanyName: Text => ["CompanyName", "companyname"],
        ContactEmail: Text => ["Email", "email", "ContactEmail"],
        Phone: Text => ["Phone", "phone"],
        PublicUrl: Text => ["PublicURL", "publicurl", "PublicDomain"],
        LogLevel: Text => ["LogLevel", "loglevel"],
        LogRetentionDays: Integer => ["LogRetentionDays", "logretentiondays"],
        PrivateCertificate: Text => ["PrivateCertificate", "privatecertificate"],
        PrivateCertificatePassword: Text => ["PrivateCertificatePassword", "privatecertificatepassword"],
        As2Identifier: Text => ["as2:AS2Identifier", "as2:as2identifier"],
        As2AsyncMdnUrl: Text => ["as2:AsyncMDNURL", "as2:asyncmdnurl"],
        As4PartyId: Text => ["as4:PartyId", "as4:partyid"],
    }
}

field_table! {
    /// Workspaces use lowercase keys; capitalised legacy spellings still occur.
    pub enum WorkspaceField {
        WorkspaceId: Text => ["workspaceid", "WorkspaceId", "workspaceId"],
        Description: Text => ["description", "Description"],
        ConnectorCount: Integer => ["connectorcount", "ConnectorCount"],
        EmailTo: Text => ["emailto", "EmailTo", "AlertEmail"],
        EmailFrom: Text => ["emailfrom", "EmailFrom"],
        SmtpServer: Text => ["smtpserver", "SMTPServer"],
        SmtpPort: Integer => ["smtpport", "SMTPPort"],
        SmtpUser: Text => ["smtpuser", "SMTPUser"],
        SmtpPassword: Text => ["smtppassword", "SMTPPassword"],
        SmtpSsl: Boolean => ["smtpssl", "SMTPSSL"],
        S3Bucket: Text => ["s3bucket", "S3Bucket"],
        S3Region: Text => ["s3region", "S3Region"],
        S3AccessKey: Text => ["s3accesskey", "S3AccessKey"],
        S3SecretKey: Text => ["s3secretkey", "S3SecretKey"],
        CleanupEnabled: Boolean => ["cleanupenabled", "CleanupEnabled", "AutoCleanup"],
        CleanupDays: Integer => ["cleanupdays", "CleanupDays", "ArchiveDays"],
        MaxWorkers: Integer => ["maxworkers", "MaxWorkers"],
        MaxFiles: Integer => ["maxfiles", "MaxFiles"],
        AutoTaskEnabled: Boolean => ["autotaskenabled", "AutoTaskEnabled"],
        AutoTaskInterval: Text => ["autotaskinterval", "AutoTaskInterval"],
    }
}

field_table! {
    pub enum VaultField {
        Id: Text => ["Id", "id"],
        Name: Text => ["Name", "name"],
        Value: Text => ["Value", "value"],
        Type: Text => ["Type", "type"],
        ShowType: Boolean => ["ShowType", "showtype", "showType"],
        Tags: CommaList => ["Tags", "tags"],
    }
}

field_table! {
    pub enum CertificateField {
        Name: Text => ["Name", "name"],
        Subject: Text => ["Subject", "subject"],
        Issuer: Text => ["Issuer", "issuer"],
        EffectiveDate: Text => ["EffectiveDate", "effectivedate", "ValidFrom"],
        ExpirationDate: Text => ["ExpirationDate", "expirationdate", "ValidTo", "NotAfter"],
        ExpirationDays: Integer => ["ExpirationDays", "expirationdays", "DaysUntilExpiration"],
        Thumbprint: Text => ["Thumbprint", "thumbprint"],
        SerialNumber: Text => ["SerialNumber", "serialnumber"],
        KeySize: Integer => ["KeySize", "keysize"],
        ConnectorIds: CommaList => ["ConnectorIds", "connectorids", "Connectors"],
    }
}

field_table! {
    pub enum ReportField {
        Name: Text => ["Name", "name"],
        Type: Text => ["Type", "type", "ReportType"],
        Description: Text => ["Description", "description"],
        Schedule: Text => ["Schedule", "schedule"],
        Columns: CommaList => ["Columns", "columns"],
        Filters: Text => ["Filters", "filters"],
        EmailReport: Boolean => ["EmailReport", "emailreport"],
        EmailTo: Text => ["EmailTo", "emailto"],
        LastRun: Text => ["LastRun", "lastrun"],
    }
}

field_table! {
    pub enum RequestField {
        Id: Text => ["Id", "id"],
        Method: Text => ["Method", "method"],
        Url: Text => ["URL", "Url", "url"],
        Status: Integer => ["Status", "status", "StatusCode"],
        Bytes: Integer => ["Bytes", "bytes"],
        Time: Text => ["Time", "time", "Timestamp"],
        Duration: Integer => ["Duration", "duration", "ElapsedTime"],
        Error: Text => ["Error", "error", "ErrorMessage"],
        RemoteIp: Text => ["RemoteIP", "remoteip", "IPAddress"],
        User: Text => ["User", "user"],
    }
}

field_table! {
    /// Rows returned by the receive/send/cleanup/import actions.
    pub enum ActionResultField {
        File: Text => ["File", "Filename", "FileName", "file", "filename"],
        MessageId: Text => ["MessageId", "messageid"],
        ErrorMessage: Text => ["ErrorMessage", "errormessage", "Error"],
        Result: Text => ["Result", "result", "Status", "status"],
        ConnectorId: Text => ["ConnectorId", "connectorid"],
        Data: Text => ["Data", "data", "Content"],
    }
}
