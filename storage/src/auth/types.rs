use super::shared_key::SharedKeySigner;
use std::fmt;

/// The four Azure Storage services addressed by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Blob,
    Queue,
    Table,
    File,
}

impl ServiceKind {
    /// Host label used in the default endpoint, e.g. `blob` in
    /// `https://account.blob.core.windows.net`
    pub fn host_label(&self) -> &'static str {
        match self {
            ServiceKind::Blob => "blob",
            ServiceKind::Queue => "queue",
            ServiceKind::Table => "table",
            ServiceKind::File => "file",
        }
    }

    /// Local emulator port, if the emulator implements this service
    pub fn development_port(&self) -> Option<u16> {
        match self {
            ServiceKind::Blob => Some(10000),
            ServiceKind::Queue => Some(10001),
            ServiceKind::Table => Some(10002),
            ServiceKind::File => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_label())
    }
}

/// How outgoing requests are authorized.
#[derive(Clone)]
pub enum StorageCredential {
    /// Account name plus key; every request is signed with Shared Key
    SharedKey(SharedKeySigner),
    /// A SAS token appended to every request's query string
    SharedAccessSignature(String),
    /// No authorization, only useful against public resources
    Anonymous,
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageCredential::SharedKey(signer) => f
                .debug_tuple("SharedKey")
                .field(&signer.account())
                .finish(),
            StorageCredential::SharedAccessSignature(_) => {
                f.write_str("SharedAccessSignature(<redacted>)")
            }
            StorageCredential::Anonymous => f.write_str("Anonymous"),
        }
    }
}
