use super::errors::{StorageError, StorageResult};
use std::fmt;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 63;

/// The kinds of storage resources the application provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BlobContainer,
    Queue,
    Table,
    FileShare,
}

impl ResourceKind {
    /// Human-readable name used in log lines and views
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::BlobContainer => "Blob Container",
            ResourceKind::Queue => "Queue",
            ResourceKind::Table => "Table",
            ResourceKind::FileShare => "File Share",
        }
    }

    /// Validates `name` against the service's naming rules.
    ///
    /// Containers, queues and shares follow DNS-label rules: 3-63 lowercase
    /// letters, digits and hyphens, starting and ending with a letter or
    /// digit, without consecutive hyphens. Tables are 3-63 alphanumeric
    /// characters starting with a letter, and `tables` is reserved.
    pub fn validate_name(&self, name: &str) -> StorageResult<()> {
        let result = match self {
            ResourceKind::BlobContainer if name == "$root" => Ok(()),
            ResourceKind::BlobContainer | ResourceKind::Queue | ResourceKind::FileShare => {
                check_dns_label(name)
            }
            ResourceKind::Table => check_table_name(name),
        };

        result.map_err(|reason| StorageError::InvalidResourceName {
            kind: *self,
            name: name.to_string(),
            reason,
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn check_length(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(format!(
            "length must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters, got {len}"
        ));
    }
    Ok(())
}

fn check_dns_label(name: &str) -> Result<(), String> {
    check_length(name)?;

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!(
            "only lowercase letters, digits and hyphens are allowed, found '{c}'"
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("must start and end with a letter or digit".to_string());
    }
    if name.contains("--") {
        return Err("consecutive hyphens are not allowed".to_string());
    }
    Ok(())
}

fn check_table_name(name: &str) -> Result<(), String> {
    check_length(name)?;

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("only alphanumeric characters are allowed".to_string());
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err("must start with a letter".to_string());
    }
    if name.eq_ignore_ascii_case("tables") {
        return Err("'tables' is a reserved name".to_string());
    }
    Ok(())
}
