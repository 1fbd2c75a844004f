use std::path::PathBuf;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// What the reconciler did to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Created,
    Updated,
    Deleted,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Created => "CREATED",
            ActionKind::Updated => "UPDATED",
            ActionKind::Deleted => "DELETED",
        }
    }
}

/// What kind of entity an action touched. Only files are audited; directory
/// creation and removal happen silently as part of mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    File,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "file",
        }
    }
}

/// One reconciliation decision, created at the moment the corresponding
/// filesystem mutation succeeded and handed to the audit log right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    kind: ActionKind,
    entity: EntityKind,
    relative_path: PathBuf,
    timestamp: OffsetDateTime,
}

impl ActionRecord {
    /// Stamps the record with the current wall-clock time.
    pub fn new(kind: ActionKind, relative_path: PathBuf) -> Self {
        Self {
            kind,
            entity: EntityKind::File,
            relative_path,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Renders the one-line form shared by the file and console sinks:
    /// `<RFC 3339 timestamp> <KIND> <entity> <relative path>`.
    pub fn format_line(&self) -> String {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());

        format!(
            "{} {} {} {}",
            timestamp,
            self.kind.as_str(),
            self.entity.as_str(),
            self.relative_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActionKind::Created, "CREATED")]
    #[case(ActionKind::Updated, "UPDATED")]
    #[case(ActionKind::Deleted, "DELETED")]
    fn test_line_contains_kind_entity_and_path(#[case] kind: ActionKind, #[case] tag: &str) {
        let record = ActionRecord::new(kind, PathBuf::from("docs/readme.md"));

        let line = record.format_line();

        assert!(line.contains(tag));
        assert!(line.contains(" file "));
        assert!(line.ends_with("docs/readme.md"));
    }

    #[test]
    fn test_line_starts_with_rfc3339_timestamp() {
        let record = ActionRecord::new(ActionKind::Created, PathBuf::from("a.txt"));

        let line = record.format_line();
        let timestamp = line.split(' ').next().expect("Line has no fields");

        assert!(OffsetDateTime::parse(timestamp, &Rfc3339).is_ok());
    }
}
