use common::row::Row;

use crate::txn::{TxnId, UNDELETED};

pub type RowId = u64;

/// One version of a row: the txn that created it, the txn that deleted it
/// (`UNDELETED` while still live), and the payload at that version.
#[derive(Debug, Clone)]
pub struct RowVersion {
    pub created: TxnId,
    pub deleted: TxnId,
    pub payload: Row,
}

impl RowVersion {
    /// Visible to a read at snapshot `at` iff created at or before it and
    /// either never deleted or deleted strictly after it.
    pub fn visible_at(&self, at: TxnId) -> bool {
        self.created <= at && (self.deleted == UNDELETED || self.deleted > at)
    }
}

/// A stable row identity and its append-only chain of versions, newest
/// last. The chain is monotonic in `created`; at most one version has
/// `deleted == UNDELETED` at a time outside of an in-flight write.
#[derive(Debug, Clone, Default)]
pub struct VersionedRow {
    pub versions: Vec<RowVersion>,
}

impl VersionedRow {
    pub fn push(&mut self, version: RowVersion) {
        debug_assert!(
            self.versions.last().map_or(true, |v| v.created <= version.created),
            "version chain must be monotonic in created-txn"
        );
        self.versions.push(version);
    }

    /// The version visible at snapshot `at`, if any; later versions are
    /// checked first since they're more likely to match a recent read.
    pub fn visible(&self, at: TxnId) -> Option<&RowVersion> {
        self.versions.iter().rev().find(|v| v.visible_at(at))
    }

    /// Marks the currently-live version (if any) deleted at `at`.
    pub fn mark_deleted(&mut self, at: TxnId) {
        if let Some(v) = self.versions.iter_mut().rev().find(|v| v.deleted == UNDELETED) {
            v.deleted = at;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::Row;

    #[test]
    fn version_visible_between_created_and_deleted() {
        let v = RowVersion {
            created: 2,
            deleted: 5,
            payload: Row::default(),
        };
        assert!(!v.visible_at(1));
        assert!(v.visible_at(2));
        assert!(v.visible_at(4));
        assert!(!v.visible_at(5));
    }

    #[test]
    fn undeleted_version_is_visible_at_any_later_snapshot() {
        let v = RowVersion {
            created: 2,
            deleted: UNDELETED,
            payload: Row::default(),
        };
        assert!(v.visible_at(1_000_000));
    }

    #[test]
    fn versioned_row_finds_most_recent_visible_version() {
        let mut row = VersionedRow::default();
        row.push(RowVersion { created: 1, deleted: 3, payload: Row::default() });
        row.push(RowVersion { created: 3, deleted: UNDELETED, payload: Row::default() });
        assert_eq!(row.visible(2).unwrap().created, 1);
        assert_eq!(row.visible(3).unwrap().created, 3);
    }
}
