/// One row of `get_users()`: a grantee plus whatever privileges the ACL
/// subsystem has on file for it.
#[derive(Debug, Clone)]
pub struct AclUser {
    pub user: String,
    pub host: String,
    pub privileges: Vec<String>,
    pub grant_option: bool,
}

/// The external ACL subsystem's adapter surface, per the privilege-table
/// contract: `get_users`/`check_permission`/`has_grant_option`/`is_loaded`.
/// A provider constructed without one simply reports `is_loaded() ==
/// false` and serves empty privilege tables rather than failing.
pub trait AclAdapter: Send + Sync {
    fn get_users(&self) -> Vec<AclUser>;
    fn check_permission(
        &self,
        user: &str,
        host: &str,
        privilege: &str,
        db: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> bool;
    fn has_grant_option(&self, user: &str, host: &str) -> bool;
    fn is_loaded(&self) -> bool;
}

/// Placeholder adapter used when no ACL subsystem is wired in. Always
/// reports unloaded so privilege tables come back empty without error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAcl;

impl AclAdapter for NoAcl {
    fn get_users(&self) -> Vec<AclUser> {
        Vec::new()
    }

    fn check_permission(
        &self,
        _user: &str,
        _host: &str,
        _privilege: &str,
        _db: Option<&str>,
        _table: Option<&str>,
        _column: Option<&str>,
    ) -> bool {
        false
    }

    fn has_grant_option(&self, _user: &str, _host: &str) -> bool {
        false
    }

    fn is_loaded(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_acl_reports_unloaded_and_empty() {
        let acl = NoAcl;
        assert!(!acl.is_loaded());
        assert!(acl.get_users().is_empty());
        assert!(!acl.check_permission("root", "%", "SELECT", None, None, None));
    }
}
