use dxsync_protocol::Installation;

use crate::error::SyncError;

/// Picks the installation bound to `workspace_id`.
///
/// Checks run in order: an empty list, a missing id, a non-numeric id, then
/// the lookup itself. The first matching installation wins.
pub fn select_installation<'a>(
    installations: &'a [Installation],
    workspace_id: Option<&str>,
) -> Result<&'a Installation, SyncError> {
    if installations.is_empty() {
        return Err(SyncError::NoInstallations);
    }
    let raw = workspace_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SyncError::MissingWorkspaceId)?;
    let target: i64 = raw
        .parse()
        .map_err(|_| SyncError::InvalidWorkspaceId(raw.to_string()))?;

    installations
        .iter()
        .find(|i| i.workspace_id == target)
        .ok_or(SyncError::InstallationNotFound(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installs() -> Vec<Installation> {
        vec![
            Installation {
                id: 1,
                workspace_id: 100,
                name: "first".into(),
            },
            Installation {
                id: 2,
                workspace_id: 200,
                name: "second".into(),
            },
            Installation {
                id: 3,
                workspace_id: 200,
                name: "duplicate".into(),
            },
        ]
    }

    #[test]
    fn picks_first_match() {
        let list = installs();
        let found = select_installation(&list, Some("200")).unwrap();
        assert_eq!(found.id, 2);
    }

    #[test]
    fn empty_list_checked_first() {
        let err = select_installation(&[], None).unwrap_err();
        assert!(matches!(err, SyncError::NoInstallations));
    }

    #[test]
    fn missing_workspace_id() {
        let list = installs();
        assert!(matches!(
            select_installation(&list, None),
            Err(SyncError::MissingWorkspaceId)
        ));
        assert!(matches!(
            select_installation(&list, Some("  ")),
            Err(SyncError::MissingWorkspaceId)
        ));
    }

    #[test]
    fn non_numeric_workspace_id() {
        let list = installs();
        let err = select_installation(&list, Some("abc")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidWorkspaceId(ref s) if s == "abc"));
    }

    #[test]
    fn unknown_workspace() {
        let list = installs();
        let err = select_installation(&list, Some("300")).unwrap_err();
        assert!(matches!(err, SyncError::InstallationNotFound(300)));
        assert_eq!(err.to_string(), "installation for workspace 300 not found");
    }
}
