//! Permission and ownership changes on the local filesystem

use std::path::Path;

use super::CommandError;

/// Set file permissions from octal ("0644") or symbolic ("u+x,go-w") notation.
/// Symbolic changes apply to the file's current mode.
pub async fn set_permissions(path: &Path, mode: &str) -> Result<(), CommandError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = tokio::fs::metadata(path).await.map_err(CommandError::io(path))?;
        let current = metadata.permissions().mode() & 0o7777;
        let parsed = parse_mode(mode, current)?;

        let mut permissions = metadata.permissions();
        permissions.set_mode(parsed);
        tokio::fs::set_permissions(path, permissions)
            .await
            .map_err(CommandError::io(path))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Err(CommandError::Unsupported {
            operation: "chmod".to_string(),
        })
    }
}

/// Change owner and/or group, by name or numeric id
pub async fn set_ownership(
    path: &Path,
    owner: Option<&str>,
    group: Option<&str>,
) -> Result<(), CommandError> {
    #[cfg(unix)]
    {
        use nix::unistd::chown;

        let uid = owner.map(resolve_user).transpose()?;
        let gid = group.map(resolve_group).transpose()?;

        chown(path, uid, gid).map_err(|e| CommandError::Io {
            path: path.display().to_string(),
            source: std::io::Error::from(e),
        })
    }

    #[cfg(not(unix))]
    {
        let _ = (path, owner, group);
        Err(CommandError::Unsupported {
            operation: "chown".to_string(),
        })
    }
}

#[cfg(unix)]
pub fn user_exists(name: &str) -> bool {
    matches!(nix::unistd::User::from_name(name), Ok(Some(_)))
}

#[cfg(unix)]
pub fn group_exists(name: &str) -> bool {
    matches!(nix::unistd::Group::from_name(name), Ok(Some(_)))
}

#[cfg(unix)]
fn resolve_user(user: &str) -> Result<nix::unistd::Uid, CommandError> {
    use nix::unistd::{Uid, User};

    if let Ok(uid) = user.parse::<u32>() {
        return Ok(Uid::from_raw(uid));
    }

    match User::from_name(user) {
        Ok(Some(found)) => Ok(found.uid),
        _ => Err(CommandError::UnknownUser {
            name: user.to_string(),
        }),
    }
}

#[cfg(unix)]
fn resolve_group(group: &str) -> Result<nix::unistd::Gid, CommandError> {
    use nix::unistd::{Gid, Group};

    if let Ok(gid) = group.parse::<u32>() {
        return Ok(Gid::from_raw(gid));
    }

    match Group::from_name(group) {
        Ok(Some(found)) => Ok(found.gid),
        _ => Err(CommandError::UnknownGroup {
            name: group.to_string(),
        }),
    }
}

/// Parse a permission mode string into numeric form
pub fn parse_mode(mode: &str, current: u32) -> Result<u32, CommandError> {
    let invalid = || CommandError::InvalidPermissions {
        mode: mode.to_string(),
    };

    if !mode.is_empty() && mode.chars().all(|c| c.is_ascii_digit()) {
        let parsed = u32::from_str_radix(mode, 8).map_err(|_| invalid())?;
        if parsed > 0o7777 {
            return Err(invalid());
        }
        return Ok(parsed);
    }

    let mut result = current;
    for part in mode.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let pos = part.find(['+', '-', '=']).ok_or_else(invalid)?;
        let (who, rest) = part.split_at(pos);
        let mut chars = rest.chars();
        let op = chars.next().ok_or_else(invalid)?;
        let who_mask = parse_who(who).ok_or_else(invalid)?;
        let bits = parse_permissions(chars.as_str()).ok_or_else(invalid)?;

        match op {
            '+' => result |= who_mask & bits,
            '-' => result &= !(who_mask & bits),
            '=' => {
                result &= !who_mask;
                result |= who_mask & bits;
            }
            _ => return Err(invalid()),
        }
    }

    if mode.trim().is_empty() {
        return Err(invalid());
    }
    Ok(result)
}

fn parse_who(who: &str) -> Option<u32> {
    let mut mask = 0;
    for c in who.chars() {
        mask |= match c {
            'u' => 0o700,
            'g' => 0o070,
            'o' => 0o007,
            'a' => 0o777,
            _ => return None,
        };
    }
    Some(if mask == 0 { 0o777 } else { mask })
}

fn parse_permissions(perms: &str) -> Option<u32> {
    let mut bits = 0;
    for c in perms.chars() {
        bits |= match c {
            'r' => 0o444,
            'w' => 0o222,
            'x' => 0o111,
            _ => return None,
        };
    }
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_octal_mode() {
        assert_eq!(parse_mode("644", 0).unwrap(), 0o644);
        assert_eq!(parse_mode("0755", 0).unwrap(), 0o755);
        assert!(parse_mode("99", 0).is_err());
    }

    #[test]
    fn test_parse_symbolic_mode_relative_to_current() {
        assert_eq!(parse_mode("u+x", 0o644).unwrap(), 0o744);
        assert_eq!(parse_mode("go-r", 0o644).unwrap(), 0o600);
        assert_eq!(parse_mode("a=r", 0o755).unwrap(), 0o444);
        assert_eq!(parse_mode("u+x,g+w", 0o600).unwrap(), 0o720);
    }

    #[test]
    fn test_invalid_modes() {
        assert!(parse_mode("", 0o644).is_err());
        assert!(parse_mode("z+x", 0o644).is_err());
        assert!(parse_mode("u+q", 0o644).is_err());
        assert!(parse_mode("rwx", 0o644).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_set_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        set_permissions(file.path(), "0600").await.unwrap();
        set_permissions(file.path(), "u+x").await.unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_owner() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = set_ownership(file.path(), Some("no-such-user-xyz"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownUser { .. }));
    }
}
