use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::parse::{KeyidLine, parse_keyid_line, parse_role_line};
use crate::types::{Entity, Role};
use crate::validation::validate_keyid;

/// All entities of the keyring, keyed by handle, in keyid-file order.
#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the keyid file and all role files named by `layout`.
    ///
    /// With `strict`, display names in role files must match the keyid file.
    pub fn load(layout: &Layout, strict: bool) -> Result<Self> {
        let mut directory = Self::new();
        directory.read_keyids(&layout.keyids_file())?;
        for role in Layout::ROLE_FILE_ORDER {
            directory.read_role_file(&layout.role_file(role), role, strict)?;
        }
        info!(entities = directory.len(), "loaded entity directory");
        Ok(directory)
    }

    pub fn add(
        &mut self,
        handle: impl Into<String>,
        name: impl Into<String>,
        keyids: Vec<String>,
    ) -> Result<()> {
        let handle = handle.into();
        if self.index.contains_key(&handle) {
            return Err(Error::DuplicateHandle(handle));
        }
        self.index.insert(handle.clone(), self.entities.len());
        self.entities.push(Entity::new(handle, name, keyids));
        Ok(())
    }

    pub fn assign_role(&mut self, handle: &str, role: Role) -> Result<()> {
        let entity = self
            .get_mut(handle)
            .ok_or_else(|| Error::UnknownHandle(handle.to_string()))?;
        entity.roles.insert(role);
        Ok(())
    }

    pub fn get(&self, handle: &str) -> Option<&Entity> {
        self.index.get(handle).map(|&i| &self.entities[i])
    }

    pub fn get_mut(&mut self, handle: &str) -> Option<&mut Entity> {
        self.index.get(handle).map(|&i| &mut self.entities[i])
    }

    pub fn is_member_of(&self, handle: &str, role: Role) -> bool {
        self.get(handle).is_some_and(|e| e.roles.contains(&role))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in keyid-file order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Every entity must hold exactly one exclusive role.
    ///
    /// Additional roles are limited to [`Role::Leader`] and [`Role::Admin`]
    /// by construction; unknown role names fail when parsed.
    pub fn check_consistency(&self) -> Result<()> {
        for entity in &self.entities {
            let exclusive = entity.exclusive_roles();
            if exclusive.len() != 1 {
                return Err(Error::EntityConsistency {
                    handle: entity.handle.clone(),
                    count: exclusive.len(),
                    roles: exclusive,
                });
            }
        }
        Ok(())
    }

    /// Handles in documentation order.
    ///
    /// Leaders come first, then everyone else by number of roles, most
    /// first. Ties keep keyid-file order, leaders included.
    pub fn sorted_handles(&self) -> Vec<&str> {
        let mut sorted: Vec<&Entity> = self.entities.iter().collect();
        sorted.sort_by_key(|e| {
            if e.roles.contains(&Role::Leader) {
                (0, 0)
            } else {
                (1, usize::MAX - e.roles.len())
            }
        });
        sorted.into_iter().map(|e| e.handle.as_str()).collect()
    }

    /// Reads `<keyid> <Display Name> <handle>` lines.
    ///
    /// An entity with several keys has one line per key. All lines of a
    /// handle must carry the same display name and distinct key IDs.
    pub fn read_keyids(&mut self, path: &Path) -> Result<()> {
        let content = read_file(path)?;
        let mut grouped: Vec<(String, String, Vec<String>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (number, line) in numbered_lines(&content) {
            let KeyidLine {
                keyid,
                name,
                handle,
            } = parse_keyid_line(line).ok_or_else(|| Error::MalformedLine {
                path: path.to_path_buf(),
                line_number: number,
                line: line.to_string(),
                expected: "<keyid> <Display Name> <handle>",
            })?;
            validate_keyid(keyid)?;

            match positions.get(handle) {
                Some(&pos) => {
                    let (_, first_name, keyids) = &mut grouped[pos];
                    if first_name != name {
                        return Err(Error::ConflictingName {
                            path: path.to_path_buf(),
                            handle: handle.to_string(),
                            first: first_name.clone(),
                            second: name.to_string(),
                        });
                    }
                    if keyids.iter().any(|k| k == keyid) {
                        return Err(Error::DuplicateKeyId {
                            path: path.to_path_buf(),
                            handle: handle.to_string(),
                            keyid: keyid.to_string(),
                        });
                    }
                    keyids.push(keyid.to_string());
                }
                None => {
                    positions.insert(handle, grouped.len());
                    grouped.push((
                        handle.to_string(),
                        name.to_string(),
                        vec![keyid.to_string()],
                    ));
                }
            }
        }

        for (handle, name, keyids) in grouped {
            debug!(%handle, keys = keyids.len(), "read entity");
            self.add(handle, name, keyids)?;
        }
        Ok(())
    }

    /// Reads `<Display Name> <handle>` lines and grants `role` to each
    /// handle.
    pub fn read_role_file(&mut self, path: &Path, role: Role, strict: bool) -> Result<()> {
        let content = read_file(path)?;

        for (number, line) in numbered_lines(&content) {
            let parsed = parse_role_line(line).ok_or_else(|| Error::MalformedLine {
                path: path.to_path_buf(),
                line_number: number,
                line: line.to_string(),
                expected: "<Display Name> <handle>",
            })?;
            self.assign_role(parsed.handle, role)?;

            if strict
                && let Some(entity) = self.get(parsed.handle)
                && entity.name != parsed.name
            {
                return Err(Error::NameMismatch {
                    path: path.to_path_buf(),
                    handle: parsed.handle.to_string(),
                    expected: entity.name.clone(),
                    actual: parsed.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Non-blank lines with 1-based line numbers.
fn numbered_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn directory_with(roles: &[(&str, &[Role])]) -> EntityDirectory {
        let mut directory = EntityDirectory::new();
        for (handle, entity_roles) in roles {
            directory
                .add(*handle, handle.to_uppercase(), vec!["0x2DCCF53E9BC74BEC".into()])
                .unwrap();
            for role in *entity_roles {
                directory.assign_role(handle, *role).unwrap();
            }
        }
        directory
    }

    #[test]
    fn test_consistency_developer_and_leader() {
        let directory = directory_with(&[("a", &[Role::Developer, Role::Leader])]);
        assert!(directory.check_consistency().is_ok());
    }

    #[test]
    fn test_consistency_two_exclusive_roles() {
        let directory = directory_with(&[("a", &[Role::Developer, Role::Contributor])]);
        let err = directory.check_consistency().unwrap_err();
        match err {
            Error::EntityConsistency {
                handle,
                count,
                roles,
            } => {
                assert_eq!(handle, "a");
                assert_eq!(count, 2);
                assert_eq!(roles, vec![Role::Developer, Role::Contributor]);
            }
            other => panic!("expected EntityConsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_consistency_no_exclusive_role() {
        let directory = directory_with(&[("a", &[Role::Admin])]);
        let err = directory.check_consistency().unwrap_err();
        assert!(matches!(err, Error::EntityConsistency { count: 0, .. }));
    }

    #[test]
    fn test_sorted_handles() {
        let directory = directory_with(&[
            ("a", &[Role::Developer]),
            ("b", &[Role::Developer, Role::Leader]),
            ("c", &[Role::Developer, Role::Admin]),
        ]);
        assert_eq!(directory.sorted_handles(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sorted_handles_ties_keep_input_order() {
        let directory = directory_with(&[
            ("d", &[Role::Bot]),
            ("a", &[Role::Contributor]),
            ("l2", &[Role::Developer, Role::Leader]),
            ("c", &[Role::Developer, Role::Admin]),
            ("l1", &[Role::Developer, Role::Leader, Role::Admin]),
            ("b", &[Role::Developer]),
        ]);
        assert_eq!(
            directory.sorted_handles(),
            vec!["l2", "l1", "c", "d", "a", "b"]
        );
    }

    #[test]
    fn test_add_duplicate_handle() {
        let mut directory = EntityDirectory::new();
        directory.add("a", "A", vec![]).unwrap();
        let err = directory.add("a", "Other A", vec![]).unwrap_err();
        assert!(matches!(err, Error::DuplicateHandle(ref h) if h == "a"));
        assert_eq!(directory.get("a").unwrap().name, "A");
    }

    #[test]
    fn test_assign_role_unknown_handle() {
        let mut directory = EntityDirectory::new();
        let err = directory.assign_role("ghost", Role::Bot).unwrap_err();
        assert!(matches!(err, Error::UnknownHandle(ref h) if h == "ghost"));
    }

    #[test]
    fn test_is_member_of() {
        let directory = directory_with(&[("a", &[Role::Bot])]);
        assert!(directory.is_member_of("a", Role::Bot));
        assert!(!directory.is_member_of("a", Role::Leader));
        assert!(!directory.is_member_of("missing", Role::Bot));
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_keyids_groups_keys_per_handle() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "keyids",
            "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n\n0x1111222233334444 Build Bot <bot>\n0xAAAABBBBCCCCDDDD Jane Doe <jdoe>\n",
        );
        let mut directory = EntityDirectory::new();
        directory.read_keyids(&path).unwrap();

        assert_eq!(directory.len(), 2);
        let jdoe = directory.get("jdoe").unwrap();
        assert_eq!(jdoe.name, "Jane Doe");
        assert_eq!(jdoe.keyids, vec!["0x2DCCF53E9BC74BEC", "0xAAAABBBBCCCCDDDD"]);
        let order: Vec<_> = directory.iter().map(|e| e.handle.as_str()).collect();
        assert_eq!(order, vec!["jdoe", "bot"]);
    }

    #[test]
    fn test_read_keyids_conflicting_name() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "keyids",
            "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n0xAAAABBBBCCCCDDDD John Doe <jdoe>\n",
        );
        let err = EntityDirectory::new().read_keyids(&path).unwrap_err();
        assert!(matches!(err, Error::ConflictingName { ref second, .. } if second == "John Doe"));
    }

    #[test]
    fn test_read_keyids_duplicate_keyid() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "keyids",
            "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n",
        );
        let err = EntityDirectory::new().read_keyids(&path).unwrap_err();
        assert!(matches!(err, Error::DuplicateKeyId { .. }));
    }

    #[test]
    fn test_read_keyids_malformed_line() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "keyids",
            "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\nJane Doe jdoe\n",
        );
        let err = EntityDirectory::new().read_keyids(&path).unwrap_err();
        match err {
            Error::MalformedLine {
                line_number, line, ..
            } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "Jane Doe jdoe");
            }
            other => panic!("expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn test_read_keyids_invalid_keyid() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "keyids", "0xNOTHEX Jane Doe <jdoe>\n");
        let err = EntityDirectory::new().read_keyids(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyId { .. }));
    }

    #[test]
    fn test_read_keyids_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = EntityDirectory::new()
            .read_keyids(&tmp.path().join("keyids"))
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn test_read_role_file() {
        let tmp = TempDir::new().unwrap();
        let keyids = write(&tmp, "keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n");
        let developers = write(&tmp, "developers", "Jane Doe <jdoe>\n");
        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        directory
            .read_role_file(&developers, Role::Developer, true)
            .unwrap();
        assert!(directory.is_member_of("jdoe", Role::Developer));
    }

    #[test]
    fn test_read_role_file_unknown_handle() {
        let tmp = TempDir::new().unwrap();
        let keyids = write(&tmp, "keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n");
        let bots = write(&tmp, "bots", "Build Bot <bot>\n");
        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        let err = directory.read_role_file(&bots, Role::Bot, true).unwrap_err();
        assert!(matches!(err, Error::UnknownHandle(ref h) if h == "bot"));
    }

    #[test]
    fn test_read_role_file_malformed() {
        let tmp = TempDir::new().unwrap();
        let keyids = write(&tmp, "keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n");
        let leader = write(&tmp, "leader", "jdoe\n");
        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        let err = directory
            .read_role_file(&leader, Role::Leader, true)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedLine { line_number: 1, .. }));
    }

    #[test]
    fn test_read_role_file_name_mismatch_only_when_strict() {
        let tmp = TempDir::new().unwrap();
        let keyids = write(&tmp, "keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n");
        let admins = write(&tmp, "admins", "J. Doe <jdoe>\n");

        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        let err = directory
            .read_role_file(&admins, Role::Admin, true)
            .unwrap_err();
        match err {
            Error::NameMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "Jane Doe");
                assert_eq!(actual, "J. Doe");
            }
            other => panic!("expected NameMismatch, got {other:?}"),
        }

        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        directory
            .read_role_file(&admins, Role::Admin, false)
            .unwrap();
        assert!(directory.is_member_of("jdoe", Role::Admin));
    }

    #[test]
    fn test_read_role_file_leading_whitespace_is_a_mismatch() {
        let tmp = TempDir::new().unwrap();
        let keyids = write(&tmp, "keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n");
        let bots = write(&tmp, "bots", "  Jane Doe <jdoe>\n");

        let mut directory = EntityDirectory::new();
        directory.read_keyids(&keyids).unwrap();
        let err = directory.read_role_file(&bots, Role::Bot, true).unwrap_err();
        assert!(
            matches!(err, Error::NameMismatch { ref actual, .. } if actual == "  Jane Doe"),
            "{err:?}"
        );
    }
}
