use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("keyring-audit").unwrap();
    cmd.env_remove("KEYRING_AUDIT_BASE_DIR")
        .env_remove("KEYRING_AUDIT_KEYRING_DIR")
        .env_remove("KEYRING_AUDIT_MIN_KEY_SIZE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn requires_an_action() {
    cmd()
        .assert()
        .failure()
        .code(2)
        .stderr(contains("--output-file, --show-output, --consistency-check"));
}

#[test]
fn prints_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn reports_malformed_keyids_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("keyids"), "0x2DCCF53E9BC74BEC Jane Doe jdoe\n").unwrap();

    cmd()
        .arg("--base-dir")
        .arg(tmp.path())
        .arg("--consistency-check")
        .assert()
        .failure()
        .stderr(contains("failed to read the keyids and role files"))
        .stderr(contains("keyids:1"));
}

#[test]
fn reports_inconsistent_roles_before_touching_keys() {
    let tmp = TempDir::new().unwrap();
    let files = [
        ("keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n"),
        ("leader", ""),
        ("admins", "Jane Doe <jdoe>\n"),
        ("developers", ""),
        ("contributors", ""),
        ("bots", ""),
    ];
    for (name, content) in files {
        fs::write(tmp.path().join(name), content).unwrap();
    }

    cmd()
        .env("KEYRING_AUDIT_BASE_DIR", tmp.path())
        .args(["-c", "--no-consistency-check-git"])
        .assert()
        .failure()
        .stderr(contains("entity consistency check failed"))
        .stderr(contains("jdoe"));
}

#[test]
fn reports_unknown_handle_in_role_file() {
    let tmp = TempDir::new().unwrap();
    let files = [
        ("keyids", "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n"),
        ("leader", "Ghost <ghost>\n"),
    ];
    for (name, content) in files {
        fs::write(tmp.path().join(name), content).unwrap();
    }

    cmd()
        .arg("--base-dir")
        .arg(tmp.path())
        .arg("--no-consistency-check")
        .arg("--show-output")
        .assert()
        .failure()
        .stderr(contains("handle ghost is not present in the keyid file"));
}

#[test]
fn rendering_rejects_member_with_two_exclusive_roles() {
    let tmp = TempDir::new().unwrap();
    let files = [
        (
            "keyids",
            "0x2DCCF53E9BC74BEC Jane Doe <jdoe>\n0x5555666677778888 CI Bot <cbot>\n",
        ),
        ("leader", ""),
        ("admins", ""),
        ("developers", "Jane Doe <jdoe>\n"),
        ("contributors", "CI Bot <cbot>\n"),
        ("bots", "CI Bot <cbot>\n"),
    ];
    for (name, content) in files {
        fs::write(tmp.path().join(name), content).unwrap();
    }

    for args in [
        &["-s", "--no-consistency-check"][..],
        &["-s", "--no-consistency-check-keyring", "--no-consistency-check-git"][..],
    ] {
        cmd()
            .arg("--base-dir")
            .arg(tmp.path())
            .args(args)
            .assert()
            .failure()
            .stdout("")
            .stderr(contains("cannot group entities by role"))
            .stderr(contains("entity cbot is member of 2 mutually exclusive roles"));
    }
}
