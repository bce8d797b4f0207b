use chrono::Duration;
use guardpost::auth::cookie::CookieCodec;
use guardpost::auth::revocation::LIST_FILE;
use guardpost::auth::RevocationStore;
use std::fs;

fn codec() -> CookieCodec {
    CookieCodec::new(*b"0123456789abcdef0123456789abcdef")
}

#[tokio::test]
async fn revocations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cookie = codec().issue("alice", Duration::minutes(30));

    {
        let store = RevocationStore::open(dir.path()).unwrap();
        store.invalidate(&cookie);
        assert!(store.is_revoked(&cookie));
    }

    let reopened = RevocationStore::open(dir.path()).unwrap();
    assert!(reopened.is_revoked(&cookie));
}

#[tokio::test]
async fn two_stores_merge_their_revocations() {
    // Two handles over one directory stand in for two server processes
    // sharing the host.
    let dir = tempfile::tempdir().unwrap();
    let first = RevocationStore::open(dir.path()).unwrap();
    let second = RevocationStore::open(dir.path()).unwrap();

    let alice = codec().issue("alice", Duration::minutes(30));
    let bob = codec().issue("bob", Duration::minutes(30));
    first.invalidate(&alice);
    second.invalidate(&bob);

    // The write path re-reads the file under the lock, so neither entry
    // overwrote the other.
    let contents = fs::read_to_string(dir.path().join(LIST_FILE)).unwrap();
    assert!(contents.contains(&alice));
    assert!(contents.contains(&bob));

    let reopened = RevocationStore::open(dir.path()).unwrap();
    assert!(reopened.is_revoked(&alice));
    assert!(reopened.is_revoked(&bob));
}

#[tokio::test]
async fn startup_prunes_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let live = codec().issue("alice", Duration::minutes(30));
    let dead = codec().issue("bob", Duration::minutes(-5));
    fs::write(dir.path().join(LIST_FILE), format!("{dead}\n{live}\n")).unwrap();

    let store = RevocationStore::open(dir.path()).unwrap();
    assert!(store.is_revoked(&live));
    assert!(!store.is_revoked(&dead));

    // The pruned list was written back at startup.
    let contents = fs::read_to_string(dir.path().join(LIST_FILE)).unwrap();
    assert!(contents.contains(&live));
    assert!(!contents.contains(&dead));
}
