//! Durable revocation list shared by cooperating server processes.
//!
//! Disk is the source of truth at startup and at mutation time; lookups on
//! the request path only ever touch the in-memory mirror. The on-disk list
//! is newline-delimited cookie values, each embedding its own expiration,
//! and is guarded by an advisory lock on a sibling lock file because several
//! server processes on the host may mutate it concurrently.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::cookie;
use super::error::Error;
use super::file_lock::FileLock;

pub const LIST_FILE: &str = "revocation-list";
pub const LOCK_FILE: &str = "revocation-list.lock";

const STARTUP_LOCK_ATTEMPTS: u32 = 30;
const STARTUP_LOCK_DELAY: Duration = Duration::from_secs(1);

const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(15);
const RETRY_MAX_ATTEMPTS: u32 = 10;

/// A revoked cookie value and the expiration embedded in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevokedCookie {
    pub cookie: String,
    pub expiration: DateTime<Utc>,
}

impl RevokedCookie {
    #[must_use]
    pub fn new(cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        Self {
            expiration: cookie::parse_expiration(&cookie),
            cookie,
        }
    }
}

type RevocationObserver = Box<dyn Fn(&str) + Send + Sync>;

struct Inner {
    list_path: PathBuf,
    lock_path: PathBuf,
    revoked: Mutex<VecDeque<RevokedCookie>>,
    observer: Mutex<Option<RevocationObserver>>,
}

/// Authoritative set of credentials that must no longer be accepted.
///
/// Clones share one store; the handle is cheap so background retry tasks
/// can carry it. The in-memory sequence is kept sorted ascending by
/// expiration so the earliest-expiring entries are found and pruned first.
#[derive(Clone)]
pub struct RevocationStore {
    inner: Arc<Inner>,
}

impl RevocationStore {
    /// Open (creating if necessary) the revocation list under `dir` and load
    /// it into memory.
    ///
    /// Blocks up to 30 seconds waiting for the cross-process lock; callers
    /// on an async runtime should wrap this in `spawn_blocking`. Failure to
    /// acquire the lock is fatal to process startup - the revocation list is
    /// part of the security boundary and must not be silently skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or list file cannot be created, the
    /// lock cannot be acquired within the retry budget, or the list cannot
    /// be read back.
    pub fn open(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir)?;

        let store = Self {
            inner: Arc::new(Inner {
                list_path: dir.join(LIST_FILE),
                lock_path: dir.join(LOCK_FILE),
                revoked: Mutex::new(VecDeque::new()),
                observer: Mutex::new(None),
            }),
        };

        for attempt in 0..STARTUP_LOCK_ATTEMPTS {
            let Some(_lock) = FileLock::try_exclusive(&store.inner.lock_path)? else {
                debug!(
                    "Revocation list lock held by another process (attempt {})",
                    attempt + 1
                );
                std::thread::sleep(STARTUP_LOCK_DELAY);
                continue;
            };

            if !store.inner.list_path.exists() {
                fs::write(&store.inner.list_path, "")?;
            }

            // Owner-only: any other local user able to read this file could
            // forge immunity to revocation.
            fs::set_permissions(&store.inner.list_path, fs::Permissions::from_mode(0o600))?;

            let entries = store.read_list()?;
            for entry in &entries {
                store.insert_revoked(RevokedCookie::new(entry.clone()));
            }

            // Write the pruned list back so stale entries do not accumulate.
            store.write_list(&entries)?;

            return Ok(store);
        }

        Err(Error::LockUnavailable {
            path: store.inner.lock_path.clone(),
            attempts: STARTUP_LOCK_ATTEMPTS,
        })
    }

    /// Register a callback fired after a cookie lands on the revocation
    /// list, e.g. to disconnect live connections using it.
    pub fn set_observer(&self, observer: impl Fn(&str) + Send + Sync + 'static) {
        let mut slot = self
            .inner
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Box::new(observer));
    }

    /// Whether `cookie` has been revoked.
    ///
    /// Scans the in-memory sequence only, purging expired entries as it
    /// goes; the disk is never touched on this path.
    #[must_use]
    pub fn is_revoked(&self, cookie: &str) -> bool {
        let now = Utc::now();
        let mut revoked = self
            .inner
            .revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut index = 0;
        while index < revoked.len() {
            if revoked[index].cookie == cookie {
                return true;
            }
            if revoked[index].expiration <= now {
                revoked.remove(index);
                continue;
            }
            index += 1;
        }
        false
    }

    /// Number of live entries in the in-memory sequence.
    #[must_use]
    pub fn revoked_count(&self) -> usize {
        self.inner
            .revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Add `cookie` to the revocation list, durably and across processes.
    ///
    /// Never blocks the caller on lock contention: if another process holds
    /// the lock the write is retried on an exponential backoff timer and
    /// this call returns immediately. A revocation delayed by seconds is an
    /// acceptable degradation; one lost after exhausting retries is logged
    /// as an error and the cookie stays valid until its natural expiration.
    pub fn invalidate(&self, cookie: &str) {
        if cookie.is_empty() {
            return;
        }
        match self.invalidate_with_lock(cookie) {
            Ok(()) => {}
            Err(Error::LockContended(_)) => {
                self.clone().spawn_retry(cookie.to_string());
            }
            Err(err) => error!("Could not invalidate auth cookie: {err}"),
        }
    }

    fn spawn_retry(self, cookie: String) {
        tokio::spawn(async move {
            let mut delay = RETRY_INITIAL_DELAY;
            for _ in 0..RETRY_MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                match self.invalidate_with_lock(&cookie) {
                    Ok(()) => return,
                    Err(Error::LockContended(_)) => {
                        delay = (delay * 2).min(RETRY_MAX_DELAY);
                    }
                    Err(err) => {
                        error!("Could not invalidate auth cookie: {err}");
                        return;
                    }
                }
            }
            error!(
                "Could not invalidate auth cookie - could not acquire revocation list lock at {}",
                self.inner.lock_path.display()
            );
        });
    }

    /// One locked read-modify-write cycle against the on-disk list.
    ///
    /// The file lock encloses the disk cycle; the in-memory mutex encloses
    /// only the cache mutation afterwards. The two are never nested.
    pub(crate) fn invalidate_with_lock(&self, cookie: &str) -> Result<(), Error> {
        let Some(_lock) = FileLock::try_exclusive(&self.inner.lock_path)? else {
            return Err(Error::LockContended(self.inner.lock_path.clone()));
        };

        // Re-read under the lock: another process may have appended entries
        // since our last read.
        let mut entries = self.read_list()?;
        if !entries.iter().any(|entry| entry == cookie) {
            entries.push(cookie.to_string());
        }
        self.write_list(&entries)?;

        self.insert_revoked(RevokedCookie::new(cookie.to_string()));
        self.notify_revoked(cookie);
        Ok(())
    }

    /// Sorted insert keeping ascending expiration order.
    ///
    /// Already-expired cookies and duplicates are dropped.
    pub(crate) fn insert_revoked(&self, cookie: RevokedCookie) {
        if cookie.expiration <= Utc::now() {
            return;
        }

        let mut revoked = self
            .inner
            .revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if revoked.iter().any(|other| other.cookie == cookie.cookie) {
            return;
        }
        let position = revoked
            .iter()
            .position(|other| other.expiration > cookie.expiration)
            .unwrap_or(revoked.len());
        revoked.insert(position, cookie);
    }

    /// Read the on-disk list, dropping expired and malformed entries.
    ///
    /// A corrupt line must not fail the whole security check: skip it,
    /// keep evaluating the rest, and say so in the log, once per read.
    fn read_list(&self) -> Result<Vec<String>, Error> {
        let now = Utc::now();
        let contents = fs::read_to_string(&self.inner.list_path)?;
        let mut malformed = 0usize;
        let entries: Vec<String> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|entry| {
                if !entry.contains('|') {
                    malformed += 1;
                    return false;
                }
                cookie::parse_expiration(entry) > now
            })
            .map(str::to_string)
            .collect();
        if malformed > 0 {
            warn!(
                "Dropped {malformed} malformed entries from {}",
                self.inner.list_path.display()
            );
        }
        Ok(entries)
    }

    fn write_list(&self, entries: &[String]) -> Result<(), Error> {
        let mut contents = entries.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(&self.inner.list_path, contents)?;
        Ok(())
    }

    fn notify_revoked(&self, cookie: &str) {
        let observer = self
            .inner
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(callback) = observer.as_ref() {
            callback(cookie);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookie::CookieCodec;
    use chrono::Duration as TimeDelta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn codec() -> CookieCodec {
        CookieCodec::new(*b"0123456789abcdef0123456789abcdef")
    }

    fn live_cookie(username: &str) -> String {
        codec().issue(username, TimeDelta::minutes(10))
    }

    #[tokio::test]
    async fn invalidate_then_is_revoked() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = RevocationStore::open(dir.path()).unwrap();

        let cookie = live_cookie("alice");
        assert!(!store.is_revoked(&cookie));
        store.invalidate(&cookie);
        assert!(store.is_revoked(&cookie));
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = RevocationStore::open(dir.path()).unwrap();

        let cookie = live_cookie("alice");
        store.invalidate(&cookie);
        store.invalidate(&cookie);

        assert!(store.is_revoked(&cookie));
        assert_eq!(store.revoked_count(), 1);

        let contents = fs::read_to_string(dir.path().join(LIST_FILE)).unwrap_or_default();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn expired_cookie_is_never_considered_revoked() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = RevocationStore::open(dir.path()).unwrap();

        let stale = codec().issue("alice", TimeDelta::minutes(-10));
        store.invalidate(&stale);
        assert!(!store.is_revoked(&stale));
        assert_eq!(store.revoked_count(), 0);
    }

    #[test]
    fn insert_keeps_ascending_expiration_order() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = RevocationStore::open(dir.path()).unwrap();

        let late = codec().issue("late", TimeDelta::minutes(30));
        let early = codec().issue("early", TimeDelta::minutes(5));
        let middle = codec().issue("middle", TimeDelta::minutes(15));

        store.insert_revoked(RevokedCookie::new(late.clone()));
        store.insert_revoked(RevokedCookie::new(early.clone()));
        store.insert_revoked(RevokedCookie::new(middle.clone()));

        let revoked = store.inner.revoked.lock().unwrap();
        let order: Vec<&str> = revoked.iter().map(|entry| entry.cookie.as_str()).collect();
        assert_eq!(order, vec![early.as_str(), middle.as_str(), late.as_str()]);
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let good = live_cookie("alice");
        fs::write(
            dir.path().join(LIST_FILE),
            format!("garbage-without-delimiters\n{good}\nmore garbage\n"),
        )
        .unwrap();

        let store = RevocationStore::open(dir.path()).unwrap();
        assert!(store.is_revoked(&good));
        assert_eq!(store.revoked_count(), 1);

        // Startup rewrote the list pruned of the corrupt lines.
        let contents = fs::read_to_string(dir.path().join(LIST_FILE)).unwrap();
        assert_eq!(contents, format!("{good}\n"));
    }

    #[tokio::test]
    async fn observer_fires_on_revocation() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = RevocationStore::open(dir.path()).unwrap();
        static FIRED: AtomicUsize = AtomicUsize::new(0);
        store.set_observer(|_cookie| {
            FIRED.fetch_add(1, Ordering::SeqCst);
        });

        store.invalidate(&live_cookie("alice"));
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn list_file_is_owner_only() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let _store = RevocationStore::open(dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join(LIST_FILE))
            .map(|meta| meta.permissions().mode() & 0o777)
            .unwrap_or(0);
        assert_eq!(mode, 0o600);
    }
}
