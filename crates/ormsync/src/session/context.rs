//! One session per thread.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Database, Session};
use crate::error::Result;

thread_local! {
    /// Dropped when the thread exits, which marks its sessions as orphaned.
    static ALIVE: Arc<()> = Arc::new(());
}

#[derive(Debug)]
struct ThreadSession {
    session: Session,
    alive: Weak<()>,
}

/// Hands each calling thread its own session of a database.
///
/// Sessions of threads that exited, and sessions closed directly, are
/// closed and dropped on the next call to [`current`](Self::current) or
/// [`len`](Self::len).
#[derive(Debug)]
pub struct SessionContext {
    database: Database,
    sessions: Mutex<HashMap<ThreadId, ThreadSession>>,
}

impl SessionContext {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Session of the calling thread, opened on first use or after it was closed.
    pub fn current(&self) -> Session {
        let mut sessions = self.sessions.lock();
        Self::prune(&mut sessions);
        let id = thread::current().id();
        if let Some(entry) = sessions.get(&id) {
            return entry.session.clone();
        }
        debug!("Opening session for thread {:?}", id);
        let session = self.database.session();
        sessions.insert(
            id,
            ThreadSession {
                session: session.clone(),
                alive: ALIVE.with(Arc::downgrade),
            },
        );
        session
    }

    fn prune(sessions: &mut HashMap<ThreadId, ThreadSession>) {
        sessions.retain(|id, entry| {
            if entry.session.is_closed() {
                return false;
            }
            if entry.alive.strong_count() > 0 {
                return true;
            }
            debug!("Releasing session of finished thread {:?}", id);
            if let Err(e) = entry.session.close() {
                warn!("Closing session of finished thread {:?} failed: {}", id, e);
            }
            false
        });
    }

    /// Close and forget the calling thread's session.
    pub fn close_current(&self) -> Result<()> {
        let entry = self.sessions.lock().remove(&thread::current().id());
        match entry {
            Some(entry) => entry.session.close(),
            None => Ok(()),
        }
    }

    /// Number of live threads holding an open session.
    pub fn len(&self) -> usize {
        let mut sessions = self.sessions.lock();
        Self::prune(&mut sessions);
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
