use std::sync::{Arc, Mutex, MutexGuard};
use crate::common::{Config, DataPaths, Result};
use crate::core::Verifier;
use crate::notify::{AbsenceNotifier, TwilioNotifier};
use crate::service::error::AppError;
use crate::service::session::SessionKeys;
use crate::storage::AttendanceStore;

pub struct AppState {
    pub config: Config,
    pub paths: DataPaths,
    pub store: Mutex<AttendanceStore>,
    pub verifier: Arc<Verifier>,
    pub notifier: Arc<dyn AbsenceNotifier>,
    pub sessions: SessionKeys,
}

impl AppState {
    /// Opens and seeds the database and wires the Twilio notifier.
    pub fn new(config: Config, paths: DataPaths) -> Result<Arc<Self>> {
        paths.ensure()?;

        let mut store = AttendanceStore::open(&paths.database_file, config.database.reset_on_start)?;
        store.seed_defaults(&config.roster.students)?;

        let notifier = Arc::new(TwilioNotifier::new(config.sms.clone()));
        Ok(Self::with_parts(config, paths, store, notifier))
    }

    pub fn with_parts(
        config: Config,
        paths: DataPaths,
        store: AttendanceStore,
        notifier: Arc<dyn AbsenceNotifier>,
    ) -> Arc<Self> {
        let verifier = Arc::new(Verifier::new(
            config.roster.students.clone(),
            paths.faces_dir.clone(),
            paths.recognized_dir.clone(),
        ));
        let sessions = SessionKeys::new(&config.server.session_secret);

        Arc::new(Self {
            config,
            paths,
            store: Mutex::new(store),
            verifier,
            notifier,
            sessions,
        })
    }

    /// Never hold the guard across an `.await`.
    pub fn store(&self) -> std::result::Result<MutexGuard<'_, AttendanceStore>, AppError> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("attendance store lock poisoned".into()))
    }
}
