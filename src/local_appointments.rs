use crate::{
    backend::AppointmentBackend,
    error::BackendError,
    types::{Appointment, File, NewAppointment, User},
};
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Store {
    users: HashMap<i32, User>,
    files: HashMap<i32, File>,
    appointments: BTreeMap<i32, Appointment>,
    next_user_id: i32,
    next_file_id: i32,
    next_appointment_id: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// In-memory storage, used when no database is configured. Nothing survives
/// a restart.
#[derive(Debug, Clone, Default)]
pub struct LocalAppointments {
    store: Arc<Mutex<Store>>,
}

impl LocalAppointments {
    fn store(&self) -> Result<MutexGuard<'_, Store>, BackendError> {
        self.store.lock().map_err(|_| BackendError::LockPoisoned)
    }

    pub fn add_user(&self, name: &str, email: &str, provider: bool) -> Result<User, BackendError> {
        let mut store = self.store()?;
        let id = next_id(&mut store.next_user_id);
        let user = User {
            id,
            name: name.into(),
            email: email.into(),
            provider,
            avatar_id: None,
        };
        store.users.insert(id, user.clone());
        Ok(user)
    }

    /// Stores a file reference and makes it the avatar of the user.
    pub fn add_avatar(&self, user_id: i32, name: &str, path: &str) -> Result<File, BackendError> {
        let mut store = self.store()?;
        let id = next_id(&mut store.next_file_id);
        let file = File {
            id,
            name: name.into(),
            path: path.into(),
        };
        store.files.insert(id, file.clone());
        if let Some(user) = store.users.get_mut(&user_id) {
            user.avatar_id = Some(id);
        } else {
            warn!(user_id, "Avatar stored for unknown user");
        }
        Ok(file)
    }

    #[cfg(test)]
    pub fn cancel_appointment(&self, id: i32, at: DateTime<Utc>) -> Result<bool, BackendError> {
        let mut store = self.store()?;
        Ok(match store.appointments.get_mut(&id) {
            Some(appointment) if appointment.is_active() => {
                appointment.canceled_at = Some(at);
                appointment.updated_at = at;
                true
            }
            _ => false,
        })
    }

    pub fn insert_example_users(&self) -> Result<(), BackendError> {
        let client = self.add_user("Example Client", "client@example.com", false)?;
        let barber = self.add_user("Jane Barber", "jane@example.com", true)?;
        self.add_avatar(barber.id, "jane.png", "example-jane.png")?;
        let stylist = self.add_user("John Stylist", "john@example.com", true)?;
        info!(
            client = client.id,
            providers = ?[barber.id, stylist.id],
            "Inserted example users"
        );
        Ok(())
    }
}

impl AppointmentBackend for LocalAppointments {
    fn find_provider(&self, id: i32) -> Result<Option<User>, BackendError> {
        Ok(self
            .store()?
            .users
            .get(&id)
            .filter(|user| user.provider)
            .cloned())
    }

    fn appointments_of_user(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Appointment>, BackendError> {
        let store = self.store()?;
        let mut appointments: Vec<Appointment> = store
            .appointments
            .values()
            .filter(|appointment| appointment.user_id == user_id && appointment.is_active())
            .cloned()
            .collect();
        appointments.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(appointments.into_iter().skip(offset).take(limit).collect())
    }

    fn users_with_avatars(&self, ids: &[i32]) -> Result<Vec<(User, Option<File>)>, BackendError> {
        let store = self.store()?;
        Ok(ids
            .iter()
            .filter_map(|id| store.users.get(id))
            .map(|user| {
                let avatar = user.avatar_id.and_then(|id| store.files.get(&id)).cloned();
                (user.clone(), avatar)
            })
            .collect())
    }

    fn find_active_appointment(
        &self,
        provider_id: i32,
        date: DateTime<Utc>,
    ) -> Result<Option<Appointment>, BackendError> {
        Ok(self
            .store()?
            .appointments
            .values()
            .find(|a| a.provider_id == provider_id && a.date == date && a.is_active())
            .cloned())
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, BackendError> {
        let mut store = self.store()?;

        // check and insert under the same guard
        let taken = store.appointments.values().any(|a| {
            a.provider_id == appointment.provider_id && a.date == appointment.date && a.is_active()
        });
        if taken {
            return Err(BackendError::SlotTaken);
        }

        let now = Utc::now();
        let id = next_id(&mut store.next_appointment_id);
        let appointment = Appointment {
            id,
            date: appointment.date,
            user_id: appointment.user_id,
            provider_id: appointment.provider_id,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        };
        store.appointments.insert(id, appointment.clone());
        Ok(appointment)
    }
}
