use crate::error::BackendError;
use crate::types::{Appointment, File, NewAppointment, User};
use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
pub trait AppointmentBackend: Send + Sync + 'static {
    /// User with the given id, if it exists and is flagged as provider.
    fn find_provider(&self, id: i32) -> Result<Option<User>, BackendError>;

    /// Active appointments of a user, ascending by date.
    fn appointments_of_user(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Appointment>, BackendError>;

    fn users_with_avatars(&self, ids: &[i32]) -> Result<Vec<(User, Option<File>)>, BackendError>;

    fn find_active_appointment(
        &self,
        provider_id: i32,
        date: DateTime<Utc>,
    ) -> Result<Option<Appointment>, BackendError>;

    /// Stores the appointment. Fails with [`BackendError::SlotTaken`] if the
    /// slot got booked in the meantime.
    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, BackendError>;
}
