use crate::schema::{appointments, files, users};
use crate::types::{Appointment, File, NewAppointment, User};
use crate::{backend::AppointmentBackend, error::BackendError};
use chrono::{DateTime, Utc};
use diesel::{
    Connection, ConnectionError, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    RunQueryDsl, SelectableHelper,
};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    fn connection(&self) -> Result<MutexGuard<'_, PgConnection>, BackendError> {
        self.connection.lock().map_err(|_| BackendError::LockPoisoned)
    }
}

impl AppointmentBackend for DatabaseInterface {
    fn find_provider(&self, id: i32) -> Result<Option<User>, BackendError> {
        let mut connection = self.connection()?;
        let provider = users::table
            .filter(users::id.eq(id))
            .filter(users::provider.eq(true))
            .select(User::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(provider)
    }

    fn appointments_of_user(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Appointment>, BackendError> {
        let mut connection = self.connection()?;
        let result = appointments::table
            .filter(appointments::user_id.eq(user_id))
            .filter(appointments::canceled_at.is_null())
            .order((appointments::date.asc(), appointments::id.asc()))
            .limit(limit)
            .offset(offset)
            .select(Appointment::as_select())
            .load(&mut *connection)?;
        Ok(result)
    }

    fn users_with_avatars(&self, ids: &[i32]) -> Result<Vec<(User, Option<File>)>, BackendError> {
        let mut connection = self.connection()?;
        let result = users::table
            .left_join(files::table)
            .filter(users::id.eq_any(ids.to_vec()))
            .order(users::id.asc())
            .select((User::as_select(), Option::<File>::as_select()))
            .load(&mut *connection)?;
        Ok(result)
    }

    fn find_active_appointment(
        &self,
        provider_id: i32,
        date: DateTime<Utc>,
    ) -> Result<Option<Appointment>, BackendError> {
        let mut connection = self.connection()?;
        let result = appointments::table
            .filter(appointments::provider_id.eq(provider_id))
            .filter(appointments::canceled_at.is_null())
            .filter(appointments::date.eq(date))
            .select(Appointment::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(result)
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, BackendError> {
        let mut connection = self.connection()?;

        // the partial unique index on active slots backs this up across
        // connections; a violation surfaces as SlotTaken as well
        connection.transaction(|connection| {
            let taken = appointments::table
                .filter(appointments::provider_id.eq(appointment.provider_id))
                .filter(appointments::canceled_at.is_null())
                .filter(appointments::date.eq(appointment.date))
                .select(appointments::id)
                .first::<i32>(connection)
                .optional()?;
            if taken.is_some() {
                return Err(BackendError::SlotTaken);
            }

            let created = diesel::insert_into(appointments::table)
                .values(&appointment)
                .returning(Appointment::as_returning())
                .get_result(connection)?;
            Ok(created)
        })
    }
}
