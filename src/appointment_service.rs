use crate::backend::AppointmentBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{AppointmentError, NOT_A_PROVIDER, PAST_DATE, SLOT_UNAVAILABLE};
use crate::request::CreateAppointmentRequest;
use crate::types::{
    Appointment, AppointmentSummary, AuthenticatedUser, AvatarSummary, File, NewAppointment,
    ProviderSummary, User,
};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

pub const PAGE_SIZE: i64 = 20;

pub struct AppointmentService<B, K = SystemClock> {
    backend: B,
    clock: K,
    files_url: String,
}

impl<B: AppointmentBackend> AppointmentService<B> {
    pub fn new(backend: B, files_url: impl Into<String>) -> Self {
        Self::with_clock(backend, SystemClock, files_url)
    }
}

impl<B: AppointmentBackend, K: Clock> AppointmentService<B, K> {
    pub fn with_clock(backend: B, clock: K, files_url: impl Into<String>) -> Self {
        Self {
            backend,
            clock,
            files_url: files_url.into(),
        }
    }

    /// Active appointments of the caller, 20 per page, each with the
    /// provider's profile and avatar.
    pub fn list_appointments(
        &self,
        user: AuthenticatedUser,
        page: Option<i64>,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(AppointmentError::validation());
        }
        let offset = (page - 1)
            .checked_mul(PAGE_SIZE)
            .ok_or_else(AppointmentError::validation)?;

        let appointments = self
            .backend
            .appointments_of_user(user.id(), PAGE_SIZE, offset)?;

        let mut provider_ids: Vec<i32> = appointments.iter().map(|a| a.provider_id).collect();
        provider_ids.sort_unstable();
        provider_ids.dedup();

        let providers = if provider_ids.is_empty() {
            HashMap::new()
        } else {
            self.backend
                .users_with_avatars(&provider_ids)?
                .into_iter()
                .map(|(provider, avatar)| (provider.id, self.provider_summary(provider, avatar)))
                .collect()
        };

        debug!(user = user.id(), page, count = appointments.len(), "Listed appointments");
        Ok(appointments
            .into_iter()
            .map(|appointment| AppointmentSummary {
                id: appointment.id,
                date: appointment.date,
                provider: providers.get(&appointment.provider_id).cloned(),
            })
            .collect())
    }

    /// Books the slot for the caller. Checks run in order and the first
    /// failing one ends the request.
    pub fn create_appointment(
        &self,
        user: AuthenticatedUser,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let request = request.validated().ok_or_else(AppointmentError::validation)?;

        if self.backend.find_provider(request.provider_id)?.is_none() {
            return Err(AppointmentError::Authorization(NOT_A_PROVIDER.into()));
        }

        let hour_start = start_of_hour(request.date)?;

        if hour_start < self.clock.now() {
            return Err(AppointmentError::Validation(PAST_DATE.into()));
        }

        if self
            .backend
            .find_active_appointment(request.provider_id, hour_start)?
            .is_some()
        {
            return Err(AppointmentError::Conflict(SLOT_UNAVAILABLE.into()));
        }

        let appointment = self.backend.create_appointment(NewAppointment {
            user_id: user.id(),
            provider_id: request.provider_id,
            date: hour_start,
        })?;

        info!(
            id = appointment.id,
            user = appointment.user_id,
            provider = appointment.provider_id,
            date = %appointment.date,
            "Appointment created"
        );
        Ok(appointment)
    }

    fn provider_summary(&self, provider: User, avatar: Option<File>) -> ProviderSummary {
        ProviderSummary {
            id: provider.id,
            name: provider.name,
            avatar: avatar.map(|file| AvatarSummary {
                url: file.url(&self.files_url),
                id: file.id,
                path: file.path,
            }),
        }
    }
}

pub fn start_of_hour(date: DateTime<Utc>) -> Result<DateTime<Utc>, AppointmentError> {
    date.duration_trunc(TimeDelta::hours(1))
        .map_err(|_| AppointmentError::validation())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::MockAppointmentBackend;
    use crate::error::{BackendError, VALIDATION_FAILED};
    use crate::testutils::FixedClock;
    use chrono::TimeZone;
    use mockall::predicate::eq;
    use serde_json::json;

    const CALLER: AuthenticatedUser = AuthenticatedUser(1);
    const PROVIDER_ID: i32 = 2;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2029, 12, 31, 8, 15, 0).unwrap()
    }

    fn service(
        backend: MockAppointmentBackend,
    ) -> AppointmentService<MockAppointmentBackend, FixedClock> {
        AppointmentService::with_clock(backend, FixedClock(now()), "http://localhost:3333/files")
    }

    fn provider() -> User {
        User {
            id: PROVIDER_ID,
            name: "Jane Barber".into(),
            email: "jane@example.com".into(),
            provider: true,
            avatar_id: Some(5),
        }
    }

    fn appointment(id: i32, provider_id: i32, date: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            date,
            user_id: CALLER.id(),
            provider_id,
            canceled_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn request(body: serde_json::Value) -> CreateAppointmentRequest {
        serde_json::from_value(body).unwrap()
    }

    fn assert_validation(err: AppointmentError, expected: &str) {
        assert!(
            matches!(&err, AppointmentError::Validation(msg) if msg == expected),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn create_normalizes_to_start_of_hour() {
        let hour_start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .with(eq(PROVIDER_ID))
            .times(1)
            .returning(|_| Ok(Some(provider())));
        backend
            .expect_find_active_appointment()
            .with(eq(PROVIDER_ID), eq(hour_start))
            .times(1)
            .returning(|_, _| Ok(None));
        backend
            .expect_create_appointment()
            .with(eq(NewAppointment {
                user_id: CALLER.id(),
                provider_id: PROVIDER_ID,
                date: hour_start,
            }))
            .times(1)
            .returning(|new| Ok(appointment(10, new.provider_id, new.date)));

        let created = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": PROVIDER_ID, "date": "2030-01-01T10:30:00Z" })),
            )
            .unwrap();

        assert_eq!(created.id, 10);
        assert_eq!(created.date, hour_start);
        assert_eq!(created.user_id, CALLER.id());
        assert_eq!(created.canceled_at, None);
    }

    #[test]
    fn invalid_payload_touches_no_storage() {
        let mut backend = MockAppointmentBackend::new();
        backend.expect_find_provider().never();
        backend.expect_find_active_appointment().never();
        backend.expect_create_appointment().never();

        let err = service(backend)
            .create_appointment(CALLER, request(json!({ "date": "2030-01-01T10:30:00Z" })))
            .unwrap_err();
        assert_validation(err, VALIDATION_FAILED);
    }

    #[test]
    fn non_provider_is_rejected_before_date_checks() {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .times(1)
            .returning(|_| Ok(None));
        backend.expect_find_active_appointment().never();
        backend.expect_create_appointment().never();

        // a past date would also fail, but the provider check comes first
        let err = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": 3, "date": "2000-01-01T10:00:00Z" })),
            )
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Authorization(msg) if msg == NOT_A_PROVIDER));
    }

    #[test_case::test_case("2029-12-31T07:59:59Z" ; "previous hour")]
    #[test_case::test_case("2029-12-31T08:20:00Z" ; "current hour already started")]
    #[test_case::test_case("2001-05-05T10:00:00Z" ; "long ago")]
    fn past_hour_is_rejected(date: &str) {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .returning(|_| Ok(Some(provider())));
        backend.expect_find_active_appointment().never();
        backend.expect_create_appointment().never();

        let err = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": PROVIDER_ID, "date": date })),
            )
            .unwrap_err();
        assert_validation(err, PAST_DATE);
    }

    #[test]
    fn occupied_slot_is_rejected() {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .returning(|_| Ok(Some(provider())));
        backend
            .expect_find_active_appointment()
            .returning(|provider_id, date| Ok(Some(appointment(4, provider_id, date))));
        backend.expect_create_appointment().never();

        let err = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": PROVIDER_ID, "date": "2030-01-01T10:59:59Z" })),
            )
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Conflict(msg) if msg == SLOT_UNAVAILABLE));
    }

    #[test]
    fn slot_taken_while_persisting_is_a_conflict() {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .returning(|_| Ok(Some(provider())));
        backend
            .expect_find_active_appointment()
            .returning(|_, _| Ok(None));
        backend
            .expect_create_appointment()
            .times(1)
            .returning(|_| Err(BackendError::SlotTaken));

        let err = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": PROVIDER_ID, "date": "2030-01-01T10:00:00Z" })),
            )
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Conflict(_)));
    }

    #[test]
    fn storage_failure_propagates() {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_find_provider()
            .returning(|_| Err(BackendError::LockPoisoned));
        backend.expect_create_appointment().never();

        let err = service(backend)
            .create_appointment(
                CALLER,
                request(json!({ "provider_id": PROVIDER_ID, "date": "2030-01-01T10:00:00Z" })),
            )
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Backend(BackendError::LockPoisoned)));
    }

    #[test_case::test_case(None, 0 ; "defaults to first page")]
    #[test_case::test_case(Some(1), 0 ; "first page")]
    #[test_case::test_case(Some(3), 40 ; "third page")]
    fn list_pages_by_twenty(page: Option<i64>, offset: i64) {
        let mut backend = MockAppointmentBackend::new();
        backend
            .expect_appointments_of_user()
            .with(eq(CALLER.id()), eq(PAGE_SIZE), eq(offset))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        backend.expect_users_with_avatars().never();

        let listed = service(backend).list_appointments(CALLER, page).unwrap();
        assert!(listed.is_empty());
    }

    #[test_case::test_case(0 ; "zero")]
    #[test_case::test_case(-2 ; "negative")]
    fn list_rejects_pages_below_one(page: i64) {
        let mut backend = MockAppointmentBackend::new();
        backend.expect_appointments_of_user().never();

        let err = service(backend).list_appointments(CALLER, Some(page)).unwrap_err();
        assert_validation(err, VALIDATION_FAILED);
    }

    #[test]
    fn list_attaches_provider_and_avatar() {
        let first = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2030, 1, 1, 11, 0, 0).unwrap();
        let third = Utc.with_ymd_and_hms(2030, 1, 2, 11, 0, 0).unwrap();

        let mut backend = MockAppointmentBackend::new();
        backend.expect_appointments_of_user().returning(move |_, _, _| {
            Ok(vec![
                appointment(1, PROVIDER_ID, first),
                appointment(2, 3, second),
                appointment(3, PROVIDER_ID, third),
            ])
        });
        backend
            .expect_users_with_avatars()
            .withf(|ids| ids.to_vec() == vec![PROVIDER_ID, 3])
            .times(1)
            .returning(|_| {
                Ok(vec![
                    (
                        provider(),
                        Some(File {
                            id: 5,
                            name: "jane.png".into(),
                            path: "a1b2c3.png".into(),
                        }),
                    ),
                    (
                        User {
                            id: 3,
                            name: "John Stylist".into(),
                            email: "john@example.com".into(),
                            provider: true,
                            avatar_id: None,
                        },
                        None,
                    ),
                ])
            });

        let listed = service(backend).list_appointments(CALLER, None).unwrap();

        assert_eq!(listed.len(), 3);
        assert_eq!(
            listed[0],
            AppointmentSummary {
                id: 1,
                date: first,
                provider: Some(ProviderSummary {
                    id: PROVIDER_ID,
                    name: "Jane Barber".into(),
                    avatar: Some(AvatarSummary {
                        id: 5,
                        path: "a1b2c3.png".into(),
                        url: "http://localhost:3333/files/a1b2c3.png".into(),
                    }),
                }),
            }
        );
        let john = listed[1].provider.as_ref().unwrap();
        assert_eq!(john.name, "John Stylist");
        assert_eq!(john.avatar, None);
        assert_eq!(listed[2].provider, listed[0].provider);
    }

    #[test]
    fn start_of_hour_zeroes_minutes_seconds_and_millis() {
        let date = Utc.with_ymd_and_hms(2030, 1, 1, 10, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999);
        assert_eq!(
            start_of_hour(date).unwrap(),
            Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap()
        );
    }
}
