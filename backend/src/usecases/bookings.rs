use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{
        bookings::{BookingEntity, InsertBookingEntity},
        memberships::MembershipEntity,
        visits::InsertVisitEntity,
    },
    repositories::{
        bookings::BookingRepository, gym_classes::GymClassRepository,
        memberships::MembershipRepository, plans::PlanRepository,
        selected_gyms::SelectedGymRepository,
    },
    value_objects::{bookings::BookingDto, enums::booking_statuses::BookingStatus},
};
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    credit_ledger::CreditLedger,
    errors::{MembershipError, UseCaseResult},
    gym_slots::GymSlotScheduler,
    member_locks::{MemberGuard, MemberLocks},
};

const DEFAULT_VISIT_CREDITS: u32 = 1;

struct NewBooking {
    gym_id: Option<Uuid>,
    class_id: Option<Uuid>,
    credits: u32,
    valid_until: DateTime<Utc>,
}

pub struct BookingService<M, P, S, B, C>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    C: GymClassRepository + Send + Sync + 'static,
{
    membership_repo: Arc<M>,
    booking_repo: Arc<B>,
    class_repo: Arc<C>,
    ledger: Arc<CreditLedger<M>>,
    scheduler: Arc<GymSlotScheduler<M, P, S>>,
    locks: Arc<MemberLocks>,
    direct_visit_validity: chrono::Duration,
}

impl<M, P, S, B, C> BookingService<M, P, S, B, C>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    C: GymClassRepository + Send + Sync + 'static,
{
    pub fn new(
        membership_repo: Arc<M>,
        booking_repo: Arc<B>,
        class_repo: Arc<C>,
        ledger: Arc<CreditLedger<M>>,
        scheduler: Arc<GymSlotScheduler<M, P, S>>,
        locks: Arc<MemberLocks>,
        direct_visit_validity: chrono::Duration,
    ) -> Self {
        Self {
            membership_repo,
            booking_repo,
            class_repo,
            ledger,
            scheduler,
            locks,
            direct_visit_validity,
        }
    }

    pub async fn book_direct_visit(
        &self,
        member_id: Uuid,
        gym_id: Uuid,
        credits_to_use: Option<u32>,
    ) -> UseCaseResult<BookingDto> {
        let credits = credits_to_use.unwrap_or(DEFAULT_VISIT_CREDITS);
        if credits == 0 {
            return Err(MembershipError::InvalidBookingState(
                "a visit costs at least one credit".to_string(),
            ));
        }

        let guard = self.locks.lock(member_id).await;
        let now = Utc::now();

        let membership = self.load_active_membership(member_id).await?;
        self.ensure_no_blocking_booking(member_id, now).await?;

        if self.scheduler.has_daily_access(&membership).await?
            && !self.scheduler.is_gym_usable_guarded(&guard, gym_id, now).await?
        {
            warn!(%member_id, %gym_id, "bookings: gym outside daily access selection");
            return Err(MembershipError::GymNotInSelection);
        }

        let booking = NewBooking {
            gym_id: Some(gym_id),
            class_id: None,
            credits,
            valid_until: now + self.direct_visit_validity,
        };

        self.charge_and_insert(&guard, booking, now).await
    }

    pub async fn book_class(&self, member_id: Uuid, class_id: Uuid) -> UseCaseResult<BookingDto> {
        let guard = self.locks.lock(member_id).await;
        let now = Utc::now();

        let class = self
            .class_repo
            .find_by_id(class_id)
            .await
            .map_err(|err| {
                error!(%member_id, %class_id, db_error = ?err, "bookings: failed to load class");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("class"))?;

        if class.ends_at <= now {
            warn!(%member_id, %class_id, "bookings: class already ended");
            return Err(MembershipError::InvalidBookingState(
                "class has already ended".to_string(),
            ));
        }

        let credits = u32::try_from(class.credits).unwrap_or(0);
        if credits == 0 {
            warn!(%member_id, %class_id, "bookings: class has no credit price");
            return Err(MembershipError::InvalidBookingState(
                "class costs no credits".to_string(),
            ));
        }

        self.load_active_membership(member_id).await?;
        self.ensure_no_blocking_booking(member_id, now).await?;

        let booking = NewBooking {
            gym_id: Some(class.gym_id),
            class_id: Some(class.id),
            credits,
            valid_until: class.ends_at,
        };

        self.charge_and_insert(&guard, booking, now).await
    }

    /// Cancels on behalf of `member_id`, hiding bookings owned by someone else.
    pub async fn cancel_member_booking(&self, member_id: Uuid, booking_id: Uuid) -> UseCaseResult<()> {
        self.ensure_owner(member_id, booking_id).await?;
        self.cancel_booking(booking_id).await
    }

    /// Deletes a confirmed booking, cancels its visit and refunds its credits.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> UseCaseResult<()> {
        let booking = self.load_booking(booking_id).await?;
        let member_id = booking.member_id;
        let _guard = self.locks.lock(member_id).await;

        // Re-read under the lock; a concurrent cancel or completion may have won.
        let booking = self.load_booking(booking_id).await?;
        if booking.booking_status() == Some(BookingStatus::Completed) {
            warn!(%member_id, %booking_id, "bookings: completed booking cannot be cancelled");
            return Err(MembershipError::InvalidBookingState(
                "booking is already completed".to_string(),
            ));
        }

        let membership = self.load_active_membership(member_id).await?;
        let refund = booking.credits_used.max(0);

        let balance = self
            .booking_repo
            .cancel_and_refund(booking_id, membership.id, refund)
            .await
            .map_err(|err| {
                error!(%member_id, %booking_id, db_error = ?err, "bookings: cancel failed");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("booking"))?;

        info!(
            %member_id,
            %booking_id,
            credits = refund,
            remaining = balance.remaining,
            "bookings: booking cancelled"
        );
        Ok(())
    }

    pub async fn complete_member_booking(
        &self,
        member_id: Uuid,
        booking_id: Uuid,
    ) -> UseCaseResult<BookingDto> {
        self.ensure_owner(member_id, booking_id).await?;
        self.complete_booking(booking_id).await
    }

    /// `confirmed -> completed`. Completing twice returns the same booking.
    pub async fn complete_booking(&self, booking_id: Uuid) -> UseCaseResult<BookingDto> {
        let booking = self.load_booking(booking_id).await?;
        let member_id = booking.member_id;

        if booking.booking_status() == Some(BookingStatus::Completed) {
            return Ok(BookingDto::from(booking));
        }

        let _guard = self.locks.lock(member_id).await;

        let completed = self
            .booking_repo
            .mark_completed(booking_id, Utc::now())
            .await
            .map_err(|err| {
                error!(%member_id, %booking_id, db_error = ?err, "bookings: completion failed");
                MembershipError::Internal(err)
            })?;

        match completed {
            Some(booking) => {
                info!(%member_id, %booking_id, "bookings: booking completed");
                Ok(BookingDto::from(booking))
            }
            None => {
                let current = self.load_booking(booking_id).await?;
                match current.booking_status() {
                    Some(BookingStatus::Completed) => Ok(BookingDto::from(current)),
                    _ => Err(MembershipError::InvalidBookingState(format!(
                        "booking is {}",
                        current.status
                    ))),
                }
            }
        }
    }

    pub async fn list_bookings(&self, member_id: Uuid) -> UseCaseResult<Vec<BookingDto>> {
        let bookings = self
            .booking_repo
            .list_by_member(member_id)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "bookings: failed to list bookings");
                MembershipError::Internal(err)
            })?;

        Ok(bookings.into_iter().map(BookingDto::from).collect())
    }

    async fn charge_and_insert(
        &self,
        guard: &MemberGuard,
        booking: NewBooking,
        now: DateTime<Utc>,
    ) -> UseCaseResult<BookingDto> {
        let member_id = guard.member_id();
        self.ledger.charge_guarded(guard, booking.credits).await?;

        let booking_id = Uuid::new_v4();
        let credits_used = i32::try_from(booking.credits).unwrap_or(i32::MAX);
        let insert = InsertBookingEntity {
            id: booking_id,
            member_id,
            gym_id: booking.gym_id,
            class_id: booking.class_id,
            credits_used,
            status: BookingStatus::Confirmed.to_string(),
            check_in_code: generate_check_in_code(),
            valid_until: booking.valid_until,
            created_at: now,
        };
        let visit = InsertVisitEntity {
            id: Uuid::new_v4(),
            booking_id,
            member_id,
            gym_id: booking.gym_id,
            credits_used,
            status: BookingStatus::Confirmed.to_string(),
            visited_at: now,
        };

        match self.booking_repo.create_with_visit(insert, visit).await {
            Ok(created) => {
                info!(
                    %member_id,
                    %booking_id,
                    credits = booking.credits,
                    class_booking = created.is_class_booking(),
                    "bookings: booking confirmed"
                );
                Ok(BookingDto::from(created))
            }
            Err(err) => {
                error!(%member_id, db_error = ?err, "bookings: insert failed, refunding charge");
                if let Err(refund_err) = self.ledger.refund_guarded(guard, booking.credits).await {
                    error!(
                        %member_id,
                        credits = booking.credits,
                        error = %refund_err,
                        "bookings: compensating refund failed"
                    );
                }
                Err(MembershipError::Internal(err))
            }
        }
    }

    async fn ensure_no_blocking_booking(&self, member_id: Uuid, now: DateTime<Utc>) -> UseCaseResult<()> {
        let blocking = self
            .booking_repo
            .find_blocking_booking(member_id, now, now - self.direct_visit_validity)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "bookings: failed to check active bookings");
                MembershipError::Internal(err)
            })?;

        if let Some(existing) = blocking {
            warn!(%member_id, booking_id = %existing.id, "bookings: member already holds a booking");
            return Err(MembershipError::DuplicateActiveBooking);
        }

        Ok(())
    }

    async fn ensure_owner(&self, member_id: Uuid, booking_id: Uuid) -> UseCaseResult<()> {
        let booking = self.load_booking(booking_id).await?;
        if booking.member_id != member_id {
            warn!(%member_id, %booking_id, "bookings: booking owned by another member");
            return Err(MembershipError::NotFound("booking"));
        }
        Ok(())
    }

    async fn load_booking(&self, booking_id: Uuid) -> UseCaseResult<BookingEntity> {
        self.booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "bookings: failed to load booking");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("booking"))
    }

    async fn load_active_membership(&self, member_id: Uuid) -> UseCaseResult<MembershipEntity> {
        self.membership_repo
            .find_active_by_member(member_id)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "bookings: failed to load membership");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("membership"))
    }
}

fn generate_check_in_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support;
    use chrono::Duration;
    use crates::domain::{
        entities::gym_classes::GymClassEntity,
        repositories::{
            bookings::MockBookingRepository, gym_classes::MockGymClassRepository,
            memberships::MockMembershipRepository, plans::MockPlanRepository,
            selected_gyms::MockSelectedGymRepository,
        },
        value_objects::{
            enums::selection_statuses::SelectionStatus, memberships::CreditBalance,
        },
    };
    use mockall::predicate::eq;
    use std::sync::Mutex;

    type Service = BookingService<
        MockMembershipRepository,
        MockPlanRepository,
        MockSelectedGymRepository,
        MockBookingRepository,
        MockGymClassRepository,
    >;

    struct Fixture {
        member_id: Uuid,
        counters: Arc<Mutex<(i32, i32)>>,
        memberships: MockMembershipRepository,
        plans: MockPlanRepository,
        selections: MockSelectedGymRepository,
        bookings: MockBookingRepository,
        classes: MockGymClassRepository,
    }

    impl Fixture {
        fn new(credits: i32, credits_used: i32, has_daily_access: bool) -> Self {
            let member_id = Uuid::new_v4();
            let plan = test_support::plan(credits, has_daily_access, 3);
            let mut membership = test_support::membership(member_id, credits, credits_used);
            membership.plan_id = plan.id;

            let counters = Arc::new(Mutex::new((credits, credits_used)));
            let mut memberships = MockMembershipRepository::new();

            let snapshot = Arc::clone(&counters);
            memberships.expect_find_active_by_member().returning(move |_| {
                let (credits, used) = *snapshot.lock().unwrap();
                let mut current = membership.clone();
                current.credits = credits;
                current.credits_used = used;
                Ok(Some(current))
            });

            let cas = Arc::clone(&counters);
            memberships.expect_try_consume_credits().returning(move |_, amount| {
                let mut guard = cas.lock().unwrap();
                if guard.1 + amount > guard.0 {
                    return Ok(None);
                }
                guard.1 += amount;
                Ok(Some(CreditBalance::from_counters(guard.0, guard.1)))
            });

            let release = Arc::clone(&counters);
            memberships.expect_release_credits().returning(move |_, amount| {
                let mut guard = release.lock().unwrap();
                guard.1 = (guard.1 - amount).max(0);
                Ok(CreditBalance::from_counters(guard.0, guard.1))
            });

            let mut plans = MockPlanRepository::new();
            plans
                .expect_find_by_id()
                .returning(move |_| Ok(Some(plan.clone())));

            let mut selections = MockSelectedGymRepository::new();
            selections.expect_promote_due().returning(|_, _| Ok(0));

            Self {
                member_id,
                counters,
                memberships,
                plans,
                selections,
                bookings: MockBookingRepository::new(),
                classes: MockGymClassRepository::new(),
            }
        }

        fn no_blocking_booking(mut self) -> Self {
            self.bookings
                .expect_find_blocking_booking()
                .returning(|_, _, _| Ok(None));
            self
        }

        fn service(self) -> (Service, Arc<Mutex<(i32, i32)>>) {
            let locks = Arc::new(MemberLocks::new());
            let memberships = Arc::new(self.memberships);
            let ledger = Arc::new(CreditLedger::new(Arc::clone(&memberships), Arc::clone(&locks)));
            let scheduler = Arc::new(GymSlotScheduler::new(
                Arc::clone(&memberships),
                Arc::new(self.plans),
                Arc::new(self.selections),
                Arc::clone(&locks),
                None,
            ));

            let service = BookingService::new(
                memberships,
                Arc::new(self.bookings),
                Arc::new(self.classes),
                ledger,
                scheduler,
                locks,
                Duration::hours(24),
            );
            (service, self.counters)
        }
    }

    fn created_from(booking: InsertBookingEntity) -> BookingEntity {
        BookingEntity {
            id: booking.id,
            member_id: booking.member_id,
            gym_id: booking.gym_id,
            class_id: booking.class_id,
            credits_used: booking.credits_used,
            status: booking.status,
            check_in_code: booking.check_in_code,
            valid_until: booking.valid_until,
            created_at: booking.created_at,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn direct_visit_charges_and_records_visit() {
        let mut fixture = Fixture::new(5, 0, false).no_blocking_booking();
        let member_id = fixture.member_id;
        let gym_id = Uuid::new_v4();
        fixture
            .bookings
            .expect_create_with_visit()
            .withf(move |booking, visit| {
                booking.gym_id == Some(gym_id)
                    && booking.credits_used == 1
                    && booking.status == "confirmed"
                    && visit.booking_id == booking.id
            })
            .times(1)
            .returning(|booking, _| Ok(created_from(booking)));

        let (service, counters) = fixture.service();
        let booking = service.book_direct_visit(member_id, gym_id, None).await.unwrap();

        assert_eq!(booking.credits_used, 1);
        assert_eq!(booking.check_in_code.len(), 6);
        assert!(booking.check_in_code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(counters.lock().unwrap().1, 1);
    }

    #[tokio::test]
    async fn book_then_cancel_restores_credits_and_deletes_booking() {
        let mut fixture = Fixture::new(5, 0, false).no_blocking_booking();
        let member_id = fixture.member_id;
        let stored: Arc<Mutex<Option<BookingEntity>>> = Arc::new(Mutex::new(None));

        let on_create = Arc::clone(&stored);
        fixture
            .bookings
            .expect_create_with_visit()
            .returning(move |booking, _| {
                let created = created_from(booking);
                *on_create.lock().unwrap() = Some(created.clone());
                Ok(created)
            });

        let on_find = Arc::clone(&stored);
        fixture
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(on_find.lock().unwrap().clone()));

        let on_cancel = Arc::clone(&stored);
        let refund_counters = Arc::clone(&fixture.counters);
        fixture
            .bookings
            .expect_cancel_and_refund()
            .times(1)
            .returning(move |_, _, amount| {
                if on_cancel.lock().unwrap().take().is_none() {
                    return Ok(None);
                }
                let mut counters = refund_counters.lock().unwrap();
                counters.1 = (counters.1 - amount).max(0);
                Ok(Some(CreditBalance::from_counters(counters.0, counters.1)))
            });

        let (service, counters) = fixture.service();
        let booking = service
            .book_direct_visit(member_id, Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(counters.lock().unwrap().1, 1);

        service.cancel_booking(booking.id).await.unwrap();

        assert_eq!(counters.lock().unwrap().1, 0);
        assert!(stored.lock().unwrap().is_none());

        let second = service.cancel_booking(booking.id).await.unwrap_err();
        assert!(matches!(second, MembershipError::NotFound("booking")));
    }

    #[tokio::test]
    async fn recent_visit_blocks_another_booking() {
        let mut fixture = Fixture::new(5, 1, false);
        let member_id = fixture.member_id;
        let existing = test_support::booking(member_id, 1, BookingStatus::Confirmed);
        fixture
            .bookings
            .expect_find_blocking_booking()
            .returning(move |_, _, _| Ok(Some(existing.clone())));
        fixture.bookings.expect_create_with_visit().never();

        let (service, counters) = fixture.service();
        let err = service
            .book_direct_visit(member_id, Uuid::new_v4(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::DuplicateActiveBooking));
        assert_eq!(counters.lock().unwrap().1, 1);
    }

    #[tokio::test]
    async fn daily_access_member_cannot_book_unselected_gym() {
        let mut fixture = Fixture::new(0, 0, true).no_blocking_booking();
        let member_id = fixture.member_id;
        let selected = test_support::selection(
            member_id,
            Uuid::new_v4(),
            SelectionStatus::Active,
            Utc::now() - Duration::days(3),
        );
        fixture
            .selections
            .expect_list_by_member()
            .returning(move |_| Ok(vec![selected.clone()]));
        fixture.bookings.expect_create_with_visit().never();

        let (service, _) = fixture.service();
        let err = service
            .book_direct_visit(member_id, Uuid::new_v4(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::GymNotInSelection));
    }

    #[tokio::test]
    async fn daily_access_member_keeps_ending_gym_until_period_end() {
        let mut fixture = Fixture::new(3, 0, true).no_blocking_booking();
        let member_id = fixture.member_id;
        let gym_id = Uuid::new_v4();
        let ending = test_support::selection(
            member_id,
            gym_id,
            SelectionStatus::Removed,
            Utc::now() + Duration::days(3),
        );
        fixture
            .selections
            .expect_list_by_member()
            .returning(move |_| Ok(vec![ending.clone()]));
        fixture
            .bookings
            .expect_create_with_visit()
            .returning(|booking, _| Ok(created_from(booking)));

        let (service, _) = fixture.service();

        assert!(service.book_direct_visit(member_id, gym_id, None).await.is_ok());
    }

    #[tokio::test]
    async fn insufficient_credits_leave_no_booking() {
        let mut fixture = Fixture::new(5, 4, false).no_blocking_booking();
        let member_id = fixture.member_id;
        fixture.bookings.expect_create_with_visit().never();

        let (service, counters) = fixture.service();
        let err = service
            .book_direct_visit(member_id, Uuid::new_v4(), Some(2))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::InsufficientCredits { .. }));
        assert_eq!(counters.lock().unwrap().1, 4);
    }

    #[tokio::test]
    async fn failed_insert_refunds_the_charge() {
        let mut fixture = Fixture::new(5, 0, false).no_blocking_booking();
        let member_id = fixture.member_id;
        fixture
            .bookings
            .expect_create_with_visit()
            .returning(|_, _| Err(anyhow::anyhow!("unique violation")));

        let (service, counters) = fixture.service();
        let err = service
            .book_direct_visit(member_id, Uuid::new_v4(), Some(2))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::Internal(_)));
        assert_eq!(counters.lock().unwrap().1, 0);
    }

    #[tokio::test]
    async fn zero_credit_visit_is_rejected() {
        let fixture = Fixture::new(5, 0, false);
        let member_id = fixture.member_id;
        let (service, _) = fixture.service();

        let err = service
            .book_direct_visit(member_id, Uuid::new_v4(), Some(0))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::InvalidBookingState(_)));
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let mut fixture = Fixture::new(5, 1, false);
        let member_id = fixture.member_id;
        let confirmed = test_support::booking(member_id, 1, BookingStatus::Confirmed);
        let booking_id = confirmed.id;
        let stored = Arc::new(Mutex::new(confirmed));

        let on_find = Arc::clone(&stored);
        fixture
            .bookings
            .expect_find_by_id()
            .with(eq(booking_id))
            .returning(move |_| Ok(Some(on_find.lock().unwrap().clone())));

        let on_complete = Arc::clone(&stored);
        fixture
            .bookings
            .expect_mark_completed()
            .times(1)
            .returning(move |_, completed_at| {
                let mut booking = on_complete.lock().unwrap();
                booking.status = BookingStatus::Completed.to_string();
                booking.completed_at = Some(completed_at);
                Ok(Some(booking.clone()))
            });

        let (service, counters) = fixture.service();
        let first = service.complete_booking(booking_id).await.unwrap();
        let second = service.complete_booking(booking_id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.status, "completed");
        assert_eq!(counters.lock().unwrap().1, 1);
    }

    #[tokio::test]
    async fn completed_booking_cannot_be_cancelled() {
        let mut fixture = Fixture::new(5, 1, false);
        let member_id = fixture.member_id;
        let completed = test_support::booking(member_id, 1, BookingStatus::Completed);
        let booking_id = completed.id;
        fixture
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(completed.clone())));
        fixture.bookings.expect_cancel_and_refund().never();

        let (service, counters) = fixture.service();
        let err = service.cancel_booking(booking_id).await.unwrap_err();

        assert!(matches!(err, MembershipError::InvalidBookingState(_)));
        assert_eq!(counters.lock().unwrap().1, 1);
    }

    #[tokio::test]
    async fn other_members_booking_is_hidden() {
        let mut fixture = Fixture::new(5, 1, false);
        let foreign = test_support::booking(Uuid::new_v4(), 1, BookingStatus::Confirmed);
        let booking_id = foreign.id;
        fixture
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(foreign.clone())));
        fixture.bookings.expect_cancel_and_refund().never();
        let member_id = fixture.member_id;

        let (service, _) = fixture.service();
        let err = service
            .cancel_member_booking(member_id, booking_id)
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::NotFound("booking")));
    }

    #[tokio::test]
    async fn class_booking_uses_class_credits_and_end() {
        let mut fixture = Fixture::new(10, 0, false).no_blocking_booking();
        let member_id = fixture.member_id;
        let now = Utc::now();
        let class = GymClassEntity {
            id: Uuid::new_v4(),
            gym_id: Uuid::new_v4(),
            title: "Spin".to_string(),
            starts_at: now + Duration::hours(2),
            ends_at: now + Duration::hours(3),
            credits: 3,
        };
        let class_id = class.id;
        let ends_at = class.ends_at;
        fixture
            .classes
            .expect_find_by_id()
            .with(eq(class_id))
            .returning(move |_| Ok(Some(class.clone())));
        fixture
            .bookings
            .expect_create_with_visit()
            .returning(|booking, _| Ok(created_from(booking)));

        let (service, counters) = fixture.service();
        let booking = service.book_class(member_id, class_id).await.unwrap();

        assert_eq!(booking.class_id, Some(class_id));
        assert_eq!(booking.valid_until, ends_at);
        assert_eq!(counters.lock().unwrap().1, 3);
    }

    #[tokio::test]
    async fn ended_class_is_rejected() {
        let mut fixture = Fixture::new(10, 0, false);
        let member_id = fixture.member_id;
        let now = Utc::now();
        let class = GymClassEntity {
            id: Uuid::new_v4(),
            gym_id: Uuid::new_v4(),
            title: "Yoga".to_string(),
            starts_at: now - Duration::hours(2),
            ends_at: now - Duration::hours(1),
            credits: 1,
        };
        let class_id = class.id;
        fixture
            .classes
            .expect_find_by_id()
            .returning(move |_| Ok(Some(class.clone())));

        let (service, _) = fixture.service();
        let err = service.book_class(member_id, class_id).await.unwrap_err();

        assert!(matches!(err, MembershipError::InvalidBookingState(_)));
    }

    #[test]
    fn check_in_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_check_in_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn failed_cancellation_keeps_booking_for_retry() {
        let mut fixture = Fixture::new(5, 1, false);
        let member_id = fixture.member_id;
        let booking = test_support::booking(member_id, 1, BookingStatus::Confirmed);
        let booking_id = booking.id;
        let stored = Arc::new(Mutex::new(Some(booking)));

        let on_find = Arc::clone(&stored);
        fixture
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(on_find.lock().unwrap().clone()));

        let attempts = Arc::new(Mutex::new(0));
        let on_cancel = Arc::clone(&stored);
        let refund_counters = Arc::clone(&fixture.counters);
        fixture
            .bookings
            .expect_cancel_and_refund()
            .times(2)
            .returning(move |_, _, amount| {
                let mut attempt = attempts.lock().unwrap();
                *attempt += 1;
                if *attempt == 1 {
                    return Err(anyhow::anyhow!("connection reset"));
                }
                on_cancel.lock().unwrap().take();
                let mut counters = refund_counters.lock().unwrap();
                counters.1 = (counters.1 - amount).max(0);
                Ok(Some(CreditBalance::from_counters(counters.0, counters.1)))
            });

        let (service, counters) = fixture.service();

        let err = service.cancel_booking(booking_id).await.unwrap_err();
        assert!(matches!(err, MembershipError::Internal(_)));
        assert!(stored.lock().unwrap().is_some());
        assert_eq!(counters.lock().unwrap().1, 1);

        service.cancel_booking(booking_id).await.unwrap();

        assert!(stored.lock().unwrap().is_none());
        assert_eq!(counters.lock().unwrap().1, 0);
    }

    #[tokio::test]
    async fn free_class_is_rejected_without_booking() {
        let mut fixture = Fixture::new(10, 0, false).no_blocking_booking();
        let member_id = fixture.member_id;
        let now = Utc::now();
        let class = GymClassEntity {
            id: Uuid::new_v4(),
            gym_id: Uuid::new_v4(),
            title: "Open Mat".to_string(),
            starts_at: now + Duration::hours(1),
            ends_at: now + Duration::hours(2),
            credits: 0,
        };
        let class_id = class.id;
        fixture
            .classes
            .expect_find_by_id()
            .returning(move |_| Ok(Some(class.clone())));
        fixture.bookings.expect_create_with_visit().never();

        let (service, counters) = fixture.service();
        let err = service.book_class(member_id, class_id).await.unwrap_err();

        assert!(matches!(err, MembershipError::InvalidBookingState(_)));
        assert_eq!(counters.lock().unwrap().1, 0);
    }
}
