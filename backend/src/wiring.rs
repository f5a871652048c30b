use std::sync::Arc;

use crates::{
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            bookings::BookingPostgres, gym_classes::GymClassPostgres,
            memberships::MembershipPostgres, plans::PlanPostgres,
            selected_gyms::SelectedGymPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use tracing::{info, warn};

use crate::{
    config::{config_model::Stripe, stage::Stage},
    usecases::{
        bookings::BookingService, credit_ledger::CreditLedger, gym_slots::GymSlotScheduler,
        member_locks::MemberLocks, settings::CoreSettings,
        subscription_reconciler::SubscriptionReconciler,
    },
};

pub type Ledger = CreditLedger<MembershipPostgres>;
pub type Scheduler = GymSlotScheduler<MembershipPostgres, PlanPostgres, SelectedGymPostgres>;
pub type Bookings = BookingService<
    MembershipPostgres,
    PlanPostgres,
    SelectedGymPostgres,
    BookingPostgres,
    GymClassPostgres,
>;
pub type Reconciler =
    SubscriptionReconciler<MembershipPostgres, PlanPostgres, SelectedGymPostgres, StripeClient>;

/// Every membership service, sharing one repository set and one lock registry.
pub struct CoreServices {
    pub membership_repo: Arc<MembershipPostgres>,
    pub plan_repo: Arc<PlanPostgres>,
    pub ledger: Arc<Ledger>,
    pub scheduler: Arc<Scheduler>,
    pub bookings: Arc<Bookings>,
    pub reconciler: Arc<Reconciler>,
    pub locks: Arc<MemberLocks>,
}

impl CoreServices {
    pub fn build(
        db_pool: Arc<PgPoolSquad>,
        stripe: &Stripe,
        settings: CoreSettings,
        stage: Stage,
    ) -> Self {
        if let Some(max_slots) = settings.max_slots_override {
            if stage == Stage::Production {
                warn!(max_slots, "wiring: MAX_SLOTS_OVERRIDE is set in production");
            } else {
                info!(max_slots, %stage, "wiring: gym slot limit overridden");
            }
        }

        let locks = Arc::new(MemberLocks::new());
        let membership_repo = Arc::new(MembershipPostgres::new(Arc::clone(&db_pool)));
        let plan_repo = Arc::new(PlanPostgres::new(Arc::clone(&db_pool)));
        let selected_gym_repo = Arc::new(SelectedGymPostgres::new(Arc::clone(&db_pool)));
        let booking_repo = Arc::new(BookingPostgres::new(Arc::clone(&db_pool)));
        let class_repo = Arc::new(GymClassPostgres::new(Arc::clone(&db_pool)));
        let gateway = Arc::new(StripeClient::new(
            stripe.secret_key.clone(),
            stripe.webhook_secret.clone(),
        ));

        let ledger = Arc::new(CreditLedger::new(
            Arc::clone(&membership_repo),
            Arc::clone(&locks),
        ));
        let scheduler = Arc::new(GymSlotScheduler::new(
            Arc::clone(&membership_repo),
            Arc::clone(&plan_repo),
            selected_gym_repo,
            Arc::clone(&locks),
            settings.max_slots_override,
        ));
        let bookings = Arc::new(BookingService::new(
            Arc::clone(&membership_repo),
            booking_repo,
            class_repo,
            Arc::clone(&ledger),
            Arc::clone(&scheduler),
            Arc::clone(&locks),
            settings.direct_visit_validity,
        ));
        let reconciler = Arc::new(SubscriptionReconciler::new(
            Arc::clone(&membership_repo),
            Arc::clone(&plan_repo),
            Arc::clone(&ledger),
            Arc::clone(&scheduler),
            gateway,
            Arc::clone(&locks),
            settings,
        ));

        Self {
            membership_repo,
            plan_repo,
            ledger,
            scheduler,
            bookings,
            reconciler,
            locks,
        }
    }
}
