//! Fixtures shared by the use case tests.

use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        bookings::BookingEntity, memberships::MembershipEntity, plans::PlanEntity,
        selected_gyms::SelectedGymEntity,
    },
    value_objects::enums::{booking_statuses::BookingStatus, selection_statuses::SelectionStatus},
};
use uuid::Uuid;

pub fn membership(member_id: Uuid, credits: i32, credits_used: i32) -> MembershipEntity {
    let now = Utc::now();
    MembershipEntity {
        id: Uuid::new_v4(),
        member_id,
        plan_id: Uuid::new_v4(),
        plan_title: "Basic".to_string(),
        credits,
        credits_used,
        start_date: now - Duration::days(10),
        end_date: now + Duration::days(20),
        is_active: true,
        stripe_customer_id: None,
        stripe_subscription_id: None,
        stripe_status: None,
        scheduled_change: None,
        created_at: now - Duration::days(10),
        updated_at: now - Duration::days(10),
    }
}

pub fn plan(credits: i32, has_daily_access: bool, max_slots: i32) -> PlanEntity {
    PlanEntity {
        id: Uuid::new_v4(),
        title: "Plan".to_string(),
        credits,
        has_daily_access,
        max_slots,
        stripe_price_id: Some(format!("price_{}", Uuid::new_v4().simple())),
        currency: "thb".to_string(),
        price_minor: 99_000,
        duration_days: 30,
        is_active: true,
    }
}

pub fn selection(
    member_id: Uuid,
    gym_id: Uuid,
    status: SelectionStatus,
    effective_from: DateTime<Utc>,
) -> SelectedGymEntity {
    SelectedGymEntity {
        id: Uuid::new_v4(),
        member_id,
        gym_id,
        added_at: Utc::now() - Duration::days(40),
        effective_from,
        status: status.to_string(),
    }
}

pub fn booking(member_id: Uuid, credits_used: i32, status: BookingStatus) -> BookingEntity {
    let now = Utc::now();
    BookingEntity {
        id: Uuid::new_v4(),
        member_id,
        gym_id: Some(Uuid::new_v4()),
        class_id: None,
        credits_used,
        status: status.to_string(),
        check_in_code: "123456".to_string(),
        valid_until: now + Duration::hours(24),
        created_at: now,
        completed_at: None,
    }
}
