pub mod bookings;
pub mod enums;
pub mod gym_slots;
pub mod memberships;
pub mod plans;
pub mod reconciliation;
