pub mod bookings;
pub mod credits;
pub mod gym_slots;
pub mod subscriptions;
