pub mod bookings;
pub mod gym_classes;
pub mod memberships;
pub mod plans;
pub mod selected_gyms;
pub mod visits;
