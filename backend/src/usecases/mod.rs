pub mod bookings;
pub mod credit_ledger;
pub mod errors;
pub mod gym_slots;
pub mod member_locks;
pub mod payment_gateway;
pub mod settings;
pub mod subscription_reconciler;

#[cfg(test)]
mod test_support;
