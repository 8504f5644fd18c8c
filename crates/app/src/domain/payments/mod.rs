//! Payments
//!
//! PIX checkout issuance and the payment state machine. Payment status moves
//! from pending to paid (confirming the order) or to failed (cancelling it),
//! and never back.

mod errors;
pub mod machine;
pub mod models;
pub mod pix;

pub use errors::PaymentsError;
pub use machine::PaymentStateMachine;
