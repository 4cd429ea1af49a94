//! Core business logic - framework-agnostic identity and investment operations.

/// Registration, OTP verification, login, password reset
pub mod auth;
/// Password hashing and signed tokens
pub mod credentials;
/// Sequential human-readable identifiers
pub mod identifier;
/// Investment contract lifecycle
pub mod investment;
/// One-time passcodes and pending registrations
pub mod otp;
/// Payment orders for contracts
pub mod payment;
