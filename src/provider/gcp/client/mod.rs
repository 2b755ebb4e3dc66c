//! GCP IAM Policy Client Implementation
//!
//! Native REST implementation using reqwest with rustls.

pub mod rest;

pub use rest::IamPolicyRest;
