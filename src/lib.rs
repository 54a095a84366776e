//! Relay for a static website's contact form: validate the submission, reject
//! spam, optionally keep a backup copy, and forward it by email.

pub mod archive;
pub mod captcha_client;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod routes;
pub mod routing;
pub mod startup;
pub mod telemetry;
