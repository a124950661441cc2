//! SafeReport - client for a campus gender-based-violence reporting service.
//!
//! # Overview
//!
//! SafeReport walks a user through a short report form, submits it to the
//! reporting API, and then helps them find the nearest police station and
//! hospital. The emergency contact directory is available at every step,
//! whether or not the network or location services are working.
//!
//! # Privacy
//!
//! Reports may be submitted anonymously. Report text, contact details and
//! exact positions are never written to logs; only categories, sizes, status
//! codes and coarsely rounded coordinates are.
//!
//! # Modules
//!
//! - [`model`]: Report draft, submission result, and service location types
//! - [`validation`]: Step validation and user-facing notices
//! - [`attachment`]: Evidence size and type checks
//! - [`wizard`]: The report form as a state machine
//! - [`client`]: Multipart submission client and session driver
//! - [`cache`]: Time-limited cache of nearest-services results
//! - [`services`]: Nearest-services lookup
//! - [`geolocation`]: Position sources and the cancellable position watch
//! - [`locator`]: Post-submission locator state machine and view
//! - [`routing`]: Directions to a selected service
//! - [`map`]: Map description (markers, tiles, route overlay)
//! - [`contacts`]: Emergency contact directory
//! - [`config`]: Environment configuration

pub mod attachment;
pub mod cache;
pub mod client;
pub mod config;
pub mod contacts;
pub mod error;
pub mod geo;
pub mod geolocation;
pub mod locator;
pub mod map;
pub mod model;
pub mod routing;
pub mod services;
pub mod validation;
pub mod wizard;
