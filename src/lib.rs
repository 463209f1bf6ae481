//! Agenda engine for a clinical practice: turns appointment, alert and
//! pregnancy-follow-up records into month, week and day calendar views.
//!
//! The pipeline is fetch ([`source`]) → [`normalize`] → [`window`] →
//! [`group`] → [`layout`] / [`aggregate`]. [`snapshot::AgendaSnapshot`]
//! runs it end to end for one view.

pub mod aggregate;
pub mod config;
pub mod group;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod snapshot;
pub mod source;
pub mod window;

pub use group::group_by_day;
pub use layout::layout_day;
pub use window::window_for;
