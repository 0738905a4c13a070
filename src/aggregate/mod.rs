//! Derived session aggregates
//!
//! Raw OpenF1 resources are joined per driver into a [`SessionComposite`] and fed
//! through the statistics engine. [`SessionAggregator`] memoizes the resulting
//! detail views for a short TTL, independent of the durable fetch cache.

pub mod builder;
pub mod cache;
pub mod composite;

pub use builder::{
    DriverSessionDetail, PracticeSessionDetail, QualifyingSessionDetail, RaceSessionDetail,
    SessionAggregator, SessionDetail,
};
pub use cache::AggregateCache;
pub use composite::{RawSessionData, SessionComposite, SessionDriverData};
