pub mod arrivals;
pub mod cache;
pub mod classify;
pub mod fetch;
pub mod headway;
pub mod output;
pub mod overlay;
pub mod parser;
pub mod service;
pub mod snapshot;
pub mod stops;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
