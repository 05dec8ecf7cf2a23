//! Plain services injected into actors through [`virtual_actor::Dependencies`].

pub mod cache_service;

pub use cache_service::CacheService;
