pub mod adapters;
pub mod attributes;
pub mod config;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod model;
pub mod payload;
pub mod provider;
pub mod registry;
pub mod serializer;
pub mod telemetry;
pub mod tracer;
