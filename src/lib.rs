//! City-level PM2.5 air quality index resolution.
//!
//! A city name is geocoded, nearby monitoring stations are searched with
//! widening radii, the freshest PM2.5 reading is picked, and the concentration
//! is converted to the US EPA AQI.

pub mod aqi;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod location;
pub mod resolution;
pub mod server;
pub mod stations;
pub mod upstream;

#[cfg(test)]
mod testing;
