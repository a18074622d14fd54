#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod driver;
pub mod estate_data;
pub mod geo_utils;
pub mod geocoding;
pub mod location;
pub mod logs;
pub mod narrator;
pub mod navigation;
pub mod road_snapper;
pub mod routing;
pub mod server;
pub mod session;
pub mod speech;
