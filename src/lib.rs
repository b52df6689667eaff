pub mod bot;
pub mod domain;
pub mod hh;
pub mod infra;
pub mod oauth;
pub mod shared;
