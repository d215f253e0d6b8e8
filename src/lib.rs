pub mod catalog;
pub mod config;
pub mod db;
pub mod model;
pub mod observer;
pub mod spoonacular;
pub mod sync;
