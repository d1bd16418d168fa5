//! Servicio de despacho de ambulancias
//!
//! Recibe solicitudes de emergencia, asigna la ambulancia disponible más
//! cercana y gobierna el ciclo de vida de cada viaje.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::AppState;
