//! Controllers
//!
//! Capa fina entre los handlers HTTP y los servicios: convierte DTOs en
//! modelos validados y da forma a las respuestas.

pub mod admin_controller;
pub mod driver_controller;
pub mod request_controller;
