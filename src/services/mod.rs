//! Services module
//!
//! Este módulo contiene la lógica de negocio: el motor de despacho, el
//! gobernador del ciclo de vida y los servicios que los rodean.

pub mod change_feed;
pub mod dashboard_service;
pub mod dispatch_service;
pub mod fleet_service;
pub mod jwt_service;
pub mod lifecycle_service;
pub mod request_service;
pub mod tracking_code;

pub use change_feed::ChangeFeed;
pub use dashboard_service::{DashboardService, DashboardSnapshot};
pub use dispatch_service::{DispatchOutcome, DispatchService};
pub use fleet_service::FleetService;
pub use jwt_service::JwtService;
pub use lifecycle_service::LifecycleService;
pub use request_service::RequestService;
