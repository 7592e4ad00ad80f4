//! HTTP control surface for the Furby gateway.
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/scan` | GET | Scan for nearby Furbys |
//! | `/connect/:address` | GET | Connect and start the idle loop |
//! | `/disconnect/:address` | GET | Stop idle and release the link |
//! | `/list` | GET | Command catalog |
//! | `/cmd/*command` | POST | Run a command on one device or all |
//! | `/devices` | GET | Connected devices |
//! | `/health` | GET | Service status |

pub mod config;
pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use config::{GatewayConfig, TimeoutConfig, TransportConfig, TransportKind};
pub use models::ErrorResponse;
pub use server::{create_router_with_state, run, ServerState};
pub use transport::build_transport;
